/*!
    the module contract: every function unit found in a port configuration table is driven through the [Driver] trait, and placed in the port by a [Module]
*/

use core::{
    any::Any,
    ops::Range,
    };
use crate::error::{BusError, BusResult};


/**
    capability interface of a function unit

    A driver owns the channel state of one module. It is built once when the port is probed, and is then called every cycle with the module window of the port images, in creation order.

    Neither [Self::read] nor [Self::write] may block, allocate or fail: they always produce an output, possibly a clamped one.
*/
pub trait Driver: Any + Send {
    /// short name of the module kind, used to build names
    fn kind(&self) -> &'static str;
    /// byte length of the module window, it is constant for a given driver
    fn data_len(&self) -> u16;
    /// transform the hardware registers freshly read in `data` into engineering values
    ///
    /// `period` is the time elapsed since the previous call, in nanoseconds
    fn read(&mut self, period: i64, data: &[u8]);
    /// transform engineering values into the hardware registers to write, `data` must be entirely written
    ///
    /// `period` is the time elapsed since the previous call, in nanoseconds
    fn write(&mut self, period: i64, data: &mut [u8]);
    /// called when the port is destroyed, before the driver is deallocated
    fn cleanup(&mut self) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// informations given to a module constructor
#[derive(Copy, Clone, Debug)]
pub struct ModuleContext<'a> {
    /// name of the device the module belongs to
    pub device: &'a str,
    /// index of the port in its device
    pub port: usize,
    /// index of the module among the modules of the same kind, across all ports
    pub index: usize,
    /// byte address of the module window in the port register space
    pub start: u16,
    /// frequency of the hardware timebase (Hz)
    pub tick_rate: u32,
}
impl ModuleContext<'_> {
    /// name of the module for humans, like `device.0.enc.1`
    pub fn name(&self, kind: &str) -> String {
        format!("{}.{}.{}.{}", self.device, self.port, kind, self.index)
    }
}


/**
    one module inserted in a port

    It gathers the module descriptor read from the configuration table, the window of the port images the module is using, and its driver.
*/
pub struct Module {
    kind: u16,
    index: usize,
    start: u16,
    /// byte range in the port images, computed once the port address span is known
    window: Range<usize>,
    driver: Box<dyn Driver>,
}
impl Module {
    pub(crate) fn new(kind: u16, index: usize, start: u16, driver: Box<dyn Driver>) -> Self {
        Self {kind, index, start, window: 0 .. 0, driver}
    }

    /// module type code
    pub fn kind(&self) -> u16  {self.kind}
    /// index of the module among the modules of the same kind, only meaningful for naming
    pub fn index(&self) -> usize  {self.index}
    /// byte address of the module window in the port register space
    pub fn start(&self) -> u16  {self.start}
    /// byte length of the module window
    pub fn len(&self) -> u16  {self.driver.data_len()}
    /// byte address just after the module window
    pub fn end(&self) -> u32  {u32::from(self.start) + u32::from(self.len())}
    /// byte range of the module window in the port images
    pub fn window(&self) -> Range<usize>  {self.window.clone()}

    /// set the window of the module in port images starting at address `base` with `span` bytes
    pub(crate) fn place(&mut self, base: u16, span: usize) -> BusResult {
        let start = usize::from(self.start.checked_sub(base)
                        .ok_or(BusError::Layout("module starts before the port image"))?);
        let end = start + usize::from(self.len());
        if end > span
            {return Err(BusError::Layout("module ends after the port image"))}
        self.window = start .. end;
        Ok(())
    }

    pub fn driver(&self) -> &dyn Driver  {self.driver.as_ref()}
    pub fn driver_mut(&mut self) -> &mut dyn Driver  {self.driver.as_mut()}
    /// downcast the driver to its concrete type
    pub fn get<T: Driver>(&self) -> Option<&T> {
        self.driver.as_any().downcast_ref()
    }
    /// downcast the driver to its concrete type
    pub fn get_mut<T: Driver>(&mut self) -> Option<&mut T> {
        self.driver.as_any_mut().downcast_mut()
    }

    pub(crate) fn read(&mut self, period: i64, image: &[u8]) {
        self.driver.read(period, &image[self.window.clone()])
    }
    pub(crate) fn write(&mut self, period: i64, image: &mut [u8]) {
        self.driver.write(period, &mut image[self.window.clone()])
    }
    pub(crate) fn cleanup(&mut self) {
        self.driver.cleanup()
    }
}

impl core::fmt::Debug for Module {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "Module{{{}.{}, 0x{:x}, {}}}", self.driver.kind(), self.index, self.start, self.len())
	}
}

/*!
    a port is one register space of the FPGA, holding a configuration table and the windows of the modules listed in it.

    The port keeps a local image of the hardware registers in each direction. Every cycle
    - [Port::read] refreshes the input image from the backend, then lets every module decode its window
    - [Port::write] lets every module encode its window, then flushes the output image to the backend

    The images only cover the address span used by the modules, no more.
*/

use crate::{
    backend::Backend,
    error::{BusError, BusResult},
    module::{Module, ModuleContext},
    registry::Registry,
    registers::{MAX_MODULES, ModuleDescriptor, kind},
    };
use core::ops::Range;


/**
    one register space of the FPGA and the modules found in it

    The modules are built when the port is created, and released in reverse order when the port is dropped.
*/
pub struct Port {
    index: usize,
    /// lowest module address, image byte 0 maps to this address
    base: u16,
    input: Vec<u8>,
    output: Vec<u8>,
    modules: heapless::Vec<Module, MAX_MODULES>,
    backend: Box<dyn Backend>,
}
impl Port {
    /**
        probe the configuration table of the given backend and build the modules found in it

        Unknown module types and modules refusing to initialize are skipped. Other errors are fatal, the modules built so far are then released.
    */
    pub(crate) fn probe(device: &str, index: usize, tick_rate: u32, registry: &mut Registry, backend: Box<dyn Backend>) -> BusResult<Self> {
        // built first so any failure below releases the modules already built, in reverse order
        let mut port = Self {
            index,
            base: 0,
            input: Vec::new(),
            output: Vec::new(),
            modules: heapless::Vec::new(),
            backend,
            };
        // the bounds are computed in 32 bits since the end of a module may exceed the 16 bit address space
        let mut bottom = u32::from(u16::MAX);
        let mut top = 0;

        for word in 0 .. MAX_MODULES {
            let descriptor = ModuleDescriptor::from(port.backend.read_config(word));
            if descriptor.kind() == kind::END  {break}

            let context = ModuleContext {
                device,
                port: index,
                index: 0,
                start: descriptor.start(),
                tick_rate,
                };
            let (module_index, driver) = match registry.create(descriptor.kind(), context) {
                Ok(created) => created,
                Err(err) if err.recoverable() => {
                    log::error!("{}: {}, module skipped", device, err);
                    continue
                },
                Err(err) => return Err(err),
            };
            let module = Module::new(descriptor.kind(), module_index, descriptor.start(), driver);
            log::info!("{}: initialized {:?}", device, module);

            bottom = bottom.min(u32::from(module.start()));
            top = top.max(module.end());
            port.modules.push(module)
                .map_err(|_| BusError::Allocation("too many modules in port"))?;
        }

        let (base, span) =
            if top > 0 && bottom < top  {(bottom, top - bottom)}
            else  {(0, 0)};
        port.base = u16::try_from(base)
            .map_err(|_| BusError::Layout("port image starts outside the address space"))?;
        let span = span as usize;
        for module in port.modules.iter_mut() {
            module.place(port.base, span)?;
        }
        port.input = image(span)?;
        port.output = image(span)?;
        Ok(port)
    }

    /// index of the port in its device
    pub fn index(&self) -> usize  {self.index}
    /// address range of the register space covered by the port images
    pub fn span(&self) -> Range<u32> {
        u32::from(self.base) .. u32::from(self.base) + self.input.len() as u32
    }
    /// modules of the port in creation order
    pub fn modules(&self) -> &[Module]  {&self.modules}
    /// modules of the port in creation order
    pub fn modules_mut(&mut self) -> &mut [Module]  {&mut self.modules}
    /// iterate over the drivers of the given concrete type
    pub fn drivers<T: crate::module::Driver>(&self) -> impl Iterator<Item=&T> {
        self.modules.iter().filter_map(|module| module.get::<T>())
    }
    /// iterate over the drivers of the given concrete type
    pub fn drivers_mut<T: crate::module::Driver>(&mut self) -> impl Iterator<Item=&mut T> {
        self.modules.iter_mut().filter_map(|module| module.get_mut::<T>())
    }
    /// last input image read from the hardware
    pub fn input(&self) -> &[u8]  {&self.input}
    /// last output image written to the hardware
    pub fn output(&self) -> &[u8]  {&self.output}

    /// refresh the input image and decode it, `period` is the time since the previous read in nanoseconds
    pub fn read(&mut self, period: i64) {
        self.backend.read_input(self.base, &mut self.input);
        for module in self.modules.iter_mut() {
            module.read(period, &self.input);
        }
    }
    /// encode the output image and flush it, `period` is the time since the previous write in nanoseconds
    pub fn write(&mut self, period: i64) {
        for module in self.modules.iter_mut() {
            module.write(period, &mut self.output);
        }
        self.backend.write_output(self.base, &self.output);
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        // modules are released in reverse creation order, then the images with the struct fields
        while let Some(mut module) = self.modules.pop() {
            module.cleanup();
            log::debug!("released {:?}", module);
        }
    }
}

impl core::fmt::Debug for Port {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Port")
            .field("index", &self.index)
            .field("span", &self.span())
            .field("modules", &self.modules())
            .finish()
	}
}

/// allocate a zeroed register image, reporting failure instead of aborting
fn image(len: usize) -> BusResult<Vec<u8>> {
    let mut image = Vec::new();
    image.try_reserve_exact(len)
        .map_err(|_| BusError::Allocation("cannot allocate port image"))?;
    image.resize(len, 0);
    Ok(image)
}

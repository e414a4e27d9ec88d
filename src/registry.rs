/*!
    map from module type codes to module constructors

    The registry is consulted when a port is probed. It also counts the modules built for each type, so every module gets an index unique among the modules of its type across all ports of a device.
*/

use std::collections::BTreeMap;
use crate::{
    error::{BusError, BusResult},
    module::{Driver, ModuleContext},
    registers::kind,
    modules::{Watchdog, Dio, Dac, Encoder, Stepgen, PhaseEncoder},
    };


/// function building the driver of a module
pub type Constructor = Box<dyn Fn(&ModuleContext) -> BusResult<Box<dyn Driver>> + Send + Sync>;

struct Entry {
    name: &'static str,
    constructor: Constructor,
    /// number of modules of this type built so far
    count: usize,
}

/**
    registry of the module types a device can drive

    [Registry::default] knows all the module types of the FPGA. An empty registry can be extended with custom module types.
*/
pub struct Registry {
    entries: BTreeMap<u16, Entry>,
}
impl Registry {
    /// a registry knowing no module type
    pub fn empty() -> Self {
        Self {entries: BTreeMap::new()}
    }
    /// register the constructor of a module type, replacing the former one if any
    pub fn register<F>(&mut self, kind: u16, name: &'static str, constructor: F) -> &mut Self
    where F: Fn(&ModuleContext) -> BusResult<Box<dyn Driver>> + Send + Sync + 'static
    {
        self.entries.insert(kind, Entry {name, constructor: Box::new(constructor), count: 0});
        self
    }
    /// true if a constructor is registered for this type code
    pub fn knows(&self, kind: u16) -> bool {
        self.entries.contains_key(&kind)
    }
    /// short name of a registered module type
    pub fn name(&self, kind: u16) -> Option<&'static str> {
        self.entries.get(&kind).map(|entry| entry.name)
    }
    /// number of modules of the given type successfully built so far
    pub fn count(&self, kind: u16) -> usize {
        self.entries.get(&kind).map_or(0, |entry| entry.count)
    }

    /**
        build the driver of a module of the given type, the module index is set in the context by this function

        returns the module index and its driver
    */
    pub(crate) fn create(&mut self, kind: u16, context: ModuleContext) -> BusResult<(usize, Box<dyn Driver>)> {
        let entry = self.entries.get_mut(&kind)
            .ok_or(BusError::UnknownModule {kind, offset: context.start})?;
        let context = ModuleContext {index: entry.count, .. context};
        let driver = (entry.constructor)(&context)?;
        entry.count += 1;
        Ok((context.index, driver))
    }
}

impl Default for Registry {
    /// registry of the module types of the FPGA
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(kind::WATCHDOG, "wdt", |context| Ok(Box::new(Watchdog::new(context)?)))
            .register(kind::DIO, "dio", |context| Ok(Box::new(Dio::new(context)?)))
            .register(kind::DAC, "dac", |context| Ok(Box::new(Dac::new(context)?)))
            .register(kind::ENCODER, "enc", |context| Ok(Box::new(Encoder::new(context)?)))
            .register(kind::STEPGEN, "step", |context| Ok(Box::new(Stepgen::new(context)?)))
            .register(kind::PHASE, "phpe", |context| Ok(Box::new(PhaseEncoder::new(context)?)));
        registry
    }
}

impl core::fmt::Debug for Registry {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_map()
            .entries(self.entries.iter().map(|(kind, entry)| (kind, (entry.name, entry.count))))
            .finish()
	}
}

use std::sync::{Arc, Mutex, MutexGuard};
use crate::{
    data::{Register, Field},
    registers::{MAX_MODULES, ModuleDescriptor},
    };
use super::Backend;


/**
    register space simulated in memory

    The FPGA has distinct input and output registers at the same addresses, so does this backend: the driver reads the input area and writes the output area. The other side of each area is accessible through the methods of this struct, so a test or a simulator can play the hardware.

    Accesses past the simulated size are ignored, like on a real mapping.

    Cloning the backend gives an other handle on the same register space.

    ## Example

    ```ignore
    let backend = MemoryBackend::new(0x200)
        .with_module(registers::kind::WATCHDOG, 0x40)
        .with_module(registers::kind::ENCODER, 0x44);
    let hardware = backend.clone();
    device.create_port(Box::new(backend), &mut runtime)?;

    hardware.set_input(0x44, registers::encoder::timebase, 1000);
    device.read_all(1_000_000);
    ```
*/
#[derive(Clone)]
pub struct MemoryBackend {
    space: Arc<Mutex<Space>>,
}
struct Space {
    config: [u32; MAX_MODULES],
    input: Vec<u8>,
    output: Vec<u8>,
}

impl MemoryBackend {
    /// create a register space of `size` bytes, with an empty configuration table
    pub fn new(size: usize) -> Self {
        Self {space: Arc::new(Mutex::new(Space {
            config: [0; MAX_MODULES],
            input: vec![0; size],
            output: vec![0; size],
            }))}
    }
    /// append a module to the configuration table
    ///
    /// silently ignored once the table is full
    pub fn with_module(self, kind: u16, start: u16) -> Self {
        {
            let mut space = self.lock();
            if let Some(slot) = space.config.iter().position(|&word| word == 0) {
                space.config[slot] = ModuleDescriptor::new(kind, start).into();
            }
        }
        self
    }
    /// overwrite a word of the configuration table
    pub fn set_config(&self, word: usize, value: u32) {
        self.lock().config[word] = value;
    }

    /// hardware side: set an input register of the module starting at `start`
    pub fn set_input<T: Register>(&self, start: u16, field: Field<T>, value: T) {
        let mut space = self.lock();
        field.set(&mut space.input[usize::from(start) ..], value)
    }
    /// hardware side: get an output register of the module starting at `start`, as last written by the driver
    pub fn output<T: Register>(&self, start: u16, field: Field<T>) -> T {
        field.get(&self.lock().output[usize::from(start) ..])
    }
    /// hardware side: get an input register of the module starting at `start`
    pub fn input<T: Register>(&self, start: u16, field: Field<T>) -> T {
        field.get(&self.lock().input[usize::from(start) ..])
    }

    fn lock(&self) -> MutexGuard<'_, Space> {
        // the space holds plain bytes, a panic while holding it cannot break any invariant
        self.space.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Backend for MemoryBackend {
    fn read_config(&self, word: usize) -> u32 {
        self.lock().config.get(word).copied().unwrap_or(0)
    }
    fn read_input(&self, offset: u16, data: &mut [u8]) {
        let space = self.lock();
        let start = usize::from(offset);
        let Some(area) = space.input.get(start .. start + data.len())  else {return};
        data.copy_from_slice(area);
    }
    fn write_output(&self, offset: u16, data: &[u8]) {
        let mut space = self.lock();
        let start = usize::from(offset);
        let Some(area) = space.output.get_mut(start .. start + data.len())  else {return};
        area.copy_from_slice(data);
    }
}

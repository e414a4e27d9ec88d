#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use core::any::Any;
use ioexpand::*;


/// install the logger once for all tests of a binary
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// device with a single port on the given simulated board, ready to run
pub fn single_port(config: DeviceConfig, backend: MemoryBackend) -> (Device, Exports) {
    setup();
    let mut runtime = Exports::new();
    let mut device = Device::new(config);
    device.init(&mut runtime).unwrap();
    device.create_port(Box::new(backend), &mut runtime).unwrap();
    device.ready(&mut runtime);
    (device, runtime)
}

/// run one full cycle on a device
pub fn cycle(device: &mut Device, period: i64) {
    device.read_all(period);
    device.write_all(period);
}

/// events shared between probe drivers and a test
pub type Journal = Arc<Mutex<Vec<String>>>;

/// module type code of [Probe]
pub const PROBE: u16 = 0x42;
/// module type code of a module always refusing to initialize
pub const BROKEN: u16 = 0x43;

/**
    driver recording everything happening to it

    It reads 8 bytes, and writes its module index + 1 in all of them
*/
pub struct Probe {
    pub index: usize,
    pub journal: Journal,
    pub seen: Vec<u8>,
    pub periods: Vec<i64>,
}
impl Driver for Probe {
    fn kind(&self) -> &'static str  {"probe"}
    fn data_len(&self) -> u16  {8}
    fn read(&mut self, period: i64, data: &[u8]) {
        self.seen = data.to_vec();
        self.periods.push(period);
        self.journal.lock().unwrap().push(format!("read {}", self.index));
    }
    fn write(&mut self, _period: i64, data: &mut [u8]) {
        data.fill(self.index as u8 + 1);
        self.journal.lock().unwrap().push(format!("write {}", self.index));
    }
    fn cleanup(&mut self) {
        self.journal.lock().unwrap().push(format!("cleanup {}", self.index));
    }
    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

/// default registry extended with [PROBE] and [BROKEN]
pub fn probe_registry(journal: &Journal) -> Registry {
    let journal = journal.clone();
    let mut registry = Registry::default();
    registry
        .register(PROBE, "probe", move |context| Ok(Box::new(Probe {
            index: context.index,
            journal: journal.clone(),
            seen: Vec::new(),
            periods: Vec::new(),
            })))
        .register(BROKEN, "broken", |_| Err(BusError::ModuleInit("refused")));
    registry
}

use core::any::Any;
use crate::{
    error::BusResult,
    module::{Driver, ModuleContext},
    registers::{watchdog, Heartbeat},
    };


/**
    watchdog heartbeat

    The FPGA presents a pseudo random value which must be echoed back every cycle. Both sides advance the value with the same LFSR, so the driver knows which value to expect on the next read. A mismatch raises [Self::com_error], it stays raised until [Self::reset_error] is set.

    The FPGA keeps its outputs enabled as long as the heartbeat goes on and [Self::enable] is set.
*/
#[derive(Debug)]
pub struct Watchdog {
    name: String,
    /// keep the FPGA outputs enabled
    pub enable: bool,
    /// clear the communication error and resynchronize on the next read
    pub reset_error: bool,
    /// heartbeat mismatch, sticky
    pub com_error: bool,
    /// last value read from the FPGA
    pub rand: u16,
    /// value expected on the next read, 0 before synchronization
    expected: u16,
}

impl Watchdog {
    pub fn new(context: &ModuleContext) -> BusResult<Self> {
        Ok(Self {
            name: context.name("wdt"),
            enable: false,
            reset_error: false,
            com_error: false,
            rand: 0,
            expected: 0,
        })
    }
    pub fn name(&self) -> &str  {&self.name}
}

/// next value of the 16 bit heartbeat sequence
pub fn next_heartbeat(value: u16) -> u16 {
    (value << 1) | (((value >> 15) ^ (value >> 10)) & 1)
}

impl Driver for Watchdog {
    fn kind(&self) -> &'static str  {"wdt"}
    fn data_len(&self) -> u16  {watchdog::LEN}

    fn read(&mut self, _period: i64, data: &[u8]) {
        self.rand = watchdog::heartbeat.get(data).rand();

        let mut error = self.com_error;
        if self.expected == 0 || self.reset_error {
            self.expected = self.rand;
            error = false;
        }
        if self.rand == 0 || self.expected != self.rand {
            error = true;
        }
        if super::raised(&mut self.com_error, error) {
            log::error!("{}: communication error", self.name);
        }
    }

    fn write(&mut self, _period: i64, data: &mut [u8]) {
        data.fill(0);
        let mut heartbeat = Heartbeat::default();
        heartbeat.set_rand(self.rand);
        heartbeat.set_enable(self.enable);
        watchdog::heartbeat.set(data, heartbeat);
        self.expected = next_heartbeat(self.expected);
    }

    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

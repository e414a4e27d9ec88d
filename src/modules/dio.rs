use core::any::Any;
use crate::{
    error::BusResult,
    module::{Driver, ModuleContext},
    registers::{dio, DioHigh},
    };


/**
    48 digital inputs and outputs

    Pin `i` is bit `i % 32` of word `i / 32` in both directions. The fault flags reported by the FPGA are sticky on the hardware side: they are mirrored in this driver until the matching reset is requested.
*/
#[derive(Debug)]
pub struct Dio {
    name: String,
    /// state of the input pins
    pub input: [bool; dio::PINS],
    /// inverted state of the input pins
    pub input_not: [bool; dio::PINS],
    /// requested state of the output pins
    pub output: [bool; dio::PINS],
    /// invert the output pins
    pub output_invert: [bool; dio::PINS],

    /// the FPGA failed reading the inputs
    pub input_error: bool,
    /// the FPGA failed writing the outputs
    pub output_error: bool,
    /// an output driver reports a fault
    pub output_fault: bool,
    pub input_error_reset: bool,
    pub output_error_reset: bool,
    pub output_fault_reset: bool,
}

impl Dio {
    pub fn new(context: &ModuleContext) -> BusResult<Self> {
        Ok(Self {
            name: context.name("dio"),
            input: [false; dio::PINS],
            input_not: [false; dio::PINS],
            output: [false; dio::PINS],
            output_invert: [false; dio::PINS],
            input_error: false,
            output_error: false,
            output_fault: false,
            input_error_reset: false,
            output_error_reset: false,
            output_fault_reset: false,
        })
    }
    pub fn name(&self) -> &str  {&self.name}
}

/// set a flag from the hardware, logging its rising edge
fn mirror(name: &str, flag: &mut bool, state: bool, what: &str) {
    if super::raised(flag, state) {
        log::error!("{}: {}", name, what);
    }
}

impl Driver for Dio {
    fn kind(&self) -> &'static str  {"dio"}
    fn data_len(&self) -> u16  {dio::LEN}

    fn read(&mut self, _period: i64, data: &[u8]) {
        for i in 0 .. dio::PINS {
            let (word, bit) = dio::pin(i);
            let state = (word.get(data) >> bit) & 1 == 1;
            self.input[i] = state;
            self.input_not[i] = ! state;
        }

        let flags = dio::high.get(data);
        mirror(&self.name, &mut self.input_error, flags.input_error(), "input communication error");
        mirror(&self.name, &mut self.output_error, flags.output_error(), "output communication error");
        mirror(&self.name, &mut self.output_fault, flags.output_fault(), "output fault");
    }

    fn write(&mut self, _period: i64, data: &mut [u8]) {
        let mut words = [0u32; 2];
        for i in 0 .. dio::PINS {
            if self.output[i] != self.output_invert[i] {
                words[i >> 5] |= 1 << (i & 0x1f);
            }
        }
        dio::low.set(data, words[0]);

        let mut high = DioHigh::default();
        high.set_pins(words[1] as u16);
        high.set_input_error(self.input_error_reset);
        high.set_output_error(self.output_error_reset);
        high.set_output_fault(self.output_fault_reset);
        dio::high.set(data, high);
    }

    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

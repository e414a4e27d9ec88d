/*!
    drivers of the module types of the FPGA

    | type code | driver           | channels | role                                          |
    |-----------|------------------|----------|-----------------------------------------------|
    | 1         | [Watchdog]       | 1        | heartbeat keeping the FPGA outputs enabled    |
    | 2         | [Dio]            | 48 pins  | digital inputs and outputs                    |
    | 3         | [Dac]            | 6        | analog outputs as duty cycles                 |
    | 4         | [Encoder]        | 4        | quadrature counters with index and velocity   |
    | 5         | [Stepgen]        | 4        | step pulse generators                         |
    | 6         | [PhaseEncoder]   | 2        | capacitive linear phase encoders              |

    Each driver exposes its per-channel commands, parameters and feedbacks as public fields, to be set and read between cycles.
*/

mod watchdog;
mod dio;
mod dac;
mod encoder;
mod stepgen;
mod phase;

pub use watchdog::*;
pub use dio::*;
pub use dac::*;
pub use encoder::*;
pub use stepgen::*;
pub use phase::*;


/// scales closer to zero than this are replaced by 1
pub const MIN_SCALE: f64 = 1e-20;

/// store a sticky error flag, true only when it goes from clear to raised
pub(crate) fn raised(flag: &mut bool, state: bool) -> bool {
    let rising = state && ! *flag;
    *flag = state;
    rising
}

/**
    reciprocal of a user scale, refreshed only when the scale changes

    A scale in `(-MIN_SCALE, MIN_SCALE)` is replaced by `1.0` in the user field itself before being inverted, so no division by zero can happen.
*/
#[derive(Copy, Clone, Debug)]
pub(crate) struct Reciprocal {
    /// scale the reciprocal was computed from
    scale: f64,
    /// numerator over the scale
    value: f64,
}
impl Reciprocal {
    /// reciprocal that will be computed at the first update
    pub fn new(value: f64) -> Self {
        // NaN is never equal to a scale so the first update always refreshes
        Self {scale: f64::NAN, value}
    }
    /// refresh the reciprocal if `scale` changed, `scale` is corrected in place if it is too small
    pub fn update(&mut self, scale: &mut f64, numerator: f64) -> f64 {
        if *scale != self.scale {
            if *scale < MIN_SCALE && *scale > -MIN_SCALE  {*scale = 1.0}
            self.scale = *scale;
            self.value = numerator / *scale;
        }
        self.value
    }
    pub fn value(&self) -> f64  {self.value}
}

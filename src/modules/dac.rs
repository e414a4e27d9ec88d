use core::any::Any;
use crate::{
    error::BusResult,
    module::{Driver, ModuleContext},
    registers::dac,
    };
use super::Reciprocal;


/// one analog output
#[derive(Clone, Debug)]
pub struct DacChannel {
    pub enable: bool,
    /// output the absolute value of the command
    pub absmode: bool,
    /// command in user units
    pub value: f64,
    /// user units for a full duty cycle
    pub scale: f64,
    /// duty cycle added to the scaled command
    pub offset: f64,
    /// lowest duty cycle, kept in `[-1, max_dc]`
    pub min_dc: f64,
    /// highest duty cycle, kept in `[min_dc, 1]`
    pub max_dc: f64,

    /// duty cycle currently output
    pub curr_dc: f64,
    /// the command is positive
    pub pos: bool,
    /// the command is negative
    pub neg: bool,

    recip: Reciprocal,
}
impl Default for DacChannel {
    fn default() -> Self {
        Self {
            enable: false,
            absmode: false,
            value: 0.,
            scale: 1.,
            offset: 0.,
            min_dc: -1.,
            max_dc: 1.,
            curr_dc: 0.,
            pos: false,
            neg: false,
            recip: Reciprocal::new(1.),
        }
    }
}
impl DacChannel {
    /// compute the raw 16 bit value to output, updating the feedbacks
    fn raw(&mut self) -> u16 {
        if self.max_dc > 1.  {self.max_dc = 1.}
        if self.min_dc > self.max_dc  {self.min_dc = self.max_dc}
        if self.min_dc < -1.  {self.min_dc = -1.}
        if self.max_dc < self.min_dc  {self.max_dc = self.min_dc}

        let recip = self.recip.update(&mut self.scale, 1.);
        let value = if self.absmode  {self.value.abs()} else {self.value};
        let dc = (value * recip + self.offset).max(self.min_dc).min(self.max_dc);

        if ! self.enable {
            self.pos = false;
            self.neg = false;
            self.curr_dc = 0.;
            dac::ZERO
        }
        else {
            self.pos = self.value > 0.;
            self.neg = self.value < 0.;
            self.curr_dc = dc;
            (f64::from(dac::ZERO) + dac::AMPLITUDE * dc)
                .max(0.)
                .min(f64::from(u16::MAX)) as u16
        }
    }
}

/// 6 analog outputs, driven as duty cycles of the output range
#[derive(Debug)]
pub struct Dac {
    name: String,
    pub channels: [DacChannel; dac::CHANNELS],
}

impl Dac {
    pub fn new(context: &ModuleContext) -> BusResult<Self> {
        Ok(Self {
            name: context.name("dac"),
            channels: Default::default(),
        })
    }
    pub fn name(&self) -> &str  {&self.name}
}

impl Driver for Dac {
    fn kind(&self) -> &'static str  {"dac"}
    fn data_len(&self) -> u16  {dac::LEN}

    /// output only
    fn read(&mut self, _period: i64, _data: &[u8]) {}

    fn write(&mut self, _period: i64, data: &mut [u8]) {
        data.fill(0);
        for (i, channel) in self.channels.iter_mut().enumerate() {
            dac::channel(i).set(data, channel.raw());
        }
    }

    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

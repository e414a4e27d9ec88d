use core::{
    any::Any,
    f64::consts::PI,
    };
use crate::{
    error::{BusError, BusResult},
    module::{Driver, ModuleContext},
    registers::{phase, PhaseFlags, PhaseTiming},
    };


/// steps of the filtered position per user unit
const FILTER_RESOLUTION: f64 = 1e3;
/// the filtered position only moves when the raw position is farther than this
const FILTER_HYSTERESIS: f64 = 0.0005;

/// position decoded from one sample of the sensor array
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Decoded {
    /// whole periods of the array, in user units
    lores: f64,
    sin: f64,
    cos: f64,
    /// amplitude of the signal
    level: f64,
    /// position inside the array period, in user units
    hires: f64,
}
impl Decoded {
    fn new(count: i32, sin: i32, cos: i32, array_len: f64, factor: f64) -> Self {
        let lores = f64::from(count) * array_len;
        let sin = f64::from(sin) * factor;
        let cos = f64::from(cos) * factor;
        let level = (sin*sin + cos*cos).sqrt();
        let cosphi = if level != 0.  {cos / level} else {1.};
        let mut hires = cosphi.acos() / (2.*PI) * array_len;
        if sin < 0.  {hires = -hires}
        Self {lores, sin, cos, level, hires}
    }
    fn position(&self, invert: bool) -> f64 {
        let position = self.lores + self.hires;
        if invert  {-position} else {position}
    }
}

/// one linear phase encoder
#[derive(Clone, Debug, Default)]
pub struct PhaseChannel {
    /// latch the position at the next entry in the reference area, cleared once done
    pub area_enable: bool,
    /// invert the reference area detection
    pub area_invert: bool,
    /// invert the position
    pub pos_invert: bool,

    pub raw_counts: i32,
    pub sin: f64,
    pub cos: f64,
    pub lores: f64,
    pub hires: f64,
    /// amplitude of the sensor signal
    pub level: f64,
    pub level_warn: bool,
    pub level_err: bool,
    /// decoded position
    pub raw_pos: f64,
    /// decoded position, quantized with hysteresis
    pub flt_pos: f64,
    /// filtered position relative to the reference area
    pub pos: f64,
    /// sensor currently in the reference area
    pub area_state: bool,
    /// position latched in the reference area
    pub area_pos: f64,
}

/**
    2 capacitive linear encoders

    The sensor array of each channel gives a count of whole array periods, and a sine/cosine pair locating the position inside the period. The FPGA also latches a sample when the sensor enters the reference area.
*/
#[derive(Debug)]
pub struct PhaseEncoder {
    name: String,
    /// ticks per nanosecond
    factor_ns: f64,
    /// level below which [PhaseChannel::level_warn] is raised, 0 disables
    pub level_warn: f64,
    /// level below which [PhaseChannel::level_err] is raised, 0 disables
    pub level_err: f64,
    /// length of an array period, in user units
    pub array_len: f64,
    /// number of sensors in the array
    pub array_cnt: u32,
    /// sensor timings in nanoseconds
    pub time_top: u32,
    pub time_scan: u32,
    pub time_disch: u32,
    pub time_take: u32,
    pub channels: [PhaseChannel; phase::CHANNELS],
}

impl PhaseEncoder {
    pub fn new(context: &ModuleContext) -> BusResult<Self> {
        if context.tick_rate == 0
            {return Err(BusError::ModuleInit("phase encoder needs a non zero tick rate"))}
        Ok(Self {
            name: context.name("phpe"),
            factor_ns: f64::from(context.tick_rate) / 1e9,
            level_warn: 0.,
            level_err: 0.,
            array_len: 0.635,
            array_cnt: 10,
            time_top: 42000,
            time_scan: 28400,
            time_disch: 28600,
            time_take: 28200,
            channels: Default::default(),
        })
    }
    pub fn name(&self) -> &str  {&self.name}

    /// conversion from raw sine and cosine to signal amplitude
    fn sincos_factor(&self) -> f64 {
        1. / (f64::from(self.array_cnt.max(1)) * 65536.)
    }
    /// duration in ticks, truncated to the 16 bits of the timing registers
    fn ticks(&self, ns: u32) -> u16 {
        ((self.factor_ns * f64::from(ns)) as u32 & 0xffff) as u16
    }
}

impl Driver for PhaseEncoder {
    fn kind(&self) -> &'static str  {"phpe"}
    fn data_len(&self) -> u16  {phase::LEN}

    fn read(&mut self, _period: i64, data: &[u8]) {
        let factor = self.sincos_factor();

        for (i, channel) in self.channels.iter_mut().enumerate() {
            let registers = phase::channel(i);
            let flags = registers.flags.get(data);
            channel.area_state = flags.area_state();

            if flags.area_latched() && channel.area_enable {
                channel.area_enable = false;
                let area = Decoded::new(
                    registers.area.count.get(data),
                    registers.area.sin.get(data),
                    registers.area.cos.get(data),
                    self.array_len, factor);
                channel.area_pos = area.position(channel.pos_invert);
            }

            let count = registers.live.count.get(data);
            let live = Decoded::new(
                count,
                registers.live.sin.get(data),
                registers.live.cos.get(data),
                self.array_len, factor);
            let position = live.position(channel.pos_invert);

            channel.raw_counts = count;
            channel.lores = live.lores;
            channel.sin = live.sin;
            channel.cos = live.cos;
            channel.level = live.level;
            channel.hires = live.hires;
            channel.raw_pos = position;

            if (channel.flt_pos - position).abs() > FILTER_HYSTERESIS {
                channel.flt_pos = f64::from((position * FILTER_RESOLUTION) as i32) * (1. / FILTER_RESOLUTION);
            }
            channel.pos = channel.flt_pos - channel.area_pos;

            channel.level_warn = self.level_warn > 0. && live.level < self.level_warn;
            channel.level_err = self.level_err > 0. && live.level < self.level_err;
        }
    }

    fn write(&mut self, _period: i64, data: &mut [u8]) {
        // the rest of the window is input only, and may overlap a neighbour
        phase::control.set(data, 0);

        let mut scan = PhaseTiming::default();
        scan.set_first(self.ticks(self.time_top));
        scan.set_second(self.ticks(self.time_scan));
        phase::timing_scan.set(data, scan);

        let mut take = PhaseTiming::default();
        take.set_first(self.ticks(self.time_disch));
        take.set_second(self.ticks(self.time_take));
        phase::timing_take.set(data, take);

        for (i, channel) in self.channels.iter().enumerate() {
            let mut flags = PhaseFlags::default();
            flags.set_area_invert(channel.area_invert);
            phase::channel(i).flags.set(data, flags);
        }
    }

    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

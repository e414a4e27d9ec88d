use core::any::Any;
use crate::{
    error::{BusError, BusResult},
    module::{Driver, ModuleContext},
    registers::encoder,
    };
use super::Reciprocal;


/// number of significant bits in a hardware counter sample
pub const SAMPLE_BITS: u32 = 31;

/**
    expand a counter sample of [SAMPLE_BITS] bits to 32 bits, knowing the previous expanded value

    The difference between the sample and the previous value is brought back to `[-2^30, 2^30)`, so the result is exact as long as the counter moves by less than `2^30` between two samples. The top bit of `sample` is ignored, it can be a flag.
*/
pub fn unwind(previous: i32, sample: u32) -> i32 {
    // both values are shifted to the top of 32 bits, so the wrapping difference wraps at the sample width
    let difference = ((sample << 1) as i32).wrapping_sub(previous.wrapping_shl(1));
    previous.wrapping_add(difference >> 1)
}


/// one quadrature counter
#[derive(Clone, Debug)]
pub struct EncoderChannel {
    /// latch the count at the next index pulse as the new zero, cleared once done
    pub index_enable: bool,
    /// reset the count to zero
    pub reset: bool,
    /// counts per user unit
    pub scale: f64,

    /// unwound hardware count of the current cycle
    pub raw_counts: i32,
    /// count at the last edge, relative to the index
    pub count: i32,
    /// position at the last edge in user units
    pub pos: f64,
    /// position extrapolated to the current cycle
    pub pos_interp: f64,
    /// velocity in user units per second
    pub vel: f64,

    init: bool,
    /// last unwound sample, reference for the next unwinding
    expanded: i32,
    /// count at the last edge
    raw_count: i32,
    /// timebase at the last edge
    timestamp: u32,
    /// count latched at the last index pulse
    index_count: i32,
    recip: Reciprocal,
    /// edges seen since the last velocity timeout, saturates at 2
    counts_since_timeout: u8,
}
impl Default for EncoderChannel {
    fn default() -> Self {
        Self {
            index_enable: false,
            reset: false,
            scale: 1.,
            raw_counts: 0,
            count: 0,
            pos: 0.,
            pos_interp: 0.,
            vel: 0.,
            init: true,
            expanded: 0,
            raw_count: 0,
            timestamp: 0,
            index_count: 0,
            recip: Reciprocal::new(1.),
            counts_since_timeout: 0,
        }
    }
}

/**
    4 quadrature encoder counters

    The FPGA counts edges on 31 bits and timestamps the last edge with its timebase. The driver unwinds the counters to 32 bits, latches the index pulses, and estimates the velocity from the edge timestamps. Without new edge the velocity estimate decays, and falls to zero after [Self::timeout] seconds.
*/
#[derive(Debug)]
pub struct Encoder {
    name: String,
    tick_rate: f64,
    /// seconds without edge after which the velocity is considered zero
    pub timeout: f64,
    pub channels: [EncoderChannel; encoder::CHANNELS],
}

impl Encoder {
    pub fn new(context: &ModuleContext) -> BusResult<Self> {
        if context.tick_rate == 0
            {return Err(BusError::ModuleInit("encoder needs a non zero tick rate"))}
        Ok(Self {
            name: context.name("enc"),
            tick_rate: f64::from(context.tick_rate),
            timeout: 0.1,
            channels: Default::default(),
        })
    }
    pub fn name(&self) -> &str  {&self.name}
}

impl Driver for Encoder {
    fn kind(&self) -> &'static str  {"enc"}
    fn data_len(&self) -> u16  {encoder::LEN}

    fn read(&mut self, _period: i64, data: &[u8]) {
        let timebase = encoder::timebase.get(data);
        let timeout = (self.tick_rate * self.timeout) as u32;

        for (i, channel) in self.channels.iter_mut().enumerate() {
            let registers = encoder::channel(i);
            let recip = channel.recip.update(&mut channel.scale, 1.);

            let count_sample = u32::from(registers.count.get(data));
            let timestamp = registers.timestamp.get(data);
            let index_sample = u32::from(registers.index.get(data));

            let raw_count = unwind(channel.expanded, count_sample);
            let index_count = unwind(channel.expanded, index_sample);
            channel.expanded = raw_count;
            channel.raw_counts = raw_count;

            let mut count_flag = registers.count.get(data).flag();
            let mut index_flag = registers.index.get(data).flag();

            if channel.init || channel.reset {
                channel.init = false;
                channel.raw_count = raw_count;
                channel.index_count = raw_count;
                count_flag = false;
                index_flag = false;
            }

            if index_flag && channel.index_enable {
                channel.index_count = index_count;
                channel.index_enable = false;
            }

            if count_flag {
                let delta_counts = raw_count.wrapping_sub(channel.raw_count);
                let delta_time = timestamp.wrapping_sub(channel.timestamp);
                channel.raw_count = raw_count;
                channel.timestamp = timestamp;
                // the first edges after a timeout give no reliable interval
                if channel.counts_since_timeout < 2 {
                    channel.counts_since_timeout += 1;
                }
                else {
                    channel.vel = f64::from(delta_counts) * recip / (f64::from(delta_time) / self.tick_rate);
                }
            }
            else if channel.counts_since_timeout != 0 {
                let delta_time = timebase.wrapping_sub(channel.timestamp);
                if delta_time < timeout {
                    // velocity if an edge arrived now, the previous velocity cannot be faster
                    let bound = (recip / (f64::from(delta_time) / self.tick_rate)).abs();
                    if bound < channel.vel  {channel.vel = bound}
                    if -bound > channel.vel  {channel.vel = -bound}
                }
                else {
                    channel.counts_since_timeout = 0;
                    channel.vel = 0.;
                }
            }
            else {
                channel.vel = 0.;
            }

            channel.count = channel.raw_count.wrapping_sub(channel.index_count);
            channel.pos = f64::from(channel.count) * recip;
            let elapsed = f64::from(timebase.wrapping_sub(channel.timestamp)) / self.tick_rate;
            channel.pos_interp = channel.pos + channel.vel * elapsed;
        }
    }

    /// input only
    fn write(&mut self, _period: i64, data: &mut [u8]) {
        data.fill(0);
    }

    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

use core::any::Any;
use crate::{
    error::{BusError, BusResult},
    module::{Driver, ModuleContext},
    registers::stepgen,
    };
use super::Reciprocal;


/// control period assumed before the first write (ns)
const DEFAULT_PERIOD: i64 = 1_000_000;
/// position error below which the velocity command is applied as is (steps)
const POSITION_TOLERANCE: f64 = 1e-4;

/// round `value` up to a multiple of `increment`, 0 stays 0
pub fn ulceil(value: u32, increment: u32) -> u32 {
    if value == 0  {return 0}
    increment.saturating_mul((value - 1) / increment + 1)
}

/**
    64 bit phase accumulator of a hardware step generator, with [stepgen::FRACTIONAL_BITS] fractional bits

    A step is issued each time the integer part changes. The accumulator starts half a step away from an integer so steps happen between integer positions.
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Accumulator(pub i64);
impl Accumulator {
    /// offset of half a step applied at startup
    pub const HALF_STEP: i64 = 1 << (stepgen::FRACTIONAL_BITS - 1);
    /// value of one step
    pub const ONE: f64 = (1u64 << stepgen::FRACTIONAL_BITS) as f64;

    pub fn from_words(high: u32, low: u32) -> Self {
        Self(((u64::from(high) << 32) | u64::from(low)) as i64)
    }
    /// integer part, the step count
    pub fn count(self) -> i32 {
        (self.0 >> stepgen::FRACTIONAL_BITS) as i32
    }
    /// position in steps, without the half step offset
    pub fn steps(self) -> f64 {
        self.0.wrapping_sub(Self::HALF_STEP) as f64 / Self::ONE
    }
    /// position without the half step offset, multiplied by `factor`
    fn scaled(self, factor: f64) -> f64 {
        self.0.wrapping_sub(Self::HALF_STEP) as f64 * factor
    }
}
impl Default for Accumulator {
    fn default() -> Self  {Self(Self::HALF_STEP)}
}

/// pulse timings in nanoseconds, rounded up to whole hardware ticks when applied
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepTiming {
    /// duration of a step pulse
    pub step_len: u32,
    /// minimum duration between two step pulses
    pub step_space: u32,
    /// minimum duration between a direction change and the next step
    pub dir_setup: u32,
    /// minimum duration between a step and a direction change
    pub dir_hold: u32,
}
impl Default for StepTiming {
    fn default() -> Self {
        Self {step_len: 1, step_space: 1, dir_setup: 1, dir_hold: 1}
    }
}

/// one step generator
#[derive(Clone, Debug)]
pub struct StepChannel {
    pub enable: bool,
    /// follow [Self::pos_cmd] instead of [Self::vel_cmd]
    pub pos_mode: bool,
    /// position command in user units
    pub pos_cmd: f64,
    /// velocity command in user units per second
    pub vel_cmd: f64,
    /// steps per user unit
    pub scale: f64,
    /// velocity limit in user units per second, 0 for the hardware limit
    pub maxvel: f64,
    /// acceleration limit in user units per second², 0 for the hardware limit
    pub maxaccel: f64,

    /// step count
    pub count: i32,
    /// position in user units
    pub pos_fb: f64,
    /// frequency commanded to the hardware, in steps per second
    pub freq: f64,

    accum: Accumulator,
    /// previous position command in steps
    old_pos_cmd: f64,
    recip: Reciprocal,
    warned: bool,
}
impl Default for StepChannel {
    fn default() -> Self {
        Self {
            enable: false,
            pos_mode: false,
            pos_cmd: 0.,
            vel_cmd: 0.,
            scale: 1.,
            maxvel: 0.,
            maxaccel: 0.,
            count: 0,
            pos_fb: 0.,
            freq: 0.,
            accum: Accumulator::default(),
            old_pos_cmd: 0.,
            recip: Reciprocal::new(1. / Accumulator::ONE),
            warned: false,
        }
    }
}
impl StepChannel {
    /// last accumulator read from the hardware
    pub fn accumulator(&self) -> Accumulator  {self.accum}
}

/// limits of a channel for the current cycle, in steps
struct Limits {
    /// maximum frequency (steps/s)
    freq: f64,
    /// maximum acceleration (steps/s²)
    accel: f64,
}

/// period dependent constants
#[derive(Copy, Clone, Debug)]
struct Period {
    /// period used to compute the others (ns)
    ns: i64,
    /// seconds
    dt: f64,
    recip_dt: f64,
}
impl Period {
    fn new(ns: i64) -> Self {
        let dt = ns as f64 * 1e-9;
        Self {ns, dt, recip_dt: 1. / dt}
    }
}

/**
    4 step pulse generators

    Each channel of the FPGA adds a phase increment to a 64 bit accumulator every tick, and issues a step pulse every time the integer part of the accumulator changes. The hardware glides the increment toward its target within the acceleration limit given, so the motion stays smooth between control cycles.

    Every cycle the driver converts the position or velocity command of each channel into the phase increment to target, taking care of the velocity and acceleration limits.
*/
#[derive(Debug)]
pub struct Stepgen {
    name: String,
    /// pulse timings, shared by all channels
    pub timing: StepTiming,
    /// timings last applied, `None` before the first write
    applied: Option<StepTiming>,
    step_len_ticks: u32,
    dir_setup_ticks: u32,
    dir_hold_ticks: u32,

    /// duration of a hardware tick, rounded down (ns)
    tick_ns: u32,
    /// conversion from steps/s to phase increment
    freq_scale: f64,
    /// conversion from steps/s² to acceleration word
    accel_scale: f64,
    /// highest acceleration the hardware register can hold (steps/s²)
    max_accel: f64,
    period: Period,

    pub channels: [StepChannel; stepgen::CHANNELS],
}

impl Stepgen {
    pub fn new(context: &ModuleContext) -> BusResult<Self> {
        let tick_ns = 1_000_000_000 / context.tick_rate.max(1);
        if context.tick_rate == 0 || tick_ns == 0
            {return Err(BusError::ModuleInit("step generator needs a tick rate between 1Hz and 1GHz"))}
        let tick = 1. / f64::from(context.tick_rate);
        let freq_scale = Accumulator::ONE * tick;
        let accel_scale = freq_scale * tick * stepgen::ACCEL_DIV;
        Ok(Self {
            name: context.name("step"),
            timing: StepTiming::default(),
            applied: None,
            step_len_ticks: 0,
            dir_setup_ticks: 0,
            dir_hold_ticks: 0,
            tick_ns,
            freq_scale,
            accel_scale,
            max_accel: (stepgen::ACCEL_DIV - 1.) / accel_scale,
            period: Period::new(DEFAULT_PERIOD),
            channels: Default::default(),
        })
    }
    pub fn name(&self) -> &str  {&self.name}
    /// step length in hardware ticks, as last written
    pub fn step_len_ticks(&self) -> u32  {self.step_len_ticks}
    /// direction setup time in hardware ticks, as last written
    pub fn dir_setup_ticks(&self) -> u32  {self.dir_setup_ticks}
    /// direction hold time in hardware ticks, as last written
    pub fn dir_hold_ticks(&self) -> u32  {self.dir_hold_ticks}

    /// round the timings that changed to whole ticks
    fn update_timing(&mut self) {
        let tick = self.tick_ns;
        let applied = self.applied;
        let changed = |current: u32, pick: fn(&StepTiming) -> u32|
            applied.map_or(true, |applied| pick(&applied) != current);
        let timing = &mut self.timing;

        if changed(timing.step_len, |t| t.step_len) {
            if timing.step_len == 0  {timing.step_len = 1}
            timing.step_len = ulceil(timing.step_len, tick);
            self.step_len_ticks = timing.step_len / tick;
        }
        if changed(timing.step_space, |t| t.step_space) {
            timing.step_space = ulceil(timing.step_space, tick);
        }
        if changed(timing.dir_setup, |t| t.dir_setup) {
            timing.dir_setup = ulceil(timing.dir_setup, tick);
            self.dir_setup_ticks = timing.dir_setup / tick;
        }
        if changed(timing.dir_hold, |t| t.dir_hold) {
            // the direction change needs at least one tick
            if timing.dir_hold.saturating_add(timing.dir_setup) == 0  {timing.dir_hold = 1}
            timing.dir_hold = ulceil(timing.dir_hold, tick);
            self.dir_hold_ticks = timing.dir_hold / tick;
        }
        self.applied = Some(*timing);
    }
}

impl StepChannel {
    /// apply the user limits to the hardware limits, user limits too high are lowered
    fn limits(&mut self, name: &str, index: usize, max_freq: f64, max_accel: f64, period: &Period) -> Limits {
        let scale = self.scale.abs();
        let mut freq = max_freq;
        if self.maxvel <= 0. {
            self.maxvel = 0.;
        }
        else if self.maxvel * scale > freq {
            if ! self.warned {
                log::warn!("{}: channel {} maximum velocity of {} steps/s is too high, the maximum is {} steps/s",
                    name, index, (self.maxvel * scale) as i64, freq as i64);
                self.warned = true;
            }
            self.maxvel = freq / scale;
        }
        else {
            freq = self.maxvel * scale;
            self.warned = false;
        }

        // zero to full speed in one period, within the hardware limit
        let mut accel = (freq * period.recip_dt).min(max_accel);
        if self.maxaccel <= 0. {
            self.maxaccel = 0.;
        }
        else if self.maxaccel * scale > accel {
            self.maxaccel = accel / scale;
        }
        else {
            accel = self.maxaccel * scale;
        }
        Limits {freq, accel}
    }

    /// next frequency following a position command
    fn follow_position(&mut self, limits: &Limits, period: &Period) -> f64 {
        let pos_cmd = self.pos_cmd * self.scale;
        let vel_cmd = (pos_cmd - self.old_pos_cmd) * period.recip_dt;
        self.old_pos_cmd = pos_cmd;

        let curr_pos = self.accum.steps();
        let curr_vel = self.freq;

        // ramp needed to match the velocity command
        let mut match_ac = if vel_cmd > curr_vel  {limits.accel} else {-limits.accel};
        let match_time = (vel_cmd - curr_vel) / match_ac;
        // position error at the end of the ramp
        let avg_v = (vel_cmd + curr_vel) * 0.5;
        let est_out = curr_pos + avg_v * match_time;
        let est_cmd = pos_cmd + vel_cmd * (match_time - 1.5 * period.dt);
        let est_err = est_out - est_cmd;

        let new_vel = if match_time < period.dt {
            // velocity can be matched in one period
            if est_err.abs() < POSITION_TOLERANCE {
                vel_cmd
            }
            else {
                let max_dv = limits.accel * period.dt;
                (vel_cmd - 0.5 * est_err * period.recip_dt)
                    .min(curr_vel + max_dv)
                    .max(curr_vel - max_dv)
            }
        }
        else {
            // ramping the other way during one period changes the final position by dp
            let dv = -2. * match_ac * period.dt;
            let dp = dv * match_time;
            if (est_err + dp * 2.).abs() < est_err.abs() {
                match_ac = -match_ac;
            }
            curr_vel + match_ac * period.dt
        };
        new_vel.min(limits.freq).max(-limits.freq)
    }

    /// next frequency following a velocity command
    fn follow_velocity(&self, limits: &Limits, period: &Period) -> f64 {
        let vel_cmd = (self.vel_cmd * self.scale).min(limits.freq).max(-limits.freq);
        let dv = limits.accel * period.dt;
        if vel_cmd > self.freq + dv  {self.freq + dv}
        else if vel_cmd < self.freq - dv  {self.freq - dv}
        else  {vel_cmd}
    }
}

impl Driver for Stepgen {
    fn kind(&self) -> &'static str  {"step"}
    fn data_len(&self) -> u16  {stepgen::LEN}

    fn read(&mut self, _period: i64, data: &[u8]) {
        for (i, channel) in self.channels.iter_mut().enumerate() {
            let registers = stepgen::channel(i);
            channel.accum = Accumulator::from_words(
                registers.accum_high.get(data),
                registers.accum_low.get(data),
                );
            channel.count = channel.accum.count();
            let recip = channel.recip.update(&mut channel.scale, 1. / Accumulator::ONE);
            channel.pos_fb = channel.accum.scaled(recip);
        }
    }

    fn write(&mut self, period: i64, data: &mut [u8]) {
        data.fill(0);

        self.update_timing();
        if period != self.period.ns && period > 0 {
            self.period = Period::new(period);
        }

        stepgen::step_len.set(data, self.step_len_ticks);
        stepgen::dir_hold.set(data, self.dir_hold_ticks);
        stepgen::dir_setup.set(data, self.dir_setup_ticks);

        let min_step_period = u64::from(self.timing.step_len) + u64::from(self.timing.step_space);
        let max_freq = 1. / (min_step_period as f64 * 1e-9);

        for (i, channel) in self.channels.iter_mut().enumerate() {
            let registers = stepgen::channel(i);
            channel.recip.update(&mut channel.scale, 1. / Accumulator::ONE);

            let limits = channel.limits(&self.name, i, max_freq, self.max_accel, &self.period);
            registers.acceleration.set(data, (limits.accel * self.accel_scale) as u32);

            if ! channel.enable {
                // keep tracking the position command so enabling does not jump
                if channel.pos_mode {
                    channel.old_pos_cmd = channel.pos_cmd * channel.scale;
                }
                channel.freq = 0.;
                continue
            }

            channel.freq =
                if channel.pos_mode  {channel.follow_position(&limits, &self.period)}
                else  {channel.follow_velocity(&limits, &self.period)};
            // the maximum frequency can slightly exceed the word range
            let word = (channel.freq * self.freq_scale).clamp(f64::from(i32::MIN), f64::from(i32::MAX));
            registers.frequency.set(data, word as i32);
        }
    }

    fn as_any(&self) -> &dyn Any  {self}
    fn as_any_mut(&mut self) -> &mut dyn Any  {self}
}

/*!
    structs and consts for every register of the configuration table and of the module windows. This should be used instead of any hardcoded register value.

    The goal of this file is to gather all hardware registers at one place, so what you see here is exactly what you can expect in the FPGA, no more, no less.

    All registers are 32 bit little endian words. Module fields are given relative to the start of the module window, not to the port image.
*/

use bilge::prelude::*;
use crate::data::{self, Field};

/// maximum number of words in the configuration table of a port, hence maximum number of modules per port
pub const MAX_MODULES: usize = 16;

/// one word of the configuration table
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Default, Eq, PartialEq)]
pub struct ModuleDescriptor {
    /// module type code, `0` terminates the table
    pub kind: u16,
    /// byte address of the module window in the port register space
    pub start: u16,
}
data::bilge_register!(ModuleDescriptor, u32);

/// module type codes as burnt in the FPGA configuration table, they must never be renumbered
pub mod kind {
    /// end of the configuration table
    pub const END: u16 = 0;
    pub const WATCHDOG: u16 = 1;
    pub const DIO: u16 = 2;
    pub const DAC: u16 = 3;
    pub const ENCODER: u16 = 4;
    pub const STEPGEN: u16 = 5;
    pub const PHASE: u16 = 6;
}

pub mod watchdog {
    use super::*;

    pub const LEN: u16 = 4;
    /// random value exchanged with the FPGA, and enable flag on write
    pub const heartbeat: Field<Heartbeat> = Field::word(0);
}

/// watchdog heartbeat word
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Default, Eq, PartialEq)]
pub struct Heartbeat {
    /// pseudo random value produced by the FPGA, echoed back by the driver
    pub rand: u16,
    /// keeps the FPGA outputs enabled, only meaningful on write
    pub enable: bool,
    reserved: u15,
}
data::bilge_register!(Heartbeat, u32);

pub mod dio {
    use super::*;

    pub const LEN: u16 = 8;
    pub const PINS: usize = 48;
    /// pins 0 to 31
    pub const low: Field<u32> = Field::word(0);
    /// pins 32 to 47 and fault flags
    pub const high: Field<DioHigh> = Field::word(1);

    /// word holding the given pin, and bit of the pin in this word
    pub const fn pin(index: usize) -> (Field<u32>, usize) {
        (Field::word(index >> 5), index & 0x1f)
    }
}

/**
    second word of a digital I/O module

    Read from the FPGA the flags report faults, written to the FPGA they request the reset of the matching fault.
*/
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Default, Eq, PartialEq)]
pub struct DioHigh {
    /// pins 32 to 47
    pub pins: u16,
    pub output_fault: bool,
    pub output_error: bool,
    pub input_error: bool,
    reserved: u13,
}
data::bilge_register!(DioHigh, u32);

pub mod dac {
    use super::*;

    pub const LEN: u16 = 12;
    pub const CHANNELS: usize = 6;
    /// raw value at mid range, output is 0
    pub const ZERO: u16 = 0x8000;
    /// raw amplitude of a full duty cycle
    pub const AMPLITUDE: f64 = 0x7fff as f64;

    /// 16 bit raw value of a channel, even channels in the low half of a word, odd channels in the high half
    pub const fn channel(index: usize) -> Field<u16> {
        Field::simple(index * 2)
    }
}

pub mod encoder {
    use super::*;

    pub const LEN: u16 = 52;
    pub const CHANNELS: usize = 4;
    /// free running counter of hardware ticks, sampled with the image
    pub const timebase: Field<u32> = Field::word(0);

    /// registers of one encoder channel
    #[derive(Copy, Clone, Debug)]
    pub struct Channel {
        /// count and edge flag
        pub count: Field<CounterSample>,
        /// timebase value at the last counted edge
        pub timestamp: Field<u32>,
        /// count latched at the last index pulse and index flag
        pub index: Field<CounterSample>,
    }
    pub const fn channel(index: usize) -> Channel {
        let word = 1 + 3*index;
        Channel {
            count: Field::word(word),
            timestamp: Field::word(word + 1),
            index: Field::word(word + 2),
        }
    }
}

/// a counter value truncated to 31 bits, tagged with an event flag
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Default, Eq, PartialEq)]
pub struct CounterSample {
    pub count: u31,
    /// set when the event (edge or index) happened since the previous sample
    pub flag: bool,
}
data::bilge_register!(CounterSample, u32);

pub mod stepgen {
    use super::*;

    pub const LEN: u16 = 76;
    pub const CHANNELS: usize = 4;
    /// number of fractional bits of the phase accumulator
    pub const FRACTIONAL_BITS: u32 = 32;
    /// the acceleration limit word has 16 fractional bits
    pub const ACCEL_DIV: f64 = (1u32 << 16) as f64;

    /// step pulse length in ticks
    pub const step_len: Field<u32> = Field::word(0);
    /// direction hold time in ticks
    pub const dir_hold: Field<u32> = Field::word(1);
    /// direction setup time in ticks
    pub const dir_setup: Field<u32> = Field::word(2);

    /// registers of one step generator channel
    #[derive(Copy, Clone, Debug)]
    pub struct Channel {
        /// phase increment added to the accumulator every tick (output)
        pub frequency: Field<i32>,
        /// maximum change of the phase increment per tick (output)
        pub acceleration: Field<u32>,
        /// high word of the phase accumulator (input)
        pub accum_high: Field<u32>,
        /// low word of the phase accumulator (input)
        pub accum_low: Field<u32>,
    }
    pub const fn channel(index: usize) -> Channel {
        let word = 3 + 4*index;
        Channel {
            frequency: Field::word(word),
            acceleration: Field::word(word + 1),
            accum_high: Field::word(word + 2),
            accum_low: Field::word(word + 3),
        }
    }
}

pub mod phase {
    use super::*;

    /// the hardware header declares 48 bytes, but the area sample of the second channel ends at byte 60
    pub const LEN: u16 = 60;
    pub const CHANNELS: usize = 2;
    /// flag bytes of all channels, the only word of the module written besides the timings
    pub const control: Field<u32> = Field::word(0);
    /// top and scan times, in ticks
    pub const timing_scan: Field<PhaseTiming> = Field::word(1);
    /// discharge and take times, in ticks
    pub const timing_take: Field<PhaseTiming> = Field::word(2);

    /// one sample of the sensor array
    #[derive(Copy, Clone, Debug)]
    pub struct Sample {
        /// whole periods of the array
        pub count: Field<i32>,
        pub sin: Field<i32>,
        pub cos: Field<i32>,
    }
    /// registers of one phase encoder channel
    #[derive(Copy, Clone, Debug)]
    pub struct Channel {
        pub flags: Field<PhaseFlags>,
        /// continuously updated sample
        pub live: Sample,
        /// sample latched when entering the reference area
        pub area: Sample,
    }
    pub const fn channel(index: usize) -> Channel {
        let word = 3 + 6*index;
        Channel {
            flags: Field::simple(index),
            live: Sample {
                count: Field::word(word),
                sin: Field::word(word + 1),
                cos: Field::word(word + 2),
            },
            area: Sample {
                count: Field::word(word + 3),
                sin: Field::word(word + 4),
                cos: Field::word(word + 5),
            },
        }
    }
}

/// per channel flag byte of a phase encoder, channel `i` uses byte `i` of the first word
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Default, Eq, PartialEq)]
pub struct PhaseFlags {
    /// invert the reference area detection (output)
    pub area_invert: bool,
    /// sensor currently in the reference area (input)
    pub area_state: bool,
    /// the area sample has been latched (input)
    pub area_latched: bool,
    reserved: u5,
}
data::bilge_register!(PhaseFlags, u8);

/// two 16 bit durations packed in a word
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Default, Eq, PartialEq)]
pub struct PhaseTiming {
    pub first: u16,
    pub second: u16,
}
data::bilge_register!(PhaseTiming, u32);

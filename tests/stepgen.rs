mod common;

use ioexpand::{
    *,
    registers::{kind, stepgen},
    modules::Stepgen,
    };
use common::*;


const START: u16 = 0x40;
const PERIOD: i64 = 1_000_000;

fn board() -> (Device, MemoryBackend) {
    let backend = MemoryBackend::new(0x100).with_module(kind::STEPGEN, START);
    let hardware = backend.clone();
    let (device, _) = single_port(DeviceConfig::default(), backend);
    (device, hardware)
}

fn stepgen(device: &mut Device) -> &mut Stepgen {
    device.port_mut(0).unwrap()
        .drivers_mut::<Stepgen>().next().unwrap()
}

#[test]
fn velocity_ramp() {
    let (mut device, hardware) = board();
    {
        let channel = &mut stepgen(&mut device).channels[0];
        channel.enable = true;
        channel.scale = 1.;
        channel.maxvel = 1000.;
        channel.maxaccel = 10000.;
        channel.vel_cmd = 1000.;
    }

    let mut previous = 0.;
    for i in 1 ..= 100 {
        cycle(&mut device, PERIOD);
        let freq = stepgen(&mut device).channels[0].freq;
        // never more than maxaccel * period per cycle
        assert!(freq - previous <= 10. + 1e-9, "cycle {}: {} -> {}", i, previous, freq);
        assert!((freq - 10. * i as f64).abs() < 1e-6, "cycle {}: {}", i, freq);
        if i < 100 {
            assert!(freq < 1000.);
        }
        previous = freq;
    }
    assert_eq!(stepgen(&mut device).channels[0].freq, 1000.);

    // the target is held
    for _ in 0 .. 10 {
        cycle(&mut device, PERIOD);
        assert_eq!(stepgen(&mut device).channels[0].freq, 1000.);
    }

    // phase increment and acceleration limit given to the hardware
    let tick = 1. / f64::from(PCI_TICK_RATE);
    let freq_scale = (1u64 << 32) as f64 * tick;
    let accel_scale = freq_scale * tick * 65536.;
    assert_eq!(hardware.output(START, stepgen::channel(0).frequency), (1000. * freq_scale) as i32);
    assert_eq!(hardware.output(START, stepgen::channel(0).acceleration), (10000. * accel_scale) as u32);
    // other channels are disabled
    assert_eq!(hardware.output(START, stepgen::channel(1).frequency), 0);
}

#[test]
fn velocity_ramp_down() {
    let (mut device, _) = board();
    {
        let channel = &mut stepgen(&mut device).channels[2];
        channel.enable = true;
        channel.maxvel = 1000.;
        channel.maxaccel = 10000.;
        channel.vel_cmd = -5000.;
    }
    cycle(&mut device, PERIOD);
    assert!((stepgen(&mut device).channels[2].freq + 10.).abs() < 1e-9);
    for _ in 0 .. 200 {
        cycle(&mut device, PERIOD);
    }
    // the command is clamped to the velocity limit
    assert_eq!(stepgen(&mut device).channels[2].freq, -1000.);
}

#[test]
fn disabled_channel_tracks_position() {
    let (mut device, hardware) = board();
    {
        let channel = &mut stepgen(&mut device).channels[0];
        channel.pos_mode = true;
        channel.enable = false;
        channel.maxaccel = 10000.;
    }
    cycle(&mut device, PERIOD);

    // the command and the hardware move while the channel is disabled
    hardware.set_input(START, stepgen::channel(0).accum_high, 5);
    hardware.set_input(START, stepgen::channel(0).accum_low, 0x8000_0000);
    stepgen(&mut device).channels[0].pos_cmd = 5.;
    cycle(&mut device, PERIOD);
    assert_eq!(stepgen(&mut device).channels[0].freq, 0.);
    assert_eq!(hardware.output(START, stepgen::channel(0).frequency), 0);
    assert_eq!(stepgen(&mut device).channels[0].count, 5);

    // enabling at the commanded position does not move
    stepgen(&mut device).channels[0].enable = true;
    cycle(&mut device, PERIOD);
    assert_eq!(stepgen(&mut device).channels[0].freq, 0.);
}

#[test]
fn position_follows_command() {
    let (mut device, hardware) = board();
    {
        let channel = &mut stepgen(&mut device).channels[1];
        channel.pos_mode = true;
        channel.enable = true;
        channel.maxvel = 2000.;
        channel.maxaccel = 50000.;
        channel.pos_cmd = 10.;
    }
    // simulate the hardware accumulator following the frequency
    let mut accum = 1i64 << 31;
    hardware.set_input(START, stepgen::channel(1).accum_low, accum as u32);
    let mut max_freq: f64 = 0.;
    for _ in 0 .. 2000 {
        device.read_all(PERIOD);
        device.write_all(PERIOD);
        let freq = stepgen(&mut device).channels[1].freq;
        max_freq = max_freq.max(freq.abs());
        accum += (freq * 1e-3 * (1u64 << 32) as f64) as i64;
        hardware.set_input(START, stepgen::channel(1).accum_high, (accum >> 32) as u32);
        hardware.set_input(START, stepgen::channel(1).accum_low, accum as u32);
    }
    device.read_all(PERIOD);
    let channel = &stepgen(&mut device).channels[1];
    assert!((channel.pos_fb - 10.).abs() < 1e-2, "position {}", channel.pos_fb);
    assert!(max_freq <= 2000. + 1e-9);
}

#[test]
fn timing_quantization() {
    let (mut device, hardware) = board();
    cycle(&mut device, PERIOD);
    // 1ns timings round up to one 30ns tick
    assert_eq!(stepgen(&mut device).step_len_ticks(), 1);
    assert_eq!(hardware.output(START, stepgen::step_len), 1);
    assert_eq!(hardware.output(START, stepgen::dir_hold), 1);
    assert_eq!(hardware.output(START, stepgen::dir_setup), 1);
    assert_eq!(stepgen(&mut device).timing.step_len, 30);

    {
        let timing = &mut stepgen(&mut device).timing;
        timing.step_len = 5000;
        timing.dir_setup = 0;
        timing.dir_hold = 0;
    }
    cycle(&mut device, PERIOD);
    let generator = stepgen(&mut device);
    assert_eq!(generator.timing.step_len, 5010);
    assert_eq!(generator.step_len_ticks(), 167);
    // setup and hold cannot be both zero
    assert_eq!(generator.dir_setup_ticks(), 0);
    assert_eq!(generator.dir_hold_ticks(), 1);
    assert_eq!(hardware.output(START, stepgen::step_len), 167);
    assert_eq!(hardware.output(START, stepgen::dir_hold), 1);
    assert_eq!(hardware.output(START, stepgen::dir_setup), 0);

    // a zero step length becomes one tick
    stepgen(&mut device).timing.step_len = 0;
    cycle(&mut device, PERIOD);
    assert_eq!(stepgen(&mut device).step_len_ticks(), 1);
}

#[test]
fn limits_lowered() {
    let (mut device, _) = board();
    {
        let channel = &mut stepgen(&mut device).channels[0];
        channel.maxvel = 1e9;
        channel.maxaccel = 1e12;
        channel.scale = 2.;
    }
    cycle(&mut device, PERIOD);
    cycle(&mut device, PERIOD);
    let channel = &stepgen(&mut device).channels[0];
    // steps of 30ns spaced by 30ns
    let max_freq = 1. / (60. * 1e-9);
    assert!((channel.maxvel - max_freq / 2.).abs() < 1e-3, "maxvel {}", channel.maxvel);
    assert!(channel.maxaccel < 1e12);

    let (mut device, _) = board();
    stepgen(&mut device).channels[0].maxvel = -5.;
    stepgen(&mut device).channels[0].maxaccel = -5.;
    cycle(&mut device, PERIOD);
    assert_eq!(stepgen(&mut device).channels[0].maxvel, 0.);
    assert_eq!(stepgen(&mut device).channels[0].maxaccel, 0.);
}

#[test]
fn position_feedback() {
    let (mut device, hardware) = board();
    stepgen(&mut device).channels[3].scale = 2.;
    hardware.set_input(START, stepgen::channel(3).accum_high, 5);
    hardware.set_input(START, stepgen::channel(3).accum_low, 0x8000_0000);
    device.read_all(PERIOD);
    let channel = &stepgen(&mut device).channels[3];
    assert_eq!(channel.count, 5);
    assert_eq!(channel.pos_fb, 2.5);

    hardware.set_input(START, stepgen::channel(3).accum_high, 0xffff_fffe);
    device.read_all(PERIOD);
    let channel = &stepgen(&mut device).channels[3];
    assert_eq!(channel.count, -2);
    assert_eq!(channel.pos_fb, -1.);
}

#[test]
fn near_zero_scale() {
    let (mut device, hardware) = board();
    stepgen(&mut device).channels[0].scale = 1e-30;
    hardware.set_input(START, stepgen::channel(0).accum_high, 3);
    hardware.set_input(START, stepgen::channel(0).accum_low, 0x8000_0000);
    device.read_all(PERIOD);
    let channel = &stepgen(&mut device).channels[0];
    assert_eq!(channel.scale, 1.);
    assert_eq!(channel.pos_fb, 3.);

    stepgen(&mut device).channels[0].scale = -1e-21;
    cycle(&mut device, PERIOD);
    assert_eq!(stepgen(&mut device).channels[0].scale, 1.);
}

#[test]
fn full_speed_word() {
    let (mut device, hardware) = board();
    {
        let generator = stepgen(&mut device);
        for (i, vel) in [(0, 1e12), (1, -1e12)] {
            let channel = &mut generator.channels[i];
            channel.enable = true;
            channel.scale = 1.;
            channel.vel_cmd = vel;
        }
    }
    // long periods, so the hardware acceleration limit reaches full speed quickly
    for _ in 0 .. 200 {
        cycle(&mut device, 1_000_000_000);
    }
    // 30ns step length and space at the default tick rate
    let max_freq = 1. / 60e-9;
    let generator = stepgen(&mut device);
    assert!((generator.channels[0].freq - max_freq).abs() < 1e-3, "freq {}", generator.channels[0].freq);
    assert!((generator.channels[1].freq + max_freq).abs() < 1e-3, "freq {}", generator.channels[1].freq);

    // the phase increment saturates instead of wrapping to the opposite direction
    assert_eq!(hardware.output(START, stepgen::channel(0).frequency), i32::MAX);
    assert_eq!(hardware.output(START, stepgen::channel(1).frequency), i32::MIN);
}

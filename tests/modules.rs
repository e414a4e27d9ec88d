mod common;

use ioexpand::{
    *,
    registers::{kind, dio, dac, phase, DioHigh, PhaseFlags},
    modules::{Dio, Dac, PhaseEncoder},
    };
use common::*;


const PERIOD: i64 = 1_000_000;
const DIO: u16 = 0x10;
const DAC: u16 = 0x20;
const PHASE: u16 = 0x40;

fn board() -> (Device, MemoryBackend) {
    let backend = MemoryBackend::new(0x100)
        .with_module(kind::DIO, DIO)
        .with_module(kind::DAC, DAC)
        .with_module(kind::PHASE, PHASE);
    let hardware = backend.clone();
    let (device, _) = single_port(DeviceConfig::default(), backend);
    (device, hardware)
}

fn dio(device: &mut Device) -> &mut Dio {
    device.port_mut(0).unwrap().drivers_mut::<Dio>().next().unwrap()
}
fn dac(device: &mut Device) -> &mut Dac {
    device.port_mut(0).unwrap().drivers_mut::<Dac>().next().unwrap()
}
fn phase(device: &mut Device) -> &mut PhaseEncoder {
    device.port_mut(0).unwrap().drivers_mut::<PhaseEncoder>().next().unwrap()
}

#[test]
fn dio_inputs() {
    let (mut device, hardware) = board();
    hardware.set_input(DIO, dio::low, 1 | 1 << 31);
    hardware.set_input(DIO, dio::high, DioHigh::from(1 | 1 << 15 | 1 << 16));
    cycle(&mut device, PERIOD);

    let module = dio(&mut device);
    let high: Vec<usize> = (0 .. dio::PINS).filter(|&i| module.input[i]).collect();
    assert_eq!(high, [0, 31, 32, 47]);
    assert!(module.input_not[1]);
    assert!(! module.input_not[47]);
    assert!(module.output_fault);
    assert!(! module.output_error);
    assert!(! module.input_error);

    // faults follow the hardware
    hardware.set_input(DIO, dio::high, DioHigh::from(1 << 18));
    cycle(&mut device, PERIOD);
    let module = dio(&mut device);
    assert!(! module.output_fault);
    assert!(module.input_error);
}

#[test]
fn dio_outputs() {
    let (mut device, hardware) = board();
    {
        let module = dio(&mut device);
        module.output[1] = true;
        module.output_invert[2] = true;
        module.output[40] = true;
        // inverted and set gives a low pin
        module.output[45] = true;
        module.output_invert[45] = true;
        module.output_fault_reset = true;
    }
    cycle(&mut device, PERIOD);

    assert_eq!(hardware.output(DIO, dio::low), 0b110);
    let high = hardware.output(DIO, dio::high);
    assert_eq!(high.pins(), 1 << 8);
    assert!(high.output_fault());
    assert!(! high.output_error());
    assert!(! high.input_error());
}

#[test]
fn dac_duty_cycle() {
    let (mut device, hardware) = board();
    {
        let channels = &mut dac(&mut device).channels;
        channels[0].enable = true;
        channels[0].value = 0.5;

        // channel 1 stays disabled
        channels[1].value = 0.5;

        channels[2].enable = true;
        channels[2].max_dc = 0.25;
        channels[2].value = 1.;

        channels[3].enable = true;
        channels[3].absmode = true;
        channels[3].value = -0.5;

        channels[5].enable = true;
        channels[5].scale = 0.;
        channels[5].value = -1.;
    }
    cycle(&mut device, PERIOD);

    assert_eq!(hardware.output(DAC, dac::channel(0)), 49151);
    assert_eq!(hardware.output(DAC, dac::channel(1)), 0x8000);
    assert_eq!(hardware.output(DAC, dac::channel(2)), 40959);
    assert_eq!(hardware.output(DAC, dac::channel(3)), 49151);
    assert_eq!(hardware.output(DAC, dac::channel(5)), 1);
    // odd channels are in the high half of the words
    assert_eq!(hardware.output(DAC, Field::<u32>::word(0)), 0x8000 << 16 | 49151);

    let channels = &dac(&mut device).channels;
    assert_eq!(channels[0].curr_dc, 0.5);
    assert!(channels[0].pos);
    assert_eq!(channels[1].curr_dc, 0.);
    assert!(! channels[1].pos);
    assert_eq!(channels[2].curr_dc, 0.25);
    assert!(channels[3].neg);
    assert!(! channels[3].pos);
    assert_eq!(channels[5].scale, 1.);
    assert_eq!(channels[5].curr_dc, -1.);
}

#[test]
fn dac_limits_repaired() {
    let (mut device, hardware) = board();
    {
        let channel = &mut dac(&mut device).channels[4];
        channel.enable = true;
        channel.max_dc = 2.;
        channel.min_dc = -3.;
    }
    cycle(&mut device, PERIOD);
    {
        let channel = &mut dac(&mut device).channels[4];
        assert_eq!(channel.max_dc, 1.);
        assert_eq!(channel.min_dc, -1.);

        channel.min_dc = 0.5;
        channel.max_dc = 0.2;
        channel.value = -1.;
    }
    cycle(&mut device, PERIOD);
    let channel = &dac(&mut device).channels[4];
    assert_eq!(channel.min_dc, 0.2);
    assert_eq!(channel.max_dc, 0.2);
    assert_eq!(channel.curr_dc, 0.2);
    assert_eq!(hardware.output(DAC, dac::channel(4)), (32768. + 32767. * 0.2) as u16);
}

/// full scale amplitude of the default array of 10 sensors
const FULL: i32 = 10 * 65536;

#[test]
fn phase_position() {
    let (mut device, hardware) = board();
    let live = phase::channel(0).live;
    hardware.set_input(PHASE, live.count, 2);
    hardware.set_input(PHASE, live.cos, FULL);
    cycle(&mut device, PERIOD);
    {
        let channel = &phase(&mut device).channels[0];
        assert_eq!(channel.raw_counts, 2);
        assert!((channel.level - 1.).abs() < 1e-12);
        assert!((channel.raw_pos - 1.27).abs() < 1e-12);
        assert!((channel.flt_pos - 1.27).abs() < 1e-12);
        assert!((channel.pos - 1.27).abs() < 1e-12);
    }

    // moves smaller than the hysteresis do not reach the filtered position
    hardware.set_input(PHASE, live.sin, -1945);
    cycle(&mut device, PERIOD);
    {
        let channel = &phase(&mut device).channels[0];
        assert!((channel.raw_pos - 1.2697).abs() < 1e-6, "position {}", channel.raw_pos);
        assert!((channel.flt_pos - 1.27).abs() < 1e-12);
    }

    // a quarter of period backwards
    hardware.set_input(PHASE, live.count, 0);
    hardware.set_input(PHASE, live.sin, -FULL);
    hardware.set_input(PHASE, live.cos, 0);
    cycle(&mut device, PERIOD);
    let channel = &phase(&mut device).channels[0];
    assert!((channel.hires + 0.15875).abs() < 1e-12);
    assert!((channel.raw_pos + 0.15875).abs() < 1e-12);
    // quantized toward zero
    assert!((channel.flt_pos + 0.158).abs() < 1e-12);
}

#[test]
fn phase_inverted() {
    let (mut device, hardware) = board();
    phase(&mut device).channels[1].pos_invert = true;
    let live = phase::channel(1).live;
    hardware.set_input(PHASE, live.count, 2);
    hardware.set_input(PHASE, live.cos, FULL);
    cycle(&mut device, PERIOD);
    assert!((phase(&mut device).channels[1].raw_pos + 1.27).abs() < 1e-12);
}

#[test]
fn phase_reference_area() {
    let (mut device, hardware) = board();
    let registers = phase::channel(0);
    hardware.set_input(PHASE, registers.live.count, 2);
    hardware.set_input(PHASE, registers.live.cos, FULL);
    hardware.set_input(PHASE, registers.area.count, 1);
    hardware.set_input(PHASE, registers.area.cos, FULL);
    let mut flags = PhaseFlags::default();
    flags.set_area_state(true);
    flags.set_area_latched(true);
    hardware.set_input(PHASE, registers.flags, flags);

    // latched samples are ignored until requested
    cycle(&mut device, PERIOD);
    assert!(phase(&mut device).channels[0].area_state);
    assert_eq!(phase(&mut device).channels[0].area_pos, 0.);

    phase(&mut device).channels[0].area_enable = true;
    cycle(&mut device, PERIOD);
    let channel = &phase(&mut device).channels[0];
    assert!(! channel.area_enable);
    assert!((channel.area_pos - 0.635).abs() < 1e-12);
    assert!((channel.pos - 0.635).abs() < 1e-9);
    // the other channel is not affected
    assert_eq!(phase(&mut device).channels[1].area_pos, 0.);
}

#[test]
fn phase_level() {
    let (mut device, hardware) = board();
    phase(&mut device).level_warn = 2.;
    let live = phase::channel(0).live;
    hardware.set_input(PHASE, live.cos, FULL);
    cycle(&mut device, PERIOD);
    let module = phase(&mut device);
    assert!(module.channels[0].level_warn);
    assert!(! module.channels[0].level_err);

    module.level_warn = 0.5;
    module.level_err = 0.5;
    cycle(&mut device, PERIOD);
    let module = phase(&mut device);
    assert!(! module.channels[0].level_warn);
    // channel 1 has no signal at all
    assert!(module.channels[1].level_warn);
    assert!(module.channels[1].level_err);
}

#[test]
fn phase_timings() {
    let (mut device, hardware) = board();
    phase(&mut device).channels[1].area_invert = true;
    cycle(&mut device, PERIOD);

    let ticks = |ns: f64| (f64::from(PCI_TICK_RATE) / 1e9 * ns) as u32 as u16;
    let scan = hardware.output(PHASE, phase::timing_scan);
    assert_eq!(scan.first(), ticks(42000.));
    assert_eq!(scan.second(), ticks(28400.));
    let take = hardware.output(PHASE, phase::timing_take);
    assert_eq!(take.first(), ticks(28600.));
    assert_eq!(take.second(), ticks(28200.));

    assert_eq!(hardware.output(PHASE, Field::<u32>::word(0)), 0x100);
    assert!(hardware.output(PHASE, phase::channel(1).flags).area_invert());
    assert!(! hardware.output(PHASE, phase::channel(0).flags).area_invert());
}

#[test]
fn phase_leaves_trailing_words() {
    // a module right after the 48 bytes of registers the phase encoder writes
    let neighbour = PHASE + 48;
    let backend = MemoryBackend::new(0x100)
        .with_module(kind::DAC, neighbour)
        .with_module(kind::PHASE, PHASE);
    let hardware = backend.clone();
    let (mut device, _) = single_port(DeviceConfig::default(), backend);
    assert_eq!(device.port(0).unwrap().span(), u32::from(PHASE) .. u32::from(PHASE + phase::LEN));

    // the phase encoder writes after the analog outputs
    cycle(&mut device, PERIOD);
    for word in 0 .. 3 {
        assert_eq!(hardware.output(neighbour, Field::<u32>::word(word)), 0x8000_8000);
    }
    assert_eq!(hardware.output(PHASE, phase::control), 0);
}

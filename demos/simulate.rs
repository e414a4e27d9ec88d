/*!
    run a simulated board: a watchdog, an encoder and a step generator whose steps are fed back to the encoder.

    The step generator follows a position command, and the positions are printed every 50 cycles.
*/

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
    };
use ioexpand::{
    *,
    registers::{kind, watchdog, encoder, stepgen, Heartbeat, CounterSample},
    modules::{Watchdog, Encoder, Stepgen, Accumulator, next_heartbeat},
    };

const WATCHDOG: u16 = 0x00;
const ENCODER: u16 = 0x10;
const STEPGEN: u16 = 0x60;
const PERIOD: Duration = Duration::from_millis(1);
const CYCLES: usize = 400;

/// the FPGA side of the simulation
struct Board {
    hardware: MemoryBackend,
    timebase: u32,
    accum: Accumulator,
    heartbeat: u16,
    steps: i32,
}
impl Board {
    fn new(hardware: MemoryBackend) -> Self {
        let board = Self {
            hardware,
            timebase: 0,
            accum: Accumulator::default(),
            heartbeat: 0xace1,
            steps: 0,
        };
        board.present(false);
        board
    }
    /// advance the board by one period, using the frequency last written by the driver
    fn advance(&mut self, ticks: u32) {
        let frequency = self.hardware.output(STEPGEN, stepgen::channel(0).frequency);
        self.accum = Accumulator(self.accum.0.wrapping_add(i64::from(frequency) * i64::from(ticks)));
        self.timebase = self.timebase.wrapping_add(ticks);
        self.heartbeat = next_heartbeat(self.heartbeat);

        let steps = self.accum.count();
        let moved = steps != self.steps;
        self.steps = steps;
        self.present(moved);
    }
    fn present(&self, moved: bool) {
        let mut heartbeat = Heartbeat::default();
        heartbeat.set_rand(self.heartbeat);
        self.hardware.set_input(WATCHDOG, watchdog::heartbeat, heartbeat);

        let accum = self.accum.0 as u64;
        self.hardware.set_input(STEPGEN, stepgen::channel(0).accum_high, (accum >> 32) as u32);
        self.hardware.set_input(STEPGEN, stepgen::channel(0).accum_low, accum as u32);

        let channel = encoder::channel(0);
        self.hardware.set_input(ENCODER, encoder::timebase, self.timebase);
        self.hardware.set_input(ENCODER, channel.count, CounterSample::from(
            (self.steps as u32 & 0x7fff_ffff) | u32::from(moved) << 31));
        if moved {
            self.hardware.set_input(ENCODER, channel.timestamp, self.timebase);
        }
    }
}

#[tokio::main]
async fn main() -> BusResult {
    env_logger::init();

    let backend = MemoryBackend::new(0x100)
        .with_module(kind::WATCHDOG, WATCHDOG)
        .with_module(kind::ENCODER, ENCODER)
        .with_module(kind::STEPGEN, STEPGEN);
    let mut board = Board::new(backend.clone());

    let config = DeviceConfig {name: "sim".into(), .. Default::default()};
    let ticks = (f64::from(config.tick_rate) * PERIOD.as_secs_f64()) as u32;
    let mut runtime = Exports::new();
    let mut device = Device::new(config);
    device.init(&mut runtime)?;
    device.create_port(Box::new(backend), &mut runtime)?;
    println!("exported {:?}", runtime.names().collect::<Vec<_>>());
    println!("{:#?}", device);

    {
        let port = device.port_mut(0).expect("port just created");
        if let Some(watchdog) = port.drivers_mut::<Watchdog>().next() {
            watchdog.enable = true;
        }
        if let Some(generator) = port.drivers_mut::<Stepgen>().next() {
            let channel = &mut generator.channels[0];
            channel.enable = true;
            channel.pos_mode = true;
            channel.scale = 100.;
            channel.maxvel = 50.;
            channel.maxaccel = 400.;
            channel.pos_cmd = 10.;
        }
        if let Some(counter) = port.drivers_mut::<Encoder>().next() {
            counter.channels[0].scale = 100.;
        }
    }
    device.ready(&mut runtime);

    let running = AtomicBool::new(true);
    let mut cycle = 0;
    let cycles = Cyclic::new(PERIOD)
        .run(&mut device, &running, |device| {
            let port = device.port_mut(0).expect("port just created");
            if cycle % 50 == 0 {
                let generator = port.drivers::<Stepgen>().next().expect("stepgen probed");
                let counter = port.drivers::<Encoder>().next().expect("encoder probed");
                let watchdog = port.drivers::<Watchdog>().next().expect("watchdog probed");
                println!("{:4}  step {:8.3} {:8.2}/s  encoder {:8.3} {:8.2}/s  watchdog {}",
                    cycle,
                    generator.channels[0].pos_fb, generator.channels[0].freq / 100.,
                    counter.channels[0].pos, counter.channels[0].vel,
                    if watchdog.com_error {"error"} else {"ok"},
                    );
            }
            board.advance(ticks);
            cycle += 1;
            if cycle == CYCLES  {running.store(false, Ordering::Relaxed)}
        }).await;

    println!("{} cycles done", cycles);
    device.exit(&mut runtime);
    Ok(())
}

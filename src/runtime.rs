/*!
    interface with the host runtime scheduling the cyclic functions.

    The host runtime is the piece of software owning the realtime thread: it receives the functions a [crate::Device] exports, and calls them once per control period with the elapsed time. Two hosts are provided here
    - [Exports] keeps the exported functions in memory, it suits tests and programs calling [crate::Device::call] themselves
    - [Cyclic] runs the whole device at a fixed period in a tokio task
*/

use crate::{
    device::Device,
    error::{BusError, BusResult},
    };
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
    };
use tokio::time::{self, Instant, MissedTickBehavior};


/// cyclic function a device can export to its host
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Function {
    /// [Device::read_all]
    ReadAll,
    /// [Device::write_all]
    WriteAll,
    /// [Device::read_port] with the given port index
    ReadPort(usize),
    /// [Device::write_port] with the given port index
    WritePort(usize),
}

/**
    trait for host runtimes

    The host may refuse an export, the device then releases everything it built for the function.
*/
pub trait Runtime {
    /// register a cyclic function under the given name
    fn export(&mut self, name: &str, function: Function) -> BusResult;
    /// deregister a function, it will not be called anymore
    fn withdraw(&mut self, name: &str);
    /// all functions are exported, the host can start calling them
    fn ready(&mut self);
    /// the host stops calling functions and forgets them
    fn exit(&mut self);
}


/// host runtime keeping the exported functions in memory
#[derive(Clone, Debug, Default)]
pub struct Exports {
    functions: BTreeMap<String, Function>,
    refused: Option<String>,
    ready: bool,
}
impl Exports {
    pub fn new() -> Self  {Self::default()}
    /// host refusing to export the given name, for testing setup failures
    pub fn refusing(name: impl Into<String>) -> Self {
        Self {refused: Some(name.into()), .. Default::default()}
    }
    /// function exported under the given name
    pub fn get(&self, name: &str) -> Option<Function> {
        self.functions.get(name).copied()
    }
    /// names of the exported functions, in alphabetical order
    pub fn names(&self) -> impl Iterator<Item=&str> {
        self.functions.keys().map(String::as_str)
    }
    /// true between [Runtime::ready] and [Runtime::exit]
    pub fn is_ready(&self) -> bool  {self.ready}
}
impl Runtime for Exports {
    fn export(&mut self, name: &str, function: Function) -> BusResult {
        if self.refused.as_deref() == Some(name)
            {return Err(BusError::Registration("function export refused by host"))}
        if self.functions.contains_key(name)
            {return Err(BusError::Registration("function name already exported"))}
        self.functions.insert(name.to_owned(), function);
        Ok(())
    }
    fn withdraw(&mut self, name: &str) {
        self.functions.remove(name);
    }
    fn ready(&mut self) {
        self.ready = true;
    }
    fn exit(&mut self) {
        self.ready = false;
        self.functions.clear();
    }
}


/**
    periodic runner calling a whole device

    Every period it calls [Device::read_all], then the control callback, then [Device::write_all], passing the period actually measured since the previous cycle. The first cycle uses the nominal period.

    ## Example

    ```ignore
    let running = AtomicBool::new(true);
    Cyclic::new(Duration::from_millis(1))
        .realtime(true)
        .run(&mut device, &running, |device| {
            // read feedbacks, compute commands
        }).await;
    ```
*/
#[derive(Copy, Clone, Debug)]
pub struct Cyclic {
    period: Duration,
    realtime: bool,
}
impl Cyclic {
    pub fn new(period: Duration) -> Self {
        Self {period, realtime: false}
    }
    /// request realtime priority for the thread running the loop
    pub fn realtime(self, realtime: bool) -> Self {
        Self {realtime, .. self}
    }
    /// nominal period of the loop
    pub fn period(&self) -> Duration  {self.period}

    /**
        run the loop until `running` is cleared, returns the number of cycles done

        The flag is checked at the start of every cycle, so a cycle started is always completed with its write.
    */
    pub async fn run<F>(&self, device: &mut Device, running: &AtomicBool, mut control: F) -> u64
    where F: FnMut(&mut Device)
    {
        if self.realtime  {promote()}

        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let nominal = i64::try_from(self.period.as_nanos()).unwrap_or(i64::MAX);
        let mut last: Option<Instant> = None;
        let mut cycles = 0;

        loop {
            interval.tick().await;
            let now = Instant::now();
            if ! running.load(Ordering::Relaxed)  {break}

            let period = match last {
                Some(last) => i64::try_from(now.duration_since(last).as_nanos()).unwrap_or(i64::MAX),
                None => nominal,
            };
            last = Some(now);

            device.read_all(period);
            control(device);
            device.write_all(period);
            cycles += 1;
        }
        cycles
    }
}

/// give the current thread the maximum realtime priority, failure is only reported in the log
#[cfg(target_os = "linux")]
fn promote() {
    use thread_priority::*;
    let current = thread_native_id();
    if let Err(err) = set_thread_priority_and_policy(
            current,
            ThreadPriority::Max,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
        log::warn!("cannot get realtime priority: {:?}", err);
    }
}
#[cfg(not(target_os = "linux"))]
fn promote() {
    log::warn!("realtime priority is not supported on this platform");
}

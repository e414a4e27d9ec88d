/*!
    a device is one FPGA board: its ports, the registry of module types it knows, and the lifecycle shared with the host runtime.
*/

use crate::{
    backend::Backend,
    error::{BusError, BusResult},
    port::Port,
    registry::Registry,
    runtime::{Runtime, Function},
    };


/// frequency of the timebase of the PCI boards (Hz)
pub const PCI_TICK_RATE: u32 = 33_333_333;

/// settings of a device
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// prefix of all names exported by the device
    pub name: String,
    /// frequency of the hardware timebase (Hz)
    pub tick_rate: u32,
}
impl Default for DeviceConfig {
    fn default() -> Self {
        Self {name: "ioexpand".to_owned(), tick_rate: PCI_TICK_RATE}
    }
}

/**
    one FPGA board and its ports

    ## Lifecycle

    ```ignore
    let mut runtime = Exports::new();
    let mut device = Device::new(DeviceConfig::default());
    device.init(&mut runtime)?;
    let port = device.create_port(Box::new(backend), &mut runtime)?;
    device.ready(&mut runtime);

    // cyclic exchanges, from the host realtime thread
    device.read_all(period);
    device.write_all(period);

    device.exit(&mut runtime);
    ```

    Ports can only be created or destroyed while the device is not running, so the modules are never changed under the cyclic functions.
*/
pub struct Device {
    config: DeviceConfig,
    registry: Registry,
    ports: Vec<Port>,
    /// index of the next port to create
    next_port: usize,
    running: bool,
}
impl Device {
    /// device knowing all module types of the FPGA
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_registry(config, Registry::default())
    }
    /// device knowing the module types of the given registry
    pub fn with_registry(config: DeviceConfig, registry: Registry) -> Self {
        Self {
            config,
            registry,
            ports: Vec::new(),
            next_port: 0,
            running: false,
        }
    }

    pub fn name(&self) -> &str  {&self.config.name}
    pub fn config(&self) -> &DeviceConfig  {&self.config}
    pub fn registry(&self) -> &Registry  {&self.registry}
    /// true between [Self::ready] and [Self::exit]
    pub fn running(&self) -> bool  {self.running}

    /// export the device wide cyclic functions
    pub fn init(&mut self, runtime: &mut dyn Runtime) -> BusResult {
        if self.config.tick_rate == 0
            {return Err(BusError::ModuleInit("tick rate must be strictly positive"))}
        let read = format!("{}.read-all", self.config.name);
        let write = format!("{}.write-all", self.config.name);
        runtime.export(&read, Function::ReadAll)
            .map_err(|err| {log::error!("{}: read-all export failed", self.config.name);  err})?;
        if let Err(err) = runtime.export(&write, Function::WriteAll) {
            log::error!("{}: write-all export failed", self.config.name);
            runtime.withdraw(&read);
            return Err(err);
        }
        log::info!("{}: initialized", self.config.name);
        Ok(())
    }
    /// the device is set up, the host can start calling its functions
    pub fn ready(&mut self, runtime: &mut dyn Runtime) {
        runtime.ready();
        self.running = true;
    }
    /// stop the cyclic functions and release all ports, in reverse creation order
    pub fn exit(&mut self, runtime: &mut dyn Runtime) {
        runtime.exit();
        self.running = false;
        while let Some(port) = self.ports.pop() {
            log::info!("{}: port {} destroyed", self.config.name, port.index());
        }
    }

    /**
        probe the given register space and build its modules, then export the port cyclic functions

        Returns the index of the new port. If the host refuses an export, the port is released and its modules with it.
    */
    pub fn create_port(&mut self, backend: Box<dyn Backend>, runtime: &mut dyn Runtime) -> BusResult<usize> {
        if self.running
            {return Err(BusError::Registration("cannot create a port while cyclic functions run"))}
        let index = self.next_port;
        let port = Port::probe(&self.config.name, index, self.config.tick_rate, &mut self.registry, backend)?;

        let read = format!("{}.{}.read", self.config.name, index);
        let write = format!("{}.{}.write", self.config.name, index);
        if let Err(err) = runtime.export(&read, Function::ReadPort(index)) {
            log::error!("{}: read function export for port {} failed", self.config.name, index);
            return Err(err);
        }
        if let Err(err) = runtime.export(&write, Function::WritePort(index)) {
            log::error!("{}: write function export for port {} failed", self.config.name, index);
            runtime.withdraw(&read);
            return Err(err);
        }

        log::info!("{}: port {} created with {} modules, span {:?}", self.config.name, index, port.modules().len(), port.span());
        self.ports.push(port);
        self.next_port += 1;
        Ok(index)
    }
    /**
        withdraw the cyclic functions of a port, then release it

        returns false if there is no such port or the device is running
    */
    pub fn destroy_port(&mut self, index: usize, runtime: &mut dyn Runtime) -> bool {
        if self.running  {return false}
        let Some(position) = self.ports.iter().position(|port| port.index() == index)
            else {return false};
        runtime.withdraw(&format!("{}.{}.read", self.config.name, index));
        runtime.withdraw(&format!("{}.{}.write", self.config.name, index));
        drop(self.ports.remove(position));
        log::info!("{}: port {} destroyed", self.config.name, index);
        true
    }

    /// ports in creation order
    pub fn ports(&self) -> &[Port]  {&self.ports}
    /// ports in creation order
    pub fn ports_mut(&mut self) -> &mut [Port]  {&mut self.ports}
    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports.iter().find(|port| port.index() == index)
    }
    pub fn port_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.ports.iter_mut().find(|port| port.index() == index)
    }

    /// read every port, `period` is the time since the previous call in nanoseconds
    pub fn read_all(&mut self, period: i64) {
        for port in self.ports.iter_mut() {
            port.read(period);
        }
    }
    /// write every port, `period` is the time since the previous call in nanoseconds
    pub fn write_all(&mut self, period: i64) {
        for port in self.ports.iter_mut() {
            port.write(period);
        }
    }
    /// read one port, nothing happens if it does not exist
    pub fn read_port(&mut self, index: usize, period: i64) {
        if let Some(port) = self.port_mut(index)  {port.read(period)}
    }
    /// write one port, nothing happens if it does not exist
    pub fn write_port(&mut self, index: usize, period: i64) {
        if let Some(port) = self.port_mut(index)  {port.write(period)}
    }
    /// execute an exported function
    pub fn call(&mut self, function: Function, period: i64) {
        match function {
            Function::ReadAll => self.read_all(period),
            Function::WriteAll => self.write_all(period),
            Function::ReadPort(index) => self.read_port(index, period),
            Function::WritePort(index) => self.write_port(index, period),
        }
    }
}

impl core::fmt::Debug for Device {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Device")
            .field("config", &self.config)
            .field("running", &self.running)
            .field("ports", &self.ports)
            .finish()
	}
}

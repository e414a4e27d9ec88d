/*!
    Cyclic driver core for FPGA based I/O expansion boards.

    An FPGA board exposes one or more ports. Each port starts with a configuration table listing the function units (modules) burnt in the FPGA and where their registers are. This crate probes these tables, builds a driver for each module, and every control period converts between the hardware registers and engineering values.

    - [Device] owns the ports of a board and the lifecycle shared with the host runtime
    - [Port] owns the modules of a register space and the images of its registers
    - [Driver] is the interface of every module type, see [modules] for the provided ones
    - [Backend] gives access to the hardware registers
    - [runtime] gathers what is needed to run the cyclic functions
*/

#![allow(non_upper_case_globals)]

pub mod error;
pub mod data;
pub mod registers;
pub mod backend;
pub mod module;
pub mod registry;
pub mod port;
pub mod device;
pub mod runtime;
pub mod modules;

pub use crate::error::{BusError, BusResult};
pub use crate::data::{Register, Field};
pub use crate::backend::{Backend, MemoryBackend};
#[cfg(target_os = "linux")]
pub use crate::backend::MappedBackend;
pub use crate::module::{Driver, Module, ModuleContext};
pub use crate::registry::Registry;
pub use crate::port::Port;
pub use crate::device::{Device, DeviceConfig, PCI_TICK_RATE};
pub use crate::runtime::{Runtime, Function, Exports, Cyclic};

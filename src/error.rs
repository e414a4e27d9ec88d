//! definition of the general error type of the bus driver

use std::sync::Arc;
use core::fmt;

/**
    general object reporting an unexpected result while setting up a device, its ports or its modules

    Its variants are meant to help finding the cause responsible for the problem and how to deal with it.

    Nothing in the cyclic exchanges ([crate::Device::read_all], [crate::Device::write_all]) returns this type: per-cycle operations are total, runtime faults reported by the hardware are exposed as sticky flags on the modules instead.
*/
#[derive(Clone, Debug)]
pub enum BusError {
    /// error caused by the register backend (opening, mapping)
    ///
    /// these errors are exterior to this library
    Io(Arc<std::io::Error>),

    /// memory for a port image or a module could not be obtained
    ///
    /// fatal to the port being created, everything built so far is released
    Allocation(&'static str),

    /// the configuration table mentions a module type no constructor is registered for
    ///
    /// the module is skipped and probing goes on
    UnknownModule {kind: u16, offset: u16},

    /// a module constructor refused to build its driver
    ///
    /// the module is skipped and probing goes on
    ModuleInit(&'static str),

    /// the host runtime refused to register a function
    ///
    /// fatal to the device or port being set up, everything built so far is released
    Registration(&'static str),

    /// a module register window does not fit in its port image
    Layout(&'static str),
}

/// convenient alias to simplify return annotations
pub type BusResult<T=()> = core::result::Result<T, BusError>;

impl BusError {
    /// true for the errors that only skip a module during probing
    pub fn recoverable(&self) -> bool {
        matches!(self, Self::UnknownModule{..} | Self::ModuleInit(_))
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "backend: {}", error),
            Self::Allocation(message) => write!(f, "allocation: {}", message),
            Self::UnknownModule {kind, offset} => write!(f, "unknown module type {} at offset {}", kind, offset),
            Self::ModuleInit(message) => write!(f, "module init: {}", message),
            Self::Registration(message) => write!(f, "registration: {}", message),
            Self::Layout(message) => write!(f, "layout: {}", message),
        }
    }
}

impl std::error::Error for BusError {}

impl From<std::io::Error> for BusError {
    fn from(src: std::io::Error) -> Self {
        BusError::Io(Arc::new(src))
    }
}

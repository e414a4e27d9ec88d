/*!
    This module provide the trait [Backend], and several implementors giving access to the register space of a port.

    - [MemoryBackend] simulates the register space in memory, its hardware side can be driven by tests or simulators
    - [MappedBackend] maps the register space of a PCI board (linux only)

    | backend           | hardware needed | realtime safe | typical use                      |
    |-------------------|-----------------|---------------|----------------------------------|
    | [MemoryBackend]   | no              | yes           | tests, simulation, offline setup |
    | [MappedBackend]   | yes             | yes           | production                       |
*/

mod memory;
#[cfg(target_os = "linux")]
mod mapped;

pub use memory::MemoryBackend;
#[cfg(target_os = "linux")]
pub use mapped::MappedBackend;

/**
    trait giving access to the register space of one port

    The register space starts with the configuration table ([crate::registers::MAX_MODULES] words of [crate::registers::ModuleDescriptor]), then contains the module windows at the addresses given by the table.

    All methods are called from the cyclic functions and must be synchronous and non-blocking, and complete in a small fraction of the control period.
*/
pub trait Backend: Send {
    /// read the given word of the configuration table
    fn read_config(&self, word: usize) -> u32;
    /// copy the hardware registers starting at byte `offset` into `data`
    fn read_input(&self, offset: u16, data: &mut [u8]);
    /// copy `data` into the hardware registers starting at byte `offset`
    fn write_output(&self, offset: u16, data: &[u8]);
}


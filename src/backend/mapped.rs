use std::{
    io,
    fs::OpenOptions,
    path::Path,
    os::unix::io::AsRawFd,
    };
use super::Backend;


/**
    register space of a PCI board, mapped in the process memory

    The board BAR is mapped through its sysfs resource file (`/sys/bus/pci/devices/<address>/resource0`) or through `/dev/mem` at the BAR physical address. Finding the board on the bus is up to the caller.

    Accesses are done by volatile 32 bit words as the FPGA expects, the trailing bytes of a copy not filling a word are accessed bytewise.

    This implementation is unix-specific
*/
pub struct MappedBackend {
    base: *mut u8,
    size: usize,
}

// the mapping is owned by this struct only, and the hardware accepts accesses from any thread
unsafe impl Send for MappedBackend {}

impl MappedBackend {
    /// map `size` bytes of the given file starting at byte `offset`
    pub fn new(path: impl AsRef<Path>, offset: usize, size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;
        let base = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset as libc::off_t,
                )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        // the mapping stays valid after the file is closed
        Ok(Self {base: base as *mut u8, size})
    }
    /// byte size of the mapped register space
    pub fn size(&self) -> usize  {self.size}

    fn check(&self, offset: usize, len: usize) -> bool {
        offset.checked_add(len).map_or(false, |end| end <= self.size)
    }
}

impl Drop for MappedBackend {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.size);
        }
    }
}

impl Backend for MappedBackend {
    fn read_config(&self, word: usize) -> u32 {
        let offset = word * core::mem::size_of::<u32>();
        if ! self.check(offset, core::mem::size_of::<u32>())  {return 0}
        u32::from_le(unsafe { core::ptr::read_volatile(self.base.add(offset) as *const u32) })
    }
    fn read_input(&self, offset: u16, data: &mut [u8]) {
        let offset = usize::from(offset);
        if ! self.check(offset, data.len())  {return}
        let mut words = data.chunks_exact_mut(core::mem::size_of::<u32>());
        let mut address = offset;
        for chunk in &mut words {
            let word = unsafe { core::ptr::read_volatile(self.base.add(address) as *const u32) };
            chunk.copy_from_slice(&word.to_ne_bytes());
            address += chunk.len();
        }
        for byte in words.into_remainder() {
            *byte = unsafe { core::ptr::read_volatile(self.base.add(address)) };
            address += 1;
        }
    }
    fn write_output(&self, offset: u16, data: &[u8]) {
        let offset = usize::from(offset);
        if ! self.check(offset, data.len())  {return}
        let mut words = data.chunks_exact(core::mem::size_of::<u32>());
        let mut address = offset;
        for chunk in &mut words {
            let mut word = [0; 4];
            word.copy_from_slice(chunk);
            unsafe { core::ptr::write_volatile(self.base.add(address) as *mut u32, u32::from_ne_bytes(word)) };
            address += chunk.len();
        }
        for &byte in words.remainder() {
            unsafe { core::ptr::write_volatile(self.base.add(address), byte) };
            address += 1;
        }
    }
}

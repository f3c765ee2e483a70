//! Memory subsystem for oxidized-gekko
//!
//! The CPU core only sees the [`Memory`] trait: a big-endian, address-indexed
//! store that reports faults as [`MemoryError`]s. [`FlatMemory`] is the
//! in-process implementation used by the session and the tests.

pub mod constants;
pub mod flat;
pub mod region;

pub use flat::FlatMemory;
pub use og_core::error::MemoryError;
pub use region::{Region, RegionFlags};

/// Guest memory as seen by the CPU
///
/// All accesses are big-endian. Implementations must be usable from the
/// thread that owns the CPU while other threads (DMA, interrupts) hold a
/// shared reference.
pub trait Memory: Send + Sync {
    fn read_u8(&self, addr: u32) -> Result<u8, MemoryError>;
    fn read_u16(&self, addr: u32) -> Result<u16, MemoryError>;
    fn read_u32(&self, addr: u32) -> Result<u32, MemoryError>;

    fn write_u8(&self, addr: u32, value: u8) -> Result<(), MemoryError>;
    fn write_u16(&self, addr: u32, value: u16) -> Result<(), MemoryError>;
    fn write_u32(&self, addr: u32, value: u32) -> Result<(), MemoryError>;

    /// Fetch an instruction word
    fn read_instruction(&self, addr: u32) -> Result<u32, MemoryError> {
        self.read_u32(addr)
    }

    fn read_u64(&self, addr: u32) -> Result<u64, MemoryError> {
        let hi = self.read_u32(addr)? as u64;
        let lo = self.read_u32(addr.wrapping_add(4))? as u64;
        Ok((hi << 32) | lo)
    }

    fn write_u64(&self, addr: u32, value: u64) -> Result<(), MemoryError> {
        self.write_u32(addr, (value >> 32) as u32)?;
        self.write_u32(addr.wrapping_add(4), value as u32)
    }
}

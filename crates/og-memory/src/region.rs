//! Memory regions and their access flags

use bitflags::bitflags;
use parking_lot::RwLock;

bitflags! {
    /// Region protection flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionFlags: u32 {
        /// Region is readable
        const READ    = 0b0001;
        /// Region is writable
        const WRITE   = 0b0010;
        /// Instructions may be fetched from the region
        const EXECUTE = 0b0100;
        /// Region answers through the cached/uncached mirrors
        const MIRRORED = 0b1000;

        /// Read and write access
        const RW  = Self::READ.bits() | Self::WRITE.bits();
        /// Read, write, and execute access
        const RWX = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
    }
}

impl Default for RegionFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A contiguous block of guest memory
pub struct Region {
    pub name: &'static str,
    /// Base address (physical for mirrored regions)
    pub base: u32,
    pub flags: RegionFlags,
    pub(crate) data: RwLock<Box<[u8]>>,
}

impl Region {
    pub fn new(name: &'static str, base: u32, size: u32, flags: RegionFlags) -> Self {
        Self {
            name,
            base,
            flags,
            data: RwLock::new(vec![0u8; size as usize].into_boxed_slice()),
        }
    }

    pub fn size(&self) -> u32 {
        self.data.read().len() as u32
    }

    /// Offset of `addr` inside this region, if it belongs to it
    pub fn offset_of(&self, addr: u32) -> Option<usize> {
        let addr = if self.flags.contains(RegionFlags::MIRRORED) {
            addr & crate::constants::PHYSICAL_MASK
        } else {
            addr
        };
        let offset = addr.checked_sub(self.base)? as usize;
        (offset < self.data.read().len()).then_some(offset)
    }
}

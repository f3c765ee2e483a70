//! Gekko/Broadway memory map constants

/// Cached effective-address mirror of physical memory
pub const CACHED_BASE: u32 = 0x8000_0000;
/// Uncached effective-address mirror of physical memory
pub const UNCACHED_BASE: u32 = 0xC000_0000;
/// Mask turning a mirrored effective address into a physical one
pub const PHYSICAL_MASK: u32 = 0x3FFF_FFFF;

/// MEM1 physical base
pub const MEM1_BASE: u32 = 0x0000_0000;
/// MEM1 size (24 MB)
pub const MEM1_SIZE: u32 = 0x0180_0000;

/// MEM2 physical base (Broadway only)
pub const MEM2_BASE: u32 = 0x1000_0000;
/// MEM2 size (64 MB)
pub const MEM2_SIZE: u32 = 0x0400_0000;

/// Locked L1 data cache scratchpad
pub const LOCKED_CACHE_BASE: u32 = 0xE000_0000;
/// Locked L1 data cache size (16 KB)
pub const LOCKED_CACHE_SIZE: u32 = 0x0000_4000;

/// Data cache block size, the granularity of `dcbz`
pub const CACHE_BLOCK_SIZE: u32 = 32;

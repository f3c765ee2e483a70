//! Flat big-endian RAM

use std::sync::Arc;

use crate::constants::*;
use crate::region::{Region, RegionFlags};
use crate::{Memory, MemoryError};

/// Region-backed guest memory
pub struct FlatMemory {
    regions: Vec<Region>,
}

impl FlatMemory {
    /// GameCube layout: MEM1 plus the locked cache scratchpad
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            regions: vec![
                Region::new(
                    "MEM1",
                    MEM1_BASE,
                    MEM1_SIZE,
                    RegionFlags::RWX | RegionFlags::MIRRORED,
                ),
                Region::new("L1", LOCKED_CACHE_BASE, LOCKED_CACHE_SIZE, RegionFlags::RW),
            ],
        })
    }

    /// Wii layout: adds MEM2
    pub fn with_mem2() -> Arc<Self> {
        Arc::new(Self {
            regions: vec![
                Region::new(
                    "MEM1",
                    MEM1_BASE,
                    MEM1_SIZE,
                    RegionFlags::RWX | RegionFlags::MIRRORED,
                ),
                Region::new(
                    "MEM2",
                    MEM2_BASE,
                    MEM2_SIZE,
                    RegionFlags::RWX | RegionFlags::MIRRORED,
                ),
                Region::new("L1", LOCKED_CACHE_BASE, LOCKED_CACHE_SIZE, RegionFlags::RW),
            ],
        })
    }

    /// Build from an explicit region list
    pub fn from_regions(regions: Vec<Region>) -> Arc<Self> {
        Arc::new(Self { regions })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    fn locate(&self, addr: u32, size: u32) -> Result<(&Region, usize), MemoryError> {
        for region in &self.regions {
            if let Some(offset) = region.offset_of(addr) {
                if offset + size as usize > region.size() as usize {
                    return Err(MemoryError::OutOfRange { addr, size });
                }
                return Ok((region, offset));
            }
        }
        Err(MemoryError::Unmapped { addr })
    }

    fn load<const N: usize>(&self, addr: u32) -> Result<[u8; N], MemoryError> {
        let (region, offset) = self.locate(addr, N as u32)?;
        if !region.flags.contains(RegionFlags::READ) {
            return Err(MemoryError::Unmapped { addr });
        }
        let data = region.data.read();
        let mut out = [0u8; N];
        out.copy_from_slice(&data[offset..offset + N]);
        Ok(out)
    }

    fn store(&self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let (region, offset) = self.locate(addr, bytes.len() as u32)?;
        if !region.flags.contains(RegionFlags::WRITE) {
            return Err(MemoryError::ReadOnly { addr });
        }
        region.data.write()[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy a block into guest memory
    pub fn write_bytes(&self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        self.store(addr, bytes)
    }

    /// Copy a block out of guest memory
    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<Vec<u8>, MemoryError> {
        let (region, offset) = self.locate(addr, len as u32)?;
        let data = region.data.read();
        Ok(data[offset..offset + len].to_vec())
    }

    /// Zero every region
    pub fn clear(&self) {
        for region in &self.regions {
            region.data.write().fill(0);
        }
    }
}

impl Memory for FlatMemory {
    fn read_u8(&self, addr: u32) -> Result<u8, MemoryError> {
        Ok(self.load::<1>(addr)?[0])
    }

    fn read_u16(&self, addr: u32) -> Result<u16, MemoryError> {
        Ok(u16::from_be_bytes(self.load(addr)?))
    }

    fn read_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        Ok(u32::from_be_bytes(self.load(addr)?))
    }

    fn read_u64(&self, addr: u32) -> Result<u64, MemoryError> {
        Ok(u64::from_be_bytes(self.load(addr)?))
    }

    fn write_u8(&self, addr: u32, value: u8) -> Result<(), MemoryError> {
        self.store(addr, &[value])
    }

    fn write_u16(&self, addr: u32, value: u16) -> Result<(), MemoryError> {
        self.store(addr, &value.to_be_bytes())
    }

    fn write_u32(&self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.store(addr, &value.to_be_bytes())
    }

    fn write_u64(&self, addr: u32, value: u64) -> Result<(), MemoryError> {
        self.store(addr, &value.to_be_bytes())
    }

    fn read_instruction(&self, addr: u32) -> Result<u32, MemoryError> {
        let (region, _) = self.locate(addr, 4)?;
        if !region.flags.contains(RegionFlags::EXECUTE) {
            tracing::warn!("Instruction fetch from {} at 0x{:08x}", region.name, addr);
            return Err(MemoryError::NoExecute { addr });
        }
        self.read_u32(addr)
    }
}

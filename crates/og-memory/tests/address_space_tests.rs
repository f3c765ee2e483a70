//! Tests for the Gekko address space layout

use og_memory::{constants::*, FlatMemory, Memory, MemoryError, Region, RegionFlags};

#[test]
fn test_mem1_boundaries() {
    let mem = FlatMemory::new();

    let addr = CACHED_BASE;
    mem.write_u32(addr, 0xDEADBEEF).unwrap();
    assert_eq!(mem.read_u32(addr).unwrap(), 0xDEADBEEF);

    let addr = CACHED_BASE + MEM1_SIZE - 4;
    mem.write_u32(addr, 0xCAFEBABE).unwrap();
    assert_eq!(mem.read_u32(addr).unwrap(), 0xCAFEBABE);
}

#[test]
fn test_mem2_only_on_wii_layout() {
    let gc = FlatMemory::new();
    assert!(matches!(
        gc.read_u32(0x9000_0000),
        Err(MemoryError::Unmapped { .. })
    ));

    let wii = FlatMemory::with_mem2();
    wii.write_u32(0x9000_0000, 0x11223344).unwrap();
    assert_eq!(wii.read_u32(0xD000_0000).unwrap(), 0x11223344);
}

#[test]
fn test_region_isolation() {
    let mem = FlatMemory::with_mem2();

    mem.write_u32(CACHED_BASE + 0x1000, 0x11111111).unwrap();
    mem.write_u32(0x9000_1000, 0x22222222).unwrap();
    mem.write_u32(LOCKED_CACHE_BASE + 0x10, 0x33333333).unwrap();

    assert_eq!(mem.read_u32(CACHED_BASE + 0x1000).unwrap(), 0x11111111);
    assert_eq!(mem.read_u32(0x9000_1000).unwrap(), 0x22222222);
    assert_eq!(mem.read_u32(LOCKED_CACHE_BASE + 0x10).unwrap(), 0x33333333);
}

#[test]
fn test_unaligned_access() {
    let mem = FlatMemory::new();

    let addr = CACHED_BASE + 1;
    mem.write_u32(addr, 0x12345678).unwrap();
    assert_eq!(mem.read_u32(addr).unwrap(), 0x12345678);

    mem.write_u64(addr, 0xDEADBEEFCAFEBABE).unwrap();
    assert_eq!(mem.read_u64(addr).unwrap(), 0xDEADBEEFCAFEBABE);
}

#[test]
fn test_big_endian_operations() {
    let mem = FlatMemory::new();

    let addr = CACHED_BASE + 0x1000;

    mem.write_u16(addr, 0x1234).unwrap();
    assert_eq!(mem.read_u8(addr).unwrap(), 0x12);
    assert_eq!(mem.read_u16(addr).unwrap(), 0x1234);

    mem.write_u32(addr + 2, 0x12345678).unwrap();
    assert_eq!(mem.read_u32(addr + 2).unwrap(), 0x12345678);

    mem.write_u64(addr + 8, 0xDEADBEEFCAFEBABE).unwrap();
    assert_eq!(mem.read_u32(addr + 8).unwrap(), 0xDEADBEEF);
    assert_eq!(mem.read_u64(addr + 8).unwrap(), 0xDEADBEEFCAFEBABE);
}

#[test]
fn test_read_only_region() {
    let mem = FlatMemory::from_regions(vec![Region::new(
        "ROM",
        0xFFF0_0000,
        0x1000,
        RegionFlags::READ | RegionFlags::EXECUTE,
    )]);

    assert_eq!(
        mem.write_u32(0xFFF0_0000, 1),
        Err(MemoryError::ReadOnly { addr: 0xFFF0_0000 })
    );
    assert_eq!(mem.read_instruction(0xFFF0_0000).unwrap(), 0);
}

#[test]
fn test_bulk_copy_and_clear() {
    let mem = FlatMemory::new();
    mem.write_bytes(CACHED_BASE + 0x3100, &[1, 2, 3, 4, 5]).unwrap();
    assert_eq!(mem.read_bytes(CACHED_BASE + 0x3100, 5).unwrap(), vec![1, 2, 3, 4, 5]);

    mem.clear();
    assert_eq!(mem.read_u32(CACHED_BASE + 0x3100).unwrap(), 0);
}

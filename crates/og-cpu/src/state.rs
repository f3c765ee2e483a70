//! Processor state
//!
//! [`PowerPcState`] is the single record every handler mutates. It is plain
//! old data so that a save state is just its bytes.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use og_core::error::CpuError;

use crate::ps::PairedSingle;

/// Special-purpose register numbers
pub mod spr {
    pub const XER: usize = 1;
    pub const LR: usize = 8;
    pub const CTR: usize = 9;
    pub const DSISR: usize = 18;
    pub const DAR: usize = 19;
    pub const DEC: usize = 22;
    pub const SDR1: usize = 25;
    pub const SRR0: usize = 26;
    pub const SRR1: usize = 27;
    /// Time base lower, read alias
    pub const TBL_READ: usize = 268;
    /// Time base upper, read alias
    pub const TBU_READ: usize = 269;
    pub const SPRG0: usize = 272;
    pub const EAR: usize = 282;
    /// Time base lower, write alias and backing store
    pub const TL: usize = 284;
    /// Time base upper, write alias and backing store
    pub const TU: usize = 285;
    pub const PVR: usize = 287;
    pub const GQR0: usize = 912;
    pub const HID2: usize = 920;
    pub const WPAR: usize = 921;
    pub const DMAU: usize = 922;
    pub const DMAL: usize = 923;
    pub const HID0: usize = 1008;
    pub const HID1: usize = 1009;
    pub const IABR: usize = 1010;
    pub const L2CR: usize = 1017;
}

/// Processor version register value of the Gekko
pub const GEKKO_PVR: u32 = 0x0008_3214;

bitflags! {
    /// Machine state register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Msr: u32 {
        const LE  = 1 << 0;
        const RI  = 1 << 1;
        const DR  = 1 << 4;
        const IR  = 1 << 5;
        const IP  = 1 << 6;
        const FE1 = 1 << 8;
        const BE  = 1 << 9;
        const SE  = 1 << 10;
        const FE0 = 1 << 11;
        const ME  = 1 << 12;
        const FP  = 1 << 13;
        const PR  = 1 << 14;
        const EE  = 1 << 15;
        const ILE = 1 << 16;
        const POW = 1 << 18;
    }
}

bitflags! {
    /// XER bits (IBM bits 0-2 plus the string byte count)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Xer: u32 {
        const SO = 1 << 31;
        const OV = 1 << 30;
        const CA = 1 << 29;
        const BYTE_COUNT = 0x7F;
        const _ = !0;
    }
}

/// Condition register field bits
pub const CR_LT: u8 = 8;
pub const CR_GT: u8 = 4;
pub const CR_EQ: u8 = 2;
pub const CR_SO: u8 = 1;

/// The condition register, held as eight expanded 4-bit fields
///
/// Field 0 is the most significant nibble of the packed 32-bit form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ConditionRegister {
    pub fields: [u8; 8],
}

impl ConditionRegister {
    /// Build the expanded form from a packed 32-bit value
    pub fn expand(packed: u32) -> Self {
        let mut fields = [0u8; 8];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = ((packed >> (28 - 4 * i)) & 0xF) as u8;
        }
        Self { fields }
    }

    /// Packed 32-bit form
    pub fn pack(&self) -> u32 {
        self.fields
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &f)| acc | (((f & 0xF) as u32) << (28 - 4 * i)))
    }

    #[inline]
    pub fn field(&self, index: usize) -> u8 {
        self.fields[index]
    }

    #[inline]
    pub fn set_field(&mut self, index: usize, value: u8) {
        self.fields[index] = value & 0xF;
    }

    /// Read CR bit `bit` (0 = LT of CR0)
    #[inline]
    pub fn bit(&self, bit: u32) -> bool {
        (self.fields[(bit >> 2) as usize] >> (3 - (bit & 3))) & 1 != 0
    }

    #[inline]
    pub fn set_bit(&mut self, bit: u32, value: bool) {
        let field = &mut self.fields[(bit >> 2) as usize];
        let mask = 1 << (3 - (bit & 3));
        if value {
            *field |= mask;
        } else {
            *field &= !mask;
        }
    }
}

/// Complete architectural state of one Gekko core
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PowerPcState {
    /// Paired-single / floating-point registers
    pub ps: [PairedSingle; 32],
    pub gpr: [u32; 32],
    pub spr: [u32; 1024],
    pub sr: [u32; 16],
    pub cr: ConditionRegister,
    pub pc: u32,
    pub npc: u32,
    pub msr: u32,
    pub fpscr: u32,
    /// Pending exceptions, see [`crate::exceptions::Exceptions`]
    pub exceptions: u32,
    /// Non-zero while a `lwarx` reservation is held
    pub reserve: u32,
    pub reserve_address: u32,
    /// Remaining cycle budget of the current slice
    pub downcount: i32,
}

impl Default for PowerPcState {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerPcState {
    /// Size of a save state in bytes
    pub const SAVE_STATE_SIZE: usize = std::mem::size_of::<Self>();

    /// Power-on state
    pub fn new() -> Self {
        let mut state = Self::zeroed();
        state.spr[spr::PVR] = GEKKO_PVR;
        state
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // Special registers

    #[inline]
    pub fn lr(&self) -> u32 {
        self.spr[spr::LR]
    }
    #[inline]
    pub fn set_lr(&mut self, value: u32) {
        self.spr[spr::LR] = value;
    }
    #[inline]
    pub fn ctr(&self) -> u32 {
        self.spr[spr::CTR]
    }
    #[inline]
    pub fn set_ctr(&mut self, value: u32) {
        self.spr[spr::CTR] = value;
    }

    #[inline]
    pub fn msr(&self) -> Msr {
        Msr::from_bits_retain(self.msr)
    }

    // XER

    #[inline]
    pub fn xer(&self) -> Xer {
        Xer::from_bits_retain(self.spr[spr::XER])
    }
    #[inline]
    pub fn set_xer(&mut self, xer: Xer) {
        self.spr[spr::XER] = xer.bits();
    }
    #[inline]
    pub fn xer_ca(&self) -> bool {
        self.xer().contains(Xer::CA)
    }
    #[inline]
    pub fn set_xer_ca(&mut self, ca: bool) {
        let mut xer = self.xer();
        xer.set(Xer::CA, ca);
        self.set_xer(xer);
    }
    #[inline]
    pub fn xer_so(&self) -> bool {
        self.xer().contains(Xer::SO)
    }
    /// Set or clear OV; a set OV is also latched into SO
    #[inline]
    pub fn set_xer_ov(&mut self, ov: bool) {
        let mut xer = self.xer();
        xer.set(Xer::OV, ov);
        if ov {
            xer.insert(Xer::SO);
        }
        self.set_xer(xer);
    }
    /// String instruction byte count
    #[inline]
    pub fn xer_byte_count(&self) -> u32 {
        self.spr[spr::XER] & Xer::BYTE_COUNT.bits()
    }

    // Condition register

    /// Write a three-way comparison plus the SO copy into field `field`
    pub fn set_cr_compare(&mut self, field: usize, ordering: std::cmp::Ordering) {
        let value = match ordering {
            std::cmp::Ordering::Less => CR_LT,
            std::cmp::Ordering::Greater => CR_GT,
            std::cmp::Ordering::Equal => CR_EQ,
        };
        let so = if self.xer_so() { CR_SO } else { 0 };
        self.cr.set_field(field, value | so);
    }

    /// Signed 32-bit comparison into CR field `field`
    #[inline]
    pub fn compare_signed(&mut self, field: usize, a: i32, b: i32) {
        self.set_cr_compare(field, a.cmp(&b));
    }

    /// Unsigned 32-bit comparison into CR field `field`
    #[inline]
    pub fn compare_unsigned(&mut self, field: usize, a: u32, b: u32) {
        self.set_cr_compare(field, a.cmp(&b));
    }

    /// Record form update of CR0
    #[inline]
    pub fn update_cr0(&mut self, value: u32) {
        self.compare_signed(0, value as i32, 0);
    }

    // Time base

    pub fn time_base(&self) -> u64 {
        ((self.spr[spr::TU] as u64) << 32) | self.spr[spr::TL] as u64
    }

    pub fn set_time_base(&mut self, value: u64) {
        self.spr[spr::TL] = value as u32;
        self.spr[spr::TU] = (value >> 32) as u32;
    }

    // Save states

    /// Serialize the whole record
    pub fn save_state(&self) -> Vec<u8> {
        bytemuck::bytes_of(self).to_vec()
    }

    /// Restore from bytes produced by [`Self::save_state`]
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), CpuError> {
        if bytes.len() != Self::SAVE_STATE_SIZE {
            return Err(CpuError::SaveState {
                expected: Self::SAVE_STATE_SIZE,
                actual: bytes.len(),
            });
        }
        *self = bytemuck::pod_read_unaligned(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cr_pack_expand_identity() {
        for &packed in &[0u32, 0xFFFF_FFFF, 0x1234_5678, 0x8000_0001, 0xA5A5_5A5A] {
            assert_eq!(ConditionRegister::expand(packed).pack(), packed);
        }

        let cr = ConditionRegister { fields: [8, 4, 2, 1, 0xF, 0, 3, 0xC] };
        assert_eq!(ConditionRegister::expand(cr.pack()), cr);
        assert_eq!(cr.pack(), 0x8421_F03C);
    }

    #[test]
    fn test_cr_every_field_value() {
        for index in 0..8 {
            for value in 0u8..16 {
                let mut cr = ConditionRegister::default();
                cr.set_field(index, value);
                let packed = cr.pack();
                assert_eq!(packed, (value as u32) << (28 - 4 * index));
                assert_eq!(ConditionRegister::expand(packed), cr);
                assert_eq!(ConditionRegister::expand(packed).field(index), value);

                // Neighbouring fields stay untouched
                let mut full = ConditionRegister::expand(0xFFFF_FFFF);
                full.set_field(index, value);
                let mask = 0xFu32 << (28 - 4 * index);
                assert_eq!(full.pack() & !mask, !mask);
                assert_eq!(ConditionRegister::expand(full.pack()), full);
            }
        }
    }

    #[test]
    fn test_cr_pack_expand_pseudo_random() {
        // Numerical Recipes LCG
        let mut seed = 0x1234_5678u32;
        for _ in 0..10_000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let cr = ConditionRegister::expand(seed);
            assert_eq!(cr.pack(), seed);
            assert_eq!(ConditionRegister::expand(cr.pack()), cr);
            assert!(cr.fields.iter().all(|&f| f <= 0xF));
        }
    }

    #[test]
    fn test_cr_bits() {
        let mut cr = ConditionRegister::default();
        cr.set_bit(2, true);
        assert_eq!(cr.field(0), CR_EQ);
        assert!(cr.bit(2));
        cr.set_bit(31, true);
        assert_eq!(cr.pack(), 0x2000_0001);
        cr.set_bit(2, false);
        assert!(!cr.bit(2));
    }

    #[test]
    fn test_compare_helpers() {
        let mut state = PowerPcState::new();
        state.compare_signed(3, -1, 0);
        assert_eq!(state.cr.field(3), CR_LT);
        state.compare_unsigned(3, u32::MAX, 0);
        assert_eq!(state.cr.field(3), CR_GT);

        state.set_xer_ov(true);
        assert!(state.xer_so());
        state.update_cr0(0);
        assert_eq!(state.cr.field(0), CR_EQ | CR_SO);
    }

    #[test]
    fn test_xer_ov_clear_keeps_so() {
        let mut state = PowerPcState::new();
        state.set_xer_ov(true);
        state.set_xer_ov(false);
        assert!(state.xer_so());
        assert!(!state.xer().contains(Xer::OV));
    }

    #[test]
    fn test_save_state_roundtrip() {
        let mut state = PowerPcState::new();
        state.gpr[3] = 0xDEAD_BEEF;
        state.ps[1].set_both(1.0, -2.0);
        state.cr.set_field(7, CR_GT);
        state.pc = 0x8000_3100;

        let bytes = state.save_state();
        assert_eq!(bytes.len(), PowerPcState::SAVE_STATE_SIZE);

        let mut restored = PowerPcState::new();
        restored.load_state(&bytes).unwrap();
        assert_eq!(restored.gpr[3], 0xDEAD_BEEF);
        assert_eq!(restored.ps[1].ps1_as_double(), -2.0);
        assert_eq!(restored.cr.field(7), CR_GT);
        assert_eq!(restored.pc, 0x8000_3100);
    }

    #[test]
    fn test_load_state_rejects_wrong_size() {
        let mut state = PowerPcState::new();
        assert_eq!(
            state.load_state(&[0u8; 16]),
            Err(CpuError::SaveState {
                expected: PowerPcState::SAVE_STATE_SIZE,
                actual: 16
            })
        );
    }

    #[test]
    fn test_power_on_pvr() {
        assert_eq!(PowerPcState::new().spr[spr::PVR], GEKKO_PVR);
    }
}

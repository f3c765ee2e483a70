//! System, condition register, special register and FPSCR instructions

use super::check_supervisor;
use crate::decoder::Instruction;
use crate::exceptions::{program_cause, Exceptions};
use crate::fpscr::Fpscr;
use crate::interpreter::Interpreter;
use crate::state::{spr, ConditionRegister, PowerPcState, Xer};
use og_core::cpu_debug;

/// MSR bits restored from SRR1 by `rfi`
const RFI_MSR_MASK: u32 = 0x87C0_FFFF;
/// `rfi` always clears MSR bit 13 (big-endian numbering)
const RFI_MSR_CLEAR: u32 = 1 << 18;

/// HID0 instruction cache flash invalidate
const HID0_ICFI: u32 = 1 << 11;

/// Value ORed into the upper word of `mffs` results
const MFFS_PATTERN: u64 = 0xFFF8_0000_0000_0000;

pub fn sc(_: &mut Interpreter, state: &mut PowerPcState, _inst: Instruction) {
    state.raise(Exceptions::SYSCALL);
}

pub fn rfi(_: &mut Interpreter, state: &mut PowerPcState, _inst: Instruction) {
    if !check_supervisor(state) {
        return;
    }
    let srr1 = state.spr[spr::SRR1];
    state.msr = ((state.msr & !RFI_MSR_MASK) | (srr1 & RFI_MSR_MASK)) & !RFI_MSR_CLEAR;
    state.npc = state.spr[spr::SRR0];
}

pub fn isync(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn sync(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn eieio(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

// Condition register

pub fn mcrf(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let field = state.cr.field(inst.crfs());
    state.cr.set_field(inst.crfd(), field);
}

#[inline]
fn cr_logical(state: &mut PowerPcState, inst: Instruction, op: fn(bool, bool) -> bool) {
    let a = state.cr.bit(inst.crba());
    let b = state.cr.bit(inst.crbb());
    state.cr.set_bit(inst.crbd(), op(a, b));
}

pub fn crand(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| a & b);
}

pub fn crandc(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| a & !b);
}

pub fn creqv(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| a == b);
}

pub fn crnand(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| !(a & b));
}

pub fn crnor(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| !(a | b));
}

pub fn cror(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| a | b);
}

pub fn crorc(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| a | !b);
}

pub fn crxor(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    cr_logical(state, inst, |a, b| a ^ b);
}

pub fn mfcr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.gpr[inst.rd()] = state.cr.pack();
}

pub fn mtcrf(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let crm = inst.crm();
    let value = state.gpr[inst.rs()];
    if crm == 0xFF {
        state.cr = ConditionRegister::expand(value);
        return;
    }
    for field in 0..8 {
        if crm & (0x80 >> field) != 0 {
            state.cr.set_field(field, ((value >> (28 - 4 * field)) & 0xF) as u8);
        }
    }
}

pub fn mcrxr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let xer = state.xer();
    state.cr.set_field(inst.crfd(), (xer.bits() >> 28) as u8);
    state.set_xer(xer - (Xer::SO | Xer::OV | Xer::CA));
}

// Machine state and segment registers

pub fn mfmsr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if check_supervisor(state) {
        state.gpr[inst.rd()] = state.msr;
    }
}

pub fn mtmsr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if check_supervisor(state) {
        state.msr = state.gpr[inst.rs()];
    }
}

pub fn mtsr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if check_supervisor(state) {
        state.sr[inst.sr()] = state.gpr[inst.rs()];
    }
}

pub fn mtsrin(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if check_supervisor(state) {
        let index = (state.gpr[inst.rb()] >> 28) as usize;
        state.sr[index] = state.gpr[inst.rs()];
    }
}

pub fn mfsr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if check_supervisor(state) {
        state.gpr[inst.rd()] = state.sr[inst.sr()];
    }
}

pub fn mfsrin(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if check_supervisor(state) {
        let index = (state.gpr[inst.rb()] >> 28) as usize;
        state.gpr[inst.rd()] = state.sr[index];
    }
}

pub fn tlbie(_: &mut Interpreter, state: &mut PowerPcState, _inst: Instruction) {
    check_supervisor(state);
}

pub fn tlbsync(_: &mut Interpreter, state: &mut PowerPcState, _inst: Instruction) {
    check_supervisor(state);
}

// Special purpose registers

/// SPRs with bit 4 of the number set are supervisor only
#[inline]
fn spr_access_allowed(state: &mut PowerPcState, index: usize) -> bool {
    if index & 0x10 != 0 {
        check_supervisor(state)
    } else {
        true
    }
}

pub fn mfspr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let index = inst.spr();
    if !spr_access_allowed(state, index) {
        return;
    }
    state.gpr[inst.rd()] = match index {
        spr::TBL_READ => state.spr[spr::TL],
        spr::TBU_READ => state.spr[spr::TU],
        _ => state.spr[index],
    };
}

pub fn mtspr(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let index = inst.spr();
    if !spr_access_allowed(state, index) {
        return;
    }

    let old = state.spr[index];
    let value = state.gpr[inst.rs()];
    state.spr[index] = value;

    match index {
        spr::PVR => state.spr[index] = old,
        spr::DEC => {
            if old & 0x8000_0000 == 0 && value & 0x8000_0000 != 0 {
                cpu_debug!("Decrementer written negative (0x{:08x})", value);
                state.raise(Exceptions::DECREMENTER);
            }
        }
        spr::HID0 => {
            if value & HID0_ICFI != 0 {
                state.spr[index] &= !HID0_ICFI;
                interp.request_cache_invalidation();
            }
        }
        _ => {}
    }
}

pub fn mftb(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    match inst.tbr() {
        spr::TBL_READ => state.gpr[inst.rd()] = state.spr[spr::TL],
        spr::TBU_READ => state.gpr[inst.rd()] = state.spr[spr::TU],
        _ => state.raise_program(program_cause::ILLEGAL_INSTRUCTION),
    }
}

// Floating-point status and control register

#[inline]
fn record(state: &mut PowerPcState, inst: Instruction) {
    if inst.rc() {
        state.update_cr1();
    }
}

/// Mask of the four FPSCR bits in field `field`
#[inline]
fn fpscr_field_mask(field: usize) -> u32 {
    0xF000_0000 >> (4 * field)
}

pub fn mcrfs(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let shift = 28 - 4 * inst.crfs() as u32;
    let field = (state.fpscr >> shift) & 0xF;
    state.cr.set_field(inst.crfd(), field as u8);

    let clear = fpscr_field_mask(inst.crfs()) & (Fpscr::FX | Fpscr::ANY_X).bits();
    let fpscr = state.fpscr & !clear;
    state.set_fpscr(fpscr);
}

pub fn mffsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.ps[inst.fd()].ps0 = MFFS_PATTERN | state.fpscr as u64;
    record(state, inst);
}

pub fn mtfsb0x(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let bit = 0x8000_0000u32 >> inst.crbd();
    let fpscr = state.fpscr & !bit;
    state.set_fpscr(fpscr);
    record(state, inst);
}

pub fn mtfsb1x(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let bit = 0x8000_0000u32 >> inst.crbd();
    if bit & Fpscr::ANY_X.bits() != 0 {
        state.set_fp_exception(Fpscr::from_bits_retain(bit));
    } else {
        let fpscr = state.fpscr | bit;
        state.set_fpscr(fpscr);
    }
    record(state, inst);
}

pub fn mtfsfix(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let field = inst.crfd();
    let value = (inst.imm() << 28) >> (4 * field);
    let fpscr = (state.fpscr & !fpscr_field_mask(field)) | value;
    state.set_fpscr(fpscr);
    record(state, inst);
}

pub fn mtfsfx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let fm = inst.fm();
    let mask = (0..8)
        .filter(|field| fm & (0x80 >> field) != 0)
        .fold(0u32, |mask, field| mask | fpscr_field_mask(field));
    let value = state.ps[inst.fb()].ps0 as u32;
    let fpscr = (state.fpscr & !mask) | (value & mask);
    state.set_fpscr(fpscr);
    record(state, inst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Msr, CR_GT, CR_SO};
    use og_memory::FlatMemory;

    fn setup() -> (Interpreter, PowerPcState) {
        (Interpreter::new(FlatMemory::new()), PowerPcState::new())
    }

    #[test]
    fn test_mcrf_and_cr_logic() {
        let (mut interp, mut state) = setup();
        state.cr.set_field(3, CR_GT | CR_SO);
        // mcrf cr5, cr3
        mcrf(&mut interp, &mut state, Instruction(0x4E8C_0000));
        assert_eq!(state.cr.field(5), CR_GT | CR_SO);

        // crand 0, 21, 23 (GT and SO of cr5)
        crand(&mut interp, &mut state, Instruction(0x4C15_BA02));
        assert!(state.cr.bit(0));
        // crnor 1, 0, 0
        crnor(&mut interp, &mut state, Instruction(0x4C20_0042));
        assert!(!state.cr.bit(1));
    }

    #[test]
    fn test_mtcrf_partial() {
        let (mut interp, mut state) = setup();
        state.cr = ConditionRegister::expand(0x1111_1111);
        state.gpr[3] = 0xABCD_EF01;
        // mtcrf 0x81, r3
        mtcrf(&mut interp, &mut state, Instruction(0x7C68_1120));
        assert_eq!(state.cr.pack(), 0xA111_1111);
    }

    #[test]
    fn test_mcrxr_clears_xer() {
        let (mut interp, mut state) = setup();
        state.set_xer(Xer::SO | Xer::CA | Xer::from_bits_retain(5));
        // mcrxr cr2
        mcrxr(&mut interp, &mut state, Instruction(0x7D00_0400));
        assert_eq!(state.cr.field(2), 0b1010);
        assert_eq!(state.spr[spr::XER], 5);
    }

    #[test]
    fn test_segment_registers() {
        let (mut interp, mut state) = setup();
        state.gpr[3] = 0x1234;
        state.gpr[4] = 0x7000_0000;
        // mtsrin r3, r4
        mtsrin(&mut interp, &mut state, Instruction(0x7C60_21E4));
        assert_eq!(state.sr[7], 0x1234);
        // mfsr r5, 7
        mfsr(&mut interp, &mut state, Instruction(0x7CA7_04A6));
        assert_eq!(state.gpr[5], 0x1234);
    }

    #[test]
    fn test_mfspr_time_base_alias() {
        let (mut interp, mut state) = setup();
        state.set_time_base(0x0000_0001_0000_0002);
        // mftb r3 (TBL)
        mftb(&mut interp, &mut state, Instruction(0x7C6C_42E6));
        assert_eq!(state.gpr[3], 2);
        // mftbu r3
        mftb(&mut interp, &mut state, Instruction(0x7C6D_42E6));
        assert_eq!(state.gpr[3], 1);
        // mfspr r3, 268
        mfspr(&mut interp, &mut state, Instruction(0x7C6C_42A6));
        assert_eq!(state.gpr[3], 2);
    }

    #[test]
    fn test_mftb_rejects_other_registers() {
        let (mut interp, mut state) = setup();
        // mftb r3, 1
        mftb(&mut interp, &mut state, Instruction(0x7C61_02E6));
        assert!(state.pending().contains(Exceptions::PROGRAM));
    }

    #[test]
    fn test_mtspr_pvr_read_only() {
        let (mut interp, mut state) = setup();
        let pvr = state.spr[spr::PVR];
        state.gpr[3] = 0xDEAD;
        // mtspr PVR, r3
        mtspr(&mut interp, &mut state, Instruction(0x7C7F_43A6));
        assert_eq!(state.spr[spr::PVR], pvr);
    }

    #[test]
    fn test_mtspr_hid0_icfi() {
        let (mut interp, mut state) = setup();
        state.gpr[3] = HID0_ICFI | 1;
        // mtspr HID0, r3
        mtspr(&mut interp, &mut state, Instruction(0x7C70_FBA6));
        assert_eq!(state.spr[spr::HID0], 1);
        assert!(interp.take_cache_invalidation());
    }

    #[test]
    fn test_user_mode_spr_access() {
        let (mut interp, mut state) = setup();
        state.msr = Msr::PR.bits();
        state.set_lr(0x42);
        // mflr r3 is allowed
        mfspr(&mut interp, &mut state, Instruction(0x7C68_02A6));
        assert_eq!(state.gpr[3], 0x42);
        assert!(state.pending().is_empty());

        // mfspr r3, SRR0 is not
        mfspr(&mut interp, &mut state, Instruction(0x7C7A_02A6));
        assert!(state.pending().contains(Exceptions::PROGRAM));
    }

    #[test]
    fn test_mtmsr() {
        let (mut interp, mut state) = setup();
        state.gpr[3] = (Msr::EE | Msr::FP).bits();
        // mtmsr r3
        mtmsr(&mut interp, &mut state, Instruction(0x7C60_0124));
        assert_eq!(state.msr(), Msr::EE | Msr::FP);
    }

    #[test]
    fn test_mtfsb1_exception_bit_sets_fx() {
        let (mut interp, mut state) = setup();
        // mtfsb1 5 (ZX)
        mtfsb1x(&mut interp, &mut state, Instruction(0xFCA0_004C));
        assert!(state.fpscr().contains(Fpscr::ZX | Fpscr::FX));

        // mtfsb0 5
        mtfsb0x(&mut interp, &mut state, Instruction(0xFCA0_008C));
        assert!(!state.fpscr().contains(Fpscr::ZX));
    }

    #[test]
    fn test_mtfsf_mask() {
        let (mut interp, mut state) = setup();
        state.ps[2].ps0 = 0x0000_0000_FFFF_FFFF;
        // mtfsf 0x01, f2
        mtfsfx(&mut interp, &mut state, Instruction(0xFC02_158E));
        assert_eq!(state.fpscr, 0xF);
    }

    #[test]
    fn test_mtfsf_recomputes_summary() {
        let (mut interp, mut state) = setup();
        state.ps[2].ps0 = Fpscr::VXSNAN.bits() as u64;
        // mtfsf 0xFF, f2
        mtfsfx(&mut interp, &mut state, Instruction(0xFDFE_158E));
        assert!(state.fpscr().contains(Fpscr::VX | Fpscr::VXSNAN));
    }

    #[test]
    fn test_mcrfs_clears_exception_bits() {
        let (mut interp, mut state) = setup();
        state.set_fp_exception(Fpscr::OX);
        // mcrfs cr1, 0
        mcrfs(&mut interp, &mut state, Instruction(0xFC80_0080));
        assert_eq!(state.cr.field(1), 0b1001);
        assert!(!state.fpscr().intersects(Fpscr::FX | Fpscr::OX));
    }
}

//! Scalar floating-point instructions
//!
//! Double-precision results go to lane 0 only. Single-precision results are
//! rounded and written to both lanes of the target register.

use crate::decoder::Instruction;
use crate::fpscr::{Fpscr, RoundingMode};
use crate::interpreter::Interpreter;
use crate::numeric::{
    self, force_double, force_single, fpcc, is_snan, negate_unless_nan, ni_add, ni_div,
    ni_madd, ni_msub, ni_mul, ni_sub, update_fprf, DOUBLE_SIGN,
};
use crate::state::PowerPcState;

#[inline]
fn operand(state: &PowerPcState, reg: usize) -> f64 {
    state.ps[reg].ps0_as_double()
}

#[inline]
fn record(state: &mut PowerPcState, inst: Instruction) {
    if inst.rc() {
        state.update_cr1();
    }
}

/// Write a double-precision arithmetic result
#[inline]
fn finish_double(state: &mut PowerPcState, inst: Instruction, value: f64) {
    let value = force_double(state, value);
    state.ps[inst.fd()].set_ps0(value);
    update_fprf(state, value);
    record(state, inst);
}

/// Round to single and write both lanes
#[inline]
fn finish_single(state: &mut PowerPcState, inst: Instruction, value: f64) {
    let value = force_single(state, value);
    state.ps[inst.fd()].fill(value);
    update_fprf(state, value);
    record(state, inst);
}

/// Compare two doubles into CR field `crfd` and FPCC
pub(crate) fn compare(state: &mut PowerPcState, crfd: usize, a: f64, b: f64, ordered: bool) {
    let result = if a.is_nan() || b.is_nan() {
        let snan = is_snan(a) || is_snan(b);
        if snan {
            state.set_fp_exception(Fpscr::VXSNAN);
        }
        if ordered && (!snan || !state.fpscr().contains(Fpscr::VE)) {
            state.set_fp_exception(Fpscr::VXVC);
        }
        fpcc::FU
    } else if a < b {
        fpcc::FL
    } else if a > b {
        fpcc::FG
    } else {
        fpcc::FE
    };

    state.set_fpcc(result);
    state.cr.set_field(crfd, result as u8);
}

// Compare

pub fn fcmpu(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    compare(state, inst.crfd(), a, b, false);
}

pub fn fcmpo(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    compare(state, inst.crfd(), a, b, true);
}

// Moves

pub fn fmrx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.ps[inst.fd()].ps0 = state.ps[inst.fb()].ps0;
    record(state, inst);
}

pub fn fnegx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.ps[inst.fd()].ps0 = state.ps[inst.fb()].ps0 ^ DOUBLE_SIGN;
    record(state, inst);
}

pub fn fabsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.ps[inst.fd()].ps0 = state.ps[inst.fb()].ps0 & !DOUBLE_SIGN;
    record(state, inst);
}

pub fn fnabsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.ps[inst.fd()].ps0 = state.ps[inst.fb()].ps0 | DOUBLE_SIGN;
    record(state, inst);
}

pub fn fselx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = operand(state, inst.fa());
    let pick = if a >= -0.0 { inst.fc() } else { inst.fb() };
    state.ps[inst.fd()].ps0 = state.ps[pick].ps0;
    record(state, inst);
}

// Conversions

pub fn frspx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = operand(state, inst.fb());
    if is_snan(b) {
        state.set_fp_exception(Fpscr::VXSNAN);
    }

    let rounded = force_single(state, b);
    let inexact = b.is_finite() && rounded != b;
    state.set_fi(inexact);
    state.set_fr(inexact && rounded.abs() > b.abs());

    state.ps[inst.fd()].fill(rounded);
    update_fprf(state, rounded);
    record(state, inst);
}

pub fn fctiwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = operand(state, inst.fb());
    let mode = state.rounding_mode();
    state.ps[inst.fd()].ps0 = numeric::convert_to_integer(state, b, mode);
    record(state, inst);
}

pub fn fctiwzx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = operand(state, inst.fb());
    state.ps[inst.fd()].ps0 = numeric::convert_to_integer(state, b, RoundingMode::TowardZero);
    record(state, inst);
}

// Double precision arithmetic

pub fn faddx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    let value = ni_add(state, a, b);
    finish_double(state, inst, value);
}

pub fn fsubx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    let value = ni_sub(state, a, b);
    finish_double(state, inst, value);
}

pub fn fmulx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, c) = (operand(state, inst.fa()), operand(state, inst.fc()));
    let value = ni_mul(state, a, c);
    finish_double(state, inst, value);
}

pub fn fdivx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    let value = ni_div(state, a, b);
    finish_double(state, inst, value);
}

pub fn fmaddx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = ni_madd(state, a, c, b);
    finish_double(state, inst, value);
}

pub fn fmsubx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = ni_msub(state, a, c, b);
    finish_double(state, inst, value);
}

pub fn fnmaddx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = negate_unless_nan(ni_madd(state, a, c, b));
    finish_double(state, inst, value);
}

pub fn fnmsubx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = negate_unless_nan(ni_msub(state, a, c, b));
    finish_double(state, inst, value);
}

pub fn frsqrtex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = operand(state, inst.fb());
    let value = numeric::rsqrt_estimate(state, b);
    finish_double(state, inst, value);
}

// Single precision arithmetic

pub fn faddsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    let value = ni_add(state, a, b);
    finish_single(state, inst, value);
}

pub fn fsubsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    let value = ni_sub(state, a, b);
    finish_single(state, inst, value);
}

pub fn fmulsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, c) = (operand(state, inst.fa()), operand(state, inst.fc()));
    let value = ni_mul(state, a, c);
    finish_single(state, inst, value);
}

pub fn fdivsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (operand(state, inst.fa()), operand(state, inst.fb()));
    let value = ni_div(state, a, b);
    finish_single(state, inst, value);
}

pub fn fmaddsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = ni_madd(state, a, c, b);
    finish_single(state, inst, value);
}

pub fn fmsubsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = ni_msub(state, a, c, b);
    finish_single(state, inst, value);
}

pub fn fnmaddsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = negate_unless_nan(ni_madd(state, a, c, b));
    finish_single(state, inst, value);
}

pub fn fnmsubsx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (operand(state, inst.fa()), operand(state, inst.fb()), operand(state, inst.fc()));
    let value = negate_unless_nan(ni_msub(state, a, c, b));
    finish_single(state, inst, value);
}

pub fn fresx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = operand(state, inst.fb());
    let value = numeric::reciprocal_estimate(state, b);
    finish_single(state, inst, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{fpclass, PPC_NAN_BITS};
    use crate::state::{CR_EQ, CR_GT};
    use og_memory::FlatMemory;

    fn setup() -> (Interpreter, PowerPcState) {
        (Interpreter::new(FlatMemory::new()), PowerPcState::new())
    }

    const SNAN: u64 = 0x7FF0_0000_0000_0001;

    #[test]
    fn test_fmadd_and_fnmsub() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(2.0);
        state.ps[3].set_ps0(1.0);
        state.ps[4].set_ps0(3.0);
        // fmadd f1, f2, f4, f3
        fmaddx(&mut interp, &mut state, Instruction(0xFC22_193A));
        assert_eq!(state.ps[1].ps0_as_double(), 7.0);
        // fnmsub f1, f2, f4, f3
        fnmsubx(&mut interp, &mut state, Instruction(0xFC22_193C));
        assert_eq!(state.ps[1].ps0_as_double(), -5.0);
        assert_eq!((state.fpscr >> 12) & 0x1F, fpclass::NN);
    }

    #[test]
    fn test_fnmadd_keeps_nan_sign() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(f64::INFINITY);
        state.ps[4].set_ps0(0.0);
        state.ps[3].set_ps0(1.0);
        fnmaddx(&mut interp, &mut state, Instruction(0xFC22_193E));
        assert_eq!(state.ps[1].ps0, PPC_NAN_BITS);
        assert!(state.fpscr().contains(Fpscr::VXIMZ));
    }

    #[test]
    fn test_double_ops_leave_ps1() {
        let (mut interp, mut state) = setup();
        state.ps[1].set_ps1(42.0);
        state.ps[2].set_ps0(1.0);
        state.ps[3].set_ps0(2.0);
        // fsub f1, f2, f3
        fsubx(&mut interp, &mut state, Instruction(0xFC22_1828));
        assert_eq!(state.ps[1].ps0_as_double(), -1.0);
        assert_eq!(state.ps[1].ps1_as_double(), 42.0);
    }

    #[test]
    fn test_fsel_negative_zero() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(-0.0);
        state.ps[3].set_ps0(10.0);
        state.ps[4].set_ps0(20.0);
        // fsel f1, f2, f4, f3
        fselx(&mut interp, &mut state, Instruction(0xFC22_192E));
        assert_eq!(state.ps[1].ps0_as_double(), 20.0);

        state.ps[2].set_ps0(f64::NAN);
        fselx(&mut interp, &mut state, Instruction(0xFC22_192E));
        assert_eq!(state.ps[1].ps0_as_double(), 10.0);
    }

    #[test]
    fn test_frsp_inexact() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(0.1);
        // frsp f1, f2
        frspx(&mut interp, &mut state, Instruction(0xFC20_1018));
        assert_eq!(state.ps[1].ps0_as_double(), 0.1f32 as f64);
        assert_eq!(state.ps[1].ps1, state.ps[1].ps0);
        assert!(state.fpscr().contains(Fpscr::FI | Fpscr::XX));

        state.ps[2].set_ps0(0.5);
        frspx(&mut interp, &mut state, Instruction(0xFC20_1018));
        assert!(!state.fpscr().contains(Fpscr::FI));
    }

    #[test]
    fn test_fcmpo_nan() {
        let (mut interp, mut state) = setup();
        state.ps[2].ps0 = SNAN;
        state.ps[3].set_ps0(1.0);
        // fcmpo cr1, f2, f3
        fcmpo(&mut interp, &mut state, Instruction(0xFC82_1840));
        assert_eq!(state.cr.field(1), fpcc::FU as u8);
        assert!(state.fpscr().contains(Fpscr::VXSNAN | Fpscr::VXVC));
    }

    #[test]
    fn test_fcmpu_quiet_nan_no_vxvc() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(f64::NAN);
        state.ps[3].set_ps0(1.0);
        fcmpu(&mut interp, &mut state, Instruction(0xFC82_1800));
        assert!(!state.fpscr().intersects(Fpscr::VXVC | Fpscr::VXSNAN));
        assert_eq!(state.cr.field(1), 1);
    }

    #[test]
    fn test_compare_helper_orders() {
        let mut state = PowerPcState::new();
        compare(&mut state, 2, 3.0, 1.0, false);
        assert_eq!(state.cr.field(2), CR_GT);
        compare(&mut state, 2, -0.0, 0.0, false);
        assert_eq!(state.cr.field(2), CR_EQ);
    }

    #[test]
    fn test_fctiw_rounding_mode() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(2.5);
        // fctiw f1, f2 with round to nearest even
        fctiwx(&mut interp, &mut state, Instruction(0xFC20_101C));
        assert_eq!(state.ps[1].ps0 as u32, 2);

        state.set_fpscr(RoundingMode::TowardPositive as u32);
        fctiwx(&mut interp, &mut state, Instruction(0xFC20_101C));
        assert_eq!(state.ps[1].ps0 as u32, 3);

        state.ps[2].set_ps0(f64::NAN);
        fctiwx(&mut interp, &mut state, Instruction(0xFC20_101C));
        assert_eq!(state.ps[1].ps0 as u32, 0x8000_0000);
        assert!(state.fpscr().contains(Fpscr::VXCVI));
    }

    #[test]
    fn test_record_form_copies_summary() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(f64::INFINITY);
        state.ps[3].set_ps0(f64::INFINITY);
        // fsub. f1, f2, f3
        fsubx(&mut interp, &mut state, Instruction(0xFC22_1829));
        // FX and VX
        assert_eq!(state.cr.field(1), 0b1010);
    }

    #[test]
    fn test_fres_fills_lanes() {
        let (mut interp, mut state) = setup();
        state.ps[2].set_ps0(4.0);
        // fres f1, f2
        fresx(&mut interp, &mut state, Instruction(0xEC20_1030));
        assert_eq!(state.ps[1].ps0_as_double(), 0.25);
        assert_eq!(state.ps[1].ps1_as_double(), 0.25);
    }
}

//! Paired-single arithmetic, moves, merges and compares
//!
//! Lane-wise operations compute each lane in double precision and round the
//! result to single. FPRF always follows the lane 0 result.

use crate::decoder::Instruction;
use crate::interpreter::Interpreter;
use crate::numeric::{
    force_single, negate_unless_nan, ni_add, ni_div, ni_madd, ni_msub, ni_mul, ni_sub,
    reciprocal_estimate, rsqrt_estimate_single, update_fprf, DOUBLE_SIGN,
};
use crate::ps::PairedSingle;
use crate::state::PowerPcState;

use super::float::compare;

#[inline]
fn record(state: &mut PowerPcState, inst: Instruction) {
    if inst.rc() {
        state.update_cr1();
    }
}

/// Round both lanes to single, store them and update FPRF from lane 0
#[inline]
fn finish(state: &mut PowerPcState, inst: Instruction, ps0: f64, ps1: f64) {
    let ps0 = force_single(state, ps0);
    let ps1 = force_single(state, ps1);
    state.ps[inst.fd()].set_both(ps0, ps1);
    update_fprf(state, ps0);
    record(state, inst);
}

#[inline]
fn lanes(state: &PowerPcState, reg: usize) -> (f64, f64) {
    let ps = state.ps[reg];
    (ps.ps0_as_double(), ps.ps1_as_double())
}

/// Round a lane for a decision made at single precision, keeping NaNs as-is
#[inline]
fn as_single(value: f64) -> f64 {
    if value.is_nan() {
        value
    } else {
        value as f32 as f64
    }
}

// Compare

pub fn ps_cmpu0(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()).0, lanes(state, inst.fb()).0);
    compare(state, inst.crfd(), as_single(a), as_single(b), false);
}

pub fn ps_cmpo0(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()).0, lanes(state, inst.fb()).0);
    compare(state, inst.crfd(), as_single(a), as_single(b), true);
}

pub fn ps_cmpu1(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()).1, lanes(state, inst.fb()).1);
    compare(state, inst.crfd(), as_single(a), as_single(b), false);
}

pub fn ps_cmpo1(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()).1, lanes(state, inst.fb()).1);
    compare(state, inst.crfd(), as_single(a), as_single(b), true);
}

// Moves

#[inline]
fn move_bits(state: &mut PowerPcState, inst: Instruction, f: impl Fn(u64) -> u64) {
    let b = state.ps[inst.fb()];
    state.ps[inst.fd()] = PairedSingle::new(f(b.ps0), f(b.ps1));
    record(state, inst);
}

pub fn ps_mr(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    move_bits(state, inst, |v| v);
}

pub fn ps_neg(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    move_bits(state, inst, |v| v ^ DOUBLE_SIGN);
}

pub fn ps_abs(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    move_bits(state, inst, |v| v & !DOUBLE_SIGN);
}

pub fn ps_nabs(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    move_bits(state, inst, |v| v | DOUBLE_SIGN);
}

pub fn ps_sel(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.ps[inst.fa()];
    let b = state.ps[inst.fb()];
    let c = state.ps[inst.fc()];
    let pick = |a: f64, c: u64, b: u64| if as_single(a) >= -0.0 { c } else { b };
    state.ps[inst.fd()] = PairedSingle::new(
        pick(a.ps0_as_double(), c.ps0, b.ps0),
        pick(a.ps1_as_double(), c.ps1, b.ps1),
    );
    record(state, inst);
}

// Merges

#[inline]
fn merge(state: &mut PowerPcState, inst: Instruction, ps0: u64, ps1: u64) {
    state.ps[inst.fd()] = PairedSingle::new(ps0, ps1);
    record(state, inst);
}

pub fn ps_merge00(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (state.ps[inst.fa()], state.ps[inst.fb()]);
    merge(state, inst, a.ps0, b.ps0);
}

pub fn ps_merge01(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (state.ps[inst.fa()], state.ps[inst.fb()]);
    merge(state, inst, a.ps0, b.ps1);
}

pub fn ps_merge10(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (state.ps[inst.fa()], state.ps[inst.fb()]);
    merge(state, inst, a.ps1, b.ps0);
}

pub fn ps_merge11(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (state.ps[inst.fa()], state.ps[inst.fb()]);
    merge(state, inst, a.ps1, b.ps1);
}

// Lane-wise arithmetic

pub fn ps_add(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()), lanes(state, inst.fb()));
    let ps0 = ni_add(state, a.0, b.0);
    let ps1 = ni_add(state, a.1, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_sub(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()), lanes(state, inst.fb()));
    let ps0 = ni_sub(state, a.0, b.0);
    let ps1 = ni_sub(state, a.1, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_mul(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, c) = (lanes(state, inst.fa()), lanes(state, inst.fc()));
    let ps0 = ni_mul(state, a.0, c.0);
    let ps1 = ni_mul(state, a.1, c.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_div(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b) = (lanes(state, inst.fa()), lanes(state, inst.fb()));
    let ps0 = ni_div(state, a.0, b.0);
    let ps1 = ni_div(state, a.1, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_madd(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let ps0 = ni_madd(state, a.0, c.0, b.0);
    let ps1 = ni_madd(state, a.1, c.1, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_msub(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let ps0 = ni_msub(state, a.0, c.0, b.0);
    let ps1 = ni_msub(state, a.1, c.1, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_nmadd(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let ps0 = negate_unless_nan(ni_madd(state, a.0, c.0, b.0));
    let ps1 = negate_unless_nan(ni_madd(state, a.1, c.1, b.1));
    finish(state, inst, ps0, ps1);
}

pub fn ps_nmsub(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let ps0 = negate_unless_nan(ni_msub(state, a.0, c.0, b.0));
    let ps1 = negate_unless_nan(ni_msub(state, a.1, c.1, b.1));
    finish(state, inst, ps0, ps1);
}

pub fn ps_res(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = lanes(state, inst.fb());
    let ps0 = reciprocal_estimate(state, b.0);
    let ps1 = reciprocal_estimate(state, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_rsqrte(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let b = lanes(state, inst.fb());
    let ps0 = rsqrt_estimate_single(state, b.0);
    let ps1 = rsqrt_estimate_single(state, b.1);
    finish(state, inst, ps0, ps1);
}

// Scalar-broadcast and cross-lane arithmetic

pub fn ps_muls0(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, c) = (lanes(state, inst.fa()), lanes(state, inst.fc()));
    let ps0 = ni_mul(state, a.0, c.0);
    let ps1 = ni_mul(state, a.1, c.0);
    finish(state, inst, ps0, ps1);
}

pub fn ps_muls1(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, c) = (lanes(state, inst.fa()), lanes(state, inst.fc()));
    let ps0 = ni_mul(state, a.0, c.1);
    let ps1 = ni_mul(state, a.1, c.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_madds0(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let ps0 = ni_madd(state, a.0, c.0, b.0);
    let ps1 = ni_madd(state, a.1, c.0, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_madds1(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let ps0 = ni_madd(state, a.0, c.1, b.0);
    let ps1 = ni_madd(state, a.1, c.1, b.1);
    finish(state, inst, ps0, ps1);
}

pub fn ps_sum0(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let sum = ni_add(state, a.0, b.1);
    finish(state, inst, sum, c.1);
}

pub fn ps_sum1(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (a, b, c) = (lanes(state, inst.fa()), lanes(state, inst.fb()), lanes(state, inst.fc()));
    let sum = ni_add(state, a.0, b.1);
    let sum = force_single(state, sum);
    let ps0 = force_single(state, c.0);
    state.ps[inst.fd()].set_both(ps0, sum);
    update_fprf(state, sum);
    record(state, inst);
}

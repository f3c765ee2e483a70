//! Branch instructions
//!
//! Targets are written to `npc`. The link register is only written when the
//! branch is taken.

use crate::decoder::Instruction;
use crate::interpreter::Interpreter;
use crate::state::PowerPcState;

/// BO: do not test the condition
const BO_IGNORE_CR: u32 = 0x10;
/// BO: branch when the condition bit is set
const BO_BRANCH_IF_TRUE: u32 = 0x08;
/// BO: do not decrement CTR
const BO_DONT_DECREMENT: u32 = 0x04;
/// BO: branch when CTR reached zero
const BO_BRANCH_IF_CTR_ZERO: u32 = 0x02;

#[inline]
fn counter_ok(state: &mut PowerPcState, bo: u32) -> bool {
    if bo & BO_DONT_DECREMENT != 0 {
        return true;
    }
    let ctr = state.ctr().wrapping_sub(1);
    state.set_ctr(ctr);
    (ctr != 0) ^ (bo & BO_BRANCH_IF_CTR_ZERO != 0)
}

#[inline]
fn condition_ok(state: &PowerPcState, bo: u32, bi: u32) -> bool {
    bo & BO_IGNORE_CR != 0 || state.cr.bit(bi) == (bo & BO_BRANCH_IF_TRUE != 0)
}

#[inline]
fn take(state: &mut PowerPcState, inst: Instruction, target: u32) {
    if inst.lk() {
        state.set_lr(state.pc.wrapping_add(4));
    }
    state.npc = target;
}

pub fn bx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let target = if inst.aa() {
        inst.li() as u32
    } else {
        state.pc.wrapping_add(inst.li() as u32)
    };
    take(state, inst, target);
}

pub fn bcx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let bo = inst.bo();
    let ctr_ok = counter_ok(state, bo);
    if ctr_ok && condition_ok(state, bo, inst.bi()) {
        let target = if inst.aa() {
            inst.bd() as u32
        } else {
            state.pc.wrapping_add(inst.bd() as u32)
        };
        take(state, inst, target);
    }
}

pub fn bclrx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let bo = inst.bo();
    let ctr_ok = counter_ok(state, bo);
    if ctr_ok && condition_ok(state, bo, inst.bi()) {
        let target = state.lr() & !3;
        take(state, inst, target);
    }
}

pub fn bcctrx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if condition_ok(state, inst.bo(), inst.bi()) {
        let target = state.ctr() & !3;
        take(state, inst, target);
    }
}

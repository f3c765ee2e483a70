//! Gekko instruction implementations
//!
//! Every handler has the [`crate::tables::Handler`] signature. Handlers
//! write their results into the processor state, set `npc` when they branch
//! and report faults by adding pending exception bits. They never return
//! errors to the host.

pub mod branch;
pub mod float;
pub mod integer;
pub mod load_store;
pub mod load_store_paired;
pub mod paired;
pub mod system;

use crate::decoder::Instruction;
use crate::exceptions::program_cause;
use crate::state::{Msr, PowerPcState};

/// `(rA|0) + d`
#[inline]
pub(crate) fn ea_d(state: &PowerPcState, inst: Instruction) -> u32 {
    base_or_zero(state, inst).wrapping_add(inst.simm16() as u32)
}

/// `rA + d`, for the update forms
#[inline]
pub(crate) fn ea_du(state: &PowerPcState, inst: Instruction) -> u32 {
    state.gpr[inst.ra()].wrapping_add(inst.simm16() as u32)
}

/// `(rA|0) + rB`
#[inline]
pub(crate) fn ea_x(state: &PowerPcState, inst: Instruction) -> u32 {
    base_or_zero(state, inst).wrapping_add(state.gpr[inst.rb()])
}

/// `rA + rB`, for the update forms
#[inline]
pub(crate) fn ea_xu(state: &PowerPcState, inst: Instruction) -> u32 {
    state.gpr[inst.ra()].wrapping_add(state.gpr[inst.rb()])
}

#[inline]
fn base_or_zero(state: &PowerPcState, inst: Instruction) -> u32 {
    if inst.ra() == 0 {
        0
    } else {
        state.gpr[inst.ra()]
    }
}

/// Raise a privileged-instruction program exception when running in user
/// mode. Returns true when the instruction may proceed.
#[inline]
pub(crate) fn check_supervisor(state: &mut PowerPcState) -> bool {
    if state.msr().contains(Msr::PR) {
        state.raise_program(program_cause::PRIVILEGED_INSTRUCTION);
        false
    } else {
        true
    }
}

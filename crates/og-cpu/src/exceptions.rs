//! Exception controller
//!
//! Handlers and interrupt sources only ever add bits to the pending set.
//! [`check_exceptions`] is the single place that clears them, one kind per
//! call, in fixed priority order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use og_core::exception_debug;

use crate::state::{spr, Msr, PowerPcState};

bitflags! {
    /// Pending exception kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Exceptions: u32 {
        const DECREMENTER     = 1 << 0;
        const SYSCALL         = 1 << 1;
        const EXTERNAL_INT    = 1 << 2;
        const DSI             = 1 << 3;
        const ISI             = 1 << 4;
        const ALIGNMENT       = 1 << 5;
        const FPU_UNAVAILABLE = 1 << 6;
        const PROGRAM         = 1 << 7;

        /// Kinds raised by the instruction being executed
        const SYNCHRONOUS = Self::SYSCALL.bits() | Self::DSI.bits() | Self::ISI.bits()
            | Self::ALIGNMENT.bits() | Self::FPU_UNAVAILABLE.bits() | Self::PROGRAM.bits();
        /// Kinds gated by MSR[EE]
        const EXTERNAL = Self::EXTERNAL_INT.bits() | Self::DECREMENTER.bits();
    }
}

/// Program exception causes, placed in SRR1 by the raising instruction
pub mod program_cause {
    pub const FLOATING_POINT: u32 = 1 << 20;
    pub const ILLEGAL_INSTRUCTION: u32 = 1 << 19;
    pub const PRIVILEGED_INSTRUCTION: u32 = 1 << 18;
    pub const TRAP: u32 = 1 << 17;
}

/// Exception vectors
pub mod vector {
    pub const DSI: u32 = 0x0000_0300;
    pub const ISI: u32 = 0x0000_0400;
    pub const EXTERNAL_INT: u32 = 0x0000_0500;
    pub const ALIGNMENT: u32 = 0x0000_0600;
    pub const PROGRAM: u32 = 0x0000_0700;
    pub const FPU_UNAVAILABLE: u32 = 0x0000_0800;
    pub const DECREMENTER: u32 = 0x0000_0900;
    pub const SYSCALL: u32 = 0x0000_0C00;
}

/// MSR bits saved into SRR1
const SRR1_MSR_MASK: u32 = 0x87C0_FFFF;
/// MSR bits cleared on entry to a handler
const MSR_CLEAR_ON_EXCEPTION: u32 = 0x0004_EF36;

/// DSISR value for a failed load
pub const DSISR_PAGE: u32 = 1 << 30;
/// Extra DSISR bit for a failed store
pub const DSISR_STORE: u32 = 1 << 25;

impl PowerPcState {
    /// Add exception kinds to the pending set
    #[inline]
    pub fn raise(&mut self, exceptions: Exceptions) {
        self.exceptions |= exceptions.bits();
    }

    #[inline]
    pub fn pending(&self) -> Exceptions {
        Exceptions::from_bits_retain(self.exceptions)
    }

    /// Raise a program exception with the given cause
    pub fn raise_program(&mut self, cause: u32) {
        self.spr[spr::SRR1] = cause;
        self.raise(Exceptions::PROGRAM);
    }

    /// Raise a data storage fault for `addr`
    pub fn raise_dsi(&mut self, addr: u32, is_store: bool) {
        self.spr[spr::DAR] = addr;
        self.spr[spr::DSISR] = if is_store { DSISR_PAGE | DSISR_STORE } else { DSISR_PAGE };
        self.raise(Exceptions::DSI);
    }

    /// Raise an alignment fault for `addr`
    pub fn raise_alignment(&mut self, addr: u32) {
        self.spr[spr::DAR] = addr;
        self.raise(Exceptions::ALIGNMENT);
    }

    /// Any pending exception the current instruction raised
    #[inline]
    pub fn has_synchronous_exception(&self) -> bool {
        self.pending().intersects(Exceptions::SYNCHRONOUS)
    }

    fn enter_exception(&mut self, kind: Exceptions, resume: u32, srr1: u32, vector: u32) {
        self.spr[spr::SRR0] = resume;
        self.spr[spr::SRR1] = srr1;

        let mut msr = self.msr();
        msr.set(Msr::LE, msr.contains(Msr::ILE));
        self.msr = msr.bits() & !MSR_CLEAR_ON_EXCEPTION;

        self.pc = vector;
        self.npc = vector;
        self.exceptions &= !kind.bits();

        exception_debug!(
            "{:?} taken, SRR0=0x{:08x} SRR1=0x{:08x} -> 0x{:08x}",
            kind,
            resume,
            srr1,
            vector
        );
    }
}

/// Service the highest priority pending exception
///
/// Returns the kind that was taken, if any. Other pending kinds stay set.
pub fn check_exceptions(state: &mut PowerPcState) -> Option<Exceptions> {
    let pending = state.pending();
    if pending.is_empty() {
        return None;
    }

    let msr_bits = state.msr & SRR1_MSR_MASK;

    if pending.contains(Exceptions::ISI) {
        let npc = state.npc;
        state.enter_exception(Exceptions::ISI, npc, msr_bits | (1 << 30), vector::ISI);
        return Some(Exceptions::ISI);
    }
    if pending.contains(Exceptions::PROGRAM) {
        let pc = state.pc;
        let srr1 = state.spr[spr::SRR1] | msr_bits;
        state.enter_exception(Exceptions::PROGRAM, pc, srr1, vector::PROGRAM);
        return Some(Exceptions::PROGRAM);
    }
    if pending.contains(Exceptions::SYSCALL) {
        let npc = state.npc;
        state.enter_exception(Exceptions::SYSCALL, npc, msr_bits, vector::SYSCALL);
        return Some(Exceptions::SYSCALL);
    }
    if pending.contains(Exceptions::FPU_UNAVAILABLE) {
        let pc = state.pc;
        state.enter_exception(Exceptions::FPU_UNAVAILABLE, pc, msr_bits, vector::FPU_UNAVAILABLE);
        return Some(Exceptions::FPU_UNAVAILABLE);
    }
    if pending.contains(Exceptions::DSI) {
        let pc = state.pc;
        state.enter_exception(Exceptions::DSI, pc, msr_bits, vector::DSI);
        return Some(Exceptions::DSI);
    }
    if pending.contains(Exceptions::ALIGNMENT) {
        let pc = state.pc;
        state.enter_exception(Exceptions::ALIGNMENT, pc, msr_bits, vector::ALIGNMENT);
        return Some(Exceptions::ALIGNMENT);
    }

    check_external_exceptions(state)
}

/// Service a pending external or decrementer interrupt when MSR[EE] is set
pub fn check_external_exceptions(state: &mut PowerPcState) -> Option<Exceptions> {
    let pending = state.pending();
    if !pending.intersects(Exceptions::EXTERNAL) || !state.msr().contains(Msr::EE) {
        return None;
    }

    let msr_bits = state.msr & SRR1_MSR_MASK;
    let resume = state.pc;
    if pending.contains(Exceptions::EXTERNAL_INT) {
        state.enter_exception(Exceptions::EXTERNAL_INT, resume, msr_bits, vector::EXTERNAL_INT);
        Some(Exceptions::EXTERNAL_INT)
    } else {
        state.enter_exception(Exceptions::DECREMENTER, resume, msr_bits, vector::DECREMENTER);
        Some(Exceptions::DECREMENTER)
    }
}

/// Add-only interrupt line shared with asynchronous producers
///
/// Other threads raise bits here; the owner of the processor state moves
/// them into the pending set before each controller pass.
#[derive(Debug, Clone, Default)]
pub struct InterruptLine {
    bits: Arc<AtomicU32>,
}

impl InterruptLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise exception kinds from any thread
    pub fn raise(&self, exceptions: Exceptions) {
        self.bits.fetch_or(exceptions.bits(), Ordering::AcqRel);
    }

    /// Bits raised but not yet delivered
    pub fn peek(&self) -> Exceptions {
        Exceptions::from_bits_retain(self.bits.load(Ordering::Acquire))
    }

    /// Move raised bits into the processor's pending set
    pub fn deliver(&self, state: &mut PowerPcState) {
        let bits = self.bits.swap(0, Ordering::AcqRel);
        if bits != 0 {
            state.raise(Exceptions::from_bits_retain(bits));
        }
    }
}

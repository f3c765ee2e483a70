//! Execution backend contract
//!
//! The interpreter and any native code generator implement [`CpuBackend`].
//! The mode controller in [`crate::cpu`] owns the processor state and lends
//! it to whichever backend is active.

use og_core::error::CpuError;

use crate::state::PowerPcState;

/// Why a run call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The cycle budget in `downcount` ran out
    BudgetExhausted,
    /// An enabled breakpoint matched before the instruction at `addr` ran
    Breakpoint { addr: u32 },
    /// A halt was requested
    Halted,
}

/// An execution engine for the Gekko core
pub trait CpuBackend: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Prepare for execution. Called when the backend becomes active.
    fn init(&mut self) -> Result<(), CpuError>;

    /// Release resources. Called when the backend is retired.
    fn shutdown(&mut self);

    /// Execute one instruction and service at most one exception
    fn single_step(&mut self, state: &mut PowerPcState) -> Result<(), CpuError>;

    /// Execute until the cycle budget in `state.downcount` is exhausted
    fn run(&mut self, state: &mut PowerPcState) -> Result<RunExit, CpuError>;

    /// Drop any cached translations of guest code
    fn invalidate_translation_cache(&mut self);
}

/// External clock consumed by the run loop
pub trait CoreTiming: Send {
    /// Called once per exhausted budget: advance the system clock and refill
    /// `state.downcount`
    fn advance(&mut self, state: &mut PowerPcState);
}

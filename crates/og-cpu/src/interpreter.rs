//! Gekko interpreter
//!
//! Fetches one instruction word, resolves it through the dispatch tables and
//! runs its handler against a [`PowerPcState`]. Handlers reach guest memory
//! through the accessors on [`Interpreter`], which turn memory errors into
//! data faults instead of host errors.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use og_core::config::CpuConfig;
use og_core::error::{CpuError, MemoryError};
use og_core::{cpu_debug, cpu_trace, exception_debug};
use og_memory::Memory;
use parking_lot::RwLock;

use crate::backend::{CpuBackend, RunExit};
use crate::decoder::Instruction;
use crate::exceptions::{self, program_cause, Exceptions, InterruptLine};
use crate::state::{Msr, PowerPcState};
use crate::tables;

/// Breakpoint type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointType {
    /// Unconditional breakpoint - always breaks
    Unconditional,
    /// Conditional breakpoint - breaks when condition is met
    Conditional(BreakpointCondition),
}

/// Breakpoint condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointCondition {
    /// Break when GPR equals value
    GprEquals { reg: usize, value: u32 },
    /// Break when instruction count reaches value
    InstructionCount { count: u64 },
}

/// Breakpoint information
#[derive(Debug, Clone)]
pub struct Breakpoint {
    /// Address of the breakpoint
    pub addr: u32,
    /// Type of breakpoint
    pub bp_type: BreakpointType,
    /// Whether the breakpoint is enabled
    pub enabled: bool,
    /// Hit count
    pub hit_count: u64,
}

/// Gekko interpreter
pub struct Interpreter {
    memory: Arc<dyn Memory>,
    /// Set when the current batch must end after this instruction
    end_block: bool,
    strict_unknown: bool,
    unknown_error: Option<CpuError>,
    count_instructions: bool,
    /// Run counters indexed by [`tables::OpInfo::id`]
    op_counts: Vec<u64>,
    cache_invalidation_requested: bool,
    interrupts: Option<InterruptLine>,
    /// Checked between batches; a set flag ends [`CpuBackend::run`]
    halt: Option<Arc<AtomicBool>>,
    /// Breakpoints (address -> breakpoint)
    breakpoints: RwLock<HashSet<u32>>,
    /// Breakpoint details
    breakpoint_details: RwLock<HashMap<u32, Breakpoint>>,
    /// Address whose breakpoint is skipped once when execution resumes
    resume_from: Option<u32>,
    /// Total instruction count (for conditional breakpoints)
    instruction_count: u64,
}

impl Interpreter {
    /// Create a new interpreter over the given memory
    pub fn new(memory: Arc<dyn Memory>) -> Self {
        tables::init();
        Self {
            memory,
            end_block: false,
            strict_unknown: false,
            unknown_error: None,
            count_instructions: false,
            op_counts: vec![0; tables::all_ops().len()],
            cache_invalidation_requested: false,
            interrupts: None,
            halt: None,
            breakpoints: RwLock::new(HashSet::new()),
            breakpoint_details: RwLock::new(HashMap::new()),
            resume_from: None,
            instruction_count: 0,
        }
    }

    /// Create an interpreter configured from the `[cpu]` config section
    pub fn from_config(memory: Arc<dyn Memory>, config: &CpuConfig) -> Self {
        let mut interpreter = Self::new(memory);
        interpreter.strict_unknown = config.strict_unknown_instructions;
        interpreter.count_instructions = config.count_instructions;
        interpreter
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    /// Stop with [`CpuError::UnknownInstruction`] instead of raising an
    /// illegal instruction exception in the guest
    pub fn set_strict_unknown_instructions(&mut self, strict: bool) {
        self.strict_unknown = strict;
    }

    pub fn set_count_instructions(&mut self, enabled: bool) {
        self.count_instructions = enabled;
    }

    /// Merge interrupts raised on `line` before every exception pass
    pub fn attach_interrupt_line(&mut self, line: InterruptLine) {
        self.interrupts = Some(line);
    }

    /// Return [`RunExit::Halted`] from `run` at the next batch boundary
    /// after `flag` is set. The flag is cleared when it is honoured.
    pub fn attach_halt_flag(&mut self, flag: Arc<AtomicBool>) {
        self.halt = Some(flag);
    }

    fn halt_requested(&self) -> bool {
        self.halt
            .as_ref()
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    }

    // ===== Breakpoints =====

    /// Add a breakpoint at the specified address
    pub fn add_breakpoint(&self, addr: u32, bp_type: BreakpointType) {
        self.breakpoints.write().insert(addr);
        self.breakpoint_details.write().insert(
            addr,
            Breakpoint {
                addr,
                bp_type,
                enabled: true,
                hit_count: 0,
            },
        );
        cpu_debug!("Added breakpoint at 0x{:08x}", addr);
    }

    /// Remove a breakpoint at the specified address
    pub fn remove_breakpoint(&self, addr: u32) {
        self.breakpoints.write().remove(&addr);
        self.breakpoint_details.write().remove(&addr);
    }

    /// Enable a breakpoint
    pub fn enable_breakpoint(&self, addr: u32) {
        if let Some(bp) = self.breakpoint_details.write().get_mut(&addr) {
            bp.enabled = true;
        }
    }

    /// Disable a breakpoint
    pub fn disable_breakpoint(&self, addr: u32) {
        if let Some(bp) = self.breakpoint_details.write().get_mut(&addr) {
            bp.enabled = false;
        }
    }

    /// Clear all breakpoints
    pub fn clear_breakpoints(&self) {
        self.breakpoints.write().clear();
        self.breakpoint_details.write().clear();
    }

    /// Get all breakpoints
    pub fn get_breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoint_details.read().values().cloned().collect()
    }

    /// Check if we should break at the current address
    #[inline]
    pub fn should_break(&self, state: &PowerPcState) -> bool {
        let pc = state.pc;

        if !self.breakpoints.read().contains(&pc) {
            return false;
        }

        let details = self.breakpoint_details.read();
        match details.get(&pc) {
            Some(bp) if bp.enabled => match bp.bp_type {
                BreakpointType::Unconditional => true,
                BreakpointType::Conditional(condition) => match condition {
                    BreakpointCondition::GprEquals { reg, value } => state.gpr[reg] == value,
                    BreakpointCondition::InstructionCount { count } => {
                        self.instruction_count >= count
                    }
                },
            },
            _ => false,
        }
    }

    /// Execute a single instruction, stopping first if a breakpoint matches.
    /// Returns the cycles charged for the instruction.
    ///
    /// A breakpoint that stopped execution is skipped once on the next call
    /// so that execution can resume past it.
    pub fn step(&mut self, state: &mut PowerPcState) -> Result<u32, CpuError> {
        let pc = state.pc;
        if self.resume_from.take() != Some(pc) && self.should_break(state) {
            if let Some(bp) = self.breakpoint_details.write().get_mut(&pc) {
                bp.hit_count += 1;
            }
            self.resume_from = Some(pc);
            return Err(CpuError::Breakpoint { addr: pc });
        }

        self.step_and_service(state)
    }

    /// One instruction followed by one exception pass
    fn step_and_service(&mut self, state: &mut PowerPcState) -> Result<u32, CpuError> {
        self.end_block = false;
        let cycles = self.single_step_inner(state)?;
        self.service_exceptions(state);
        Ok(cycles)
    }

    /// Get the current instruction count
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Reset the instruction count
    pub fn reset_instruction_count(&mut self) {
        self.instruction_count = 0;
    }

    // ===== Per-opcode statistics =====

    /// Run counts of every executed opcode, most frequent first
    pub fn instruction_counts(&self) -> Vec<(&'static str, u64)> {
        let mut counts: Vec<(&'static str, u64)> = tables::all_ops()
            .iter()
            .zip(&self.op_counts)
            .filter(|(_, &count)| count > 0)
            .map(|(op, &count)| (op.name, count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        counts
    }

    pub fn reset_instruction_counts(&mut self) {
        self.op_counts.iter_mut().for_each(|count| *count = 0);
    }

    // ===== Instruction cache =====

    pub(crate) fn request_cache_invalidation(&mut self) {
        self.cache_invalidation_requested = true;
    }

    /// Whether guest code asked for an instruction cache flush since the
    /// last call
    pub fn take_cache_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.cache_invalidation_requested)
    }

    // ===== Execution =====

    /// Resolve and run one decoded instruction; returns its cycle cost
    fn execute(&mut self, state: &mut PowerPcState, inst: Instruction) -> u32 {
        let info = tables::resolve(inst);
        if self.count_instructions {
            self.op_counts[info.id] += 1;
        }

        if info.uses_fpu() && !state.msr().contains(Msr::FP) {
            state.raise(Exceptions::FPU_UNAVAILABLE);
        } else {
            (info.handler)(self, state, inst);
        }

        if info.ends_block() {
            self.end_block = true;
        }
        info.num_cycles
    }

    /// Fetch and execute the instruction at `pc` without servicing
    /// exceptions. Returns the cycles consumed.
    pub fn single_step_inner(&mut self, state: &mut PowerPcState) -> Result<u32, CpuError> {
        let pc = state.pc;
        state.npc = pc.wrapping_add(4);

        let word = match self.memory.read_instruction(pc) {
            Ok(word) => word,
            Err(err) => {
                exception_debug!("Instruction fetch fault at 0x{:08x}: {}", pc, err);
                state.npc = pc;
                state.raise(Exceptions::ISI);
                self.end_block = true;
                return Ok(1);
            }
        };

        let inst = Instruction(word);
        cpu_trace!("0x{:08x}: {:08x} {}", pc, word, tables::instruction_name(inst));

        let cycles = self.execute(state, inst);
        self.instruction_count += 1;

        if let Some(err) = self.unknown_error.take() {
            self.end_block = true;
            state.npc = pc;
            return Err(err);
        }

        if state.has_synchronous_exception() {
            self.end_block = true;
        } else {
            state.pc = state.npc;
        }

        Ok(cycles.max(1))
    }

    /// Merge external interrupts and service at most one exception
    fn service_exceptions(&mut self, state: &mut PowerPcState) {
        if let Some(line) = &self.interrupts {
            line.deliver(state);
        }
        exceptions::check_exceptions(state);
    }

    // ===== Memory access =====

    #[inline]
    fn access<T>(
        &self,
        state: &mut PowerPcState,
        addr: u32,
        is_store: bool,
        result: Result<T, MemoryError>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                exception_debug!("Data fault at 0x{:08x} (pc 0x{:08x}): {}", addr, state.pc, err);
                state.raise_dsi(addr, is_store);
                None
            }
        }
    }

    pub(crate) fn read_u8(&self, state: &mut PowerPcState, addr: u32) -> Option<u8> {
        let result = self.memory.read_u8(addr);
        self.access(state, addr, false, result)
    }

    pub(crate) fn read_u16(&self, state: &mut PowerPcState, addr: u32) -> Option<u16> {
        let result = self.memory.read_u16(addr);
        self.access(state, addr, false, result)
    }

    pub(crate) fn read_u32(&self, state: &mut PowerPcState, addr: u32) -> Option<u32> {
        let result = self.memory.read_u32(addr);
        self.access(state, addr, false, result)
    }

    pub(crate) fn read_u64(&self, state: &mut PowerPcState, addr: u32) -> Option<u64> {
        let result = self.memory.read_u64(addr);
        self.access(state, addr, false, result)
    }

    pub(crate) fn write_u8(&self, state: &mut PowerPcState, addr: u32, value: u8) -> Option<()> {
        let result = self.memory.write_u8(addr, value);
        self.access(state, addr, true, result)
    }

    pub(crate) fn write_u16(&self, state: &mut PowerPcState, addr: u32, value: u16) -> Option<()> {
        let result = self.memory.write_u16(addr, value);
        self.access(state, addr, true, result)
    }

    pub(crate) fn write_u32(&self, state: &mut PowerPcState, addr: u32, value: u32) -> Option<()> {
        let result = self.memory.write_u32(addr, value);
        self.access(state, addr, true, result)
    }

    pub(crate) fn write_u64(&self, state: &mut PowerPcState, addr: u32, value: u64) -> Option<()> {
        let result = self.memory.write_u64(addr, value);
        self.access(state, addr, true, result)
    }
}

impl CpuBackend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn init(&mut self) -> Result<(), CpuError> {
        tables::init();
        self.end_block = false;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.end_block = false;
        self.unknown_error = None;
    }

    fn single_step(&mut self, state: &mut PowerPcState) -> Result<(), CpuError> {
        self.step_and_service(state).map(|_| ())
    }

    fn run(&mut self, state: &mut PowerPcState) -> Result<RunExit, CpuError> {
        while state.downcount > 0 {
            if self.halt_requested() {
                return Ok(RunExit::Halted);
            }
            self.end_block = false;
            while !self.end_block && state.downcount > 0 {
                let cycles = self.single_step_inner(state)?;
                state.downcount -= cycles as i32;
            }
            self.service_exceptions(state);
        }
        Ok(RunExit::BudgetExhausted)
    }

    fn invalidate_translation_cache(&mut self) {
        // Nothing is cached between instructions.
        self.cache_invalidation_requested = false;
    }
}

/// Handler for every undefined opcode
pub fn unknown_instruction(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    tracing::error!(
        "Unknown instruction 0x{:08x} at 0x{:08x} (primary opcode {})",
        inst.hex(),
        state.pc,
        inst.opcd()
    );
    if interp.strict_unknown {
        interp.unknown_error = Some(CpuError::UnknownInstruction {
            addr: state.pc,
            opcode: inst.hex(),
        });
    } else {
        state.raise_program(program_cause::ILLEGAL_INSTRUCTION);
    }
}

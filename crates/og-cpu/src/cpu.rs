//! CPU mode controller
//!
//! [`Cpu`] owns the processor state and hands it to the active execution
//! backend. The interpreter is always present; a native backend may be
//! installed on top of it. When native mode is selected without one, every
//! call falls back to the interpreter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use og_core::config::{CoreMode, CpuConfig};
use og_core::error::CpuError;
use og_memory::Memory;

use crate::backend::{CpuBackend, RunExit};
use crate::exceptions::{self, InterruptLine};
use crate::interpreter::Interpreter;
use crate::state::PowerPcState;

/// Gekko CPU
pub struct Cpu {
    state: Box<PowerPcState>,
    interpreter: Interpreter,
    native: Option<Box<dyn CpuBackend>>,
    mode: CoreMode,
    interrupts: InterruptLine,
    halt: Arc<AtomicBool>,
    /// Run instruction by instruction and honour breakpoints
    debugging: bool,
}

impl Cpu {
    /// Create a CPU over `memory` configured from the `[cpu]` section
    pub fn new(memory: Arc<dyn Memory>, config: &CpuConfig) -> Self {
        let interrupts = InterruptLine::new();
        let mut interpreter = Interpreter::from_config(memory, config);
        interpreter.attach_interrupt_line(interrupts.clone());
        let halt = Arc::new(AtomicBool::new(false));
        interpreter.attach_halt_flag(Arc::clone(&halt));

        Self {
            state: Box::new(PowerPcState::new()),
            interpreter,
            native: None,
            mode: config.core_mode,
            interrupts,
            halt,
            debugging: config.enable_debugging,
        }
    }

    pub fn state(&self) -> &PowerPcState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PowerPcState {
        &mut self.state
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Line for raising external interrupts from other threads
    pub fn interrupt_line(&self) -> InterruptLine {
        self.interrupts.clone()
    }

    /// Flag that stops a run at the next batch boundary when set
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }

    /// Ask the run loop to return [`RunExit::Halted`]
    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::Release);
    }

    pub fn set_debugging(&mut self, enabled: bool) {
        self.debugging = enabled;
    }

    pub fn is_debugging(&self) -> bool {
        self.debugging
    }

    /// Install a native backend, replacing any previous one
    pub fn install_native(&mut self, backend: Box<dyn CpuBackend>) {
        if let Some(mut old) = self.native.replace(backend) {
            old.shutdown();
        }
    }

    /// Initialize the installed native backend
    pub fn init_native(&mut self) -> Result<(), CpuError> {
        match self.native.as_mut() {
            Some(backend) => backend.init(),
            None => Err(CpuError::NoNativeBackend),
        }
    }

    pub fn mode(&self) -> CoreMode {
        self.mode
    }

    /// Switch execution mode
    ///
    /// Leaving native mode drops its translated code so that a later switch
    /// back cannot run stale blocks.
    pub fn set_mode(&mut self, mode: CoreMode) {
        if mode == self.mode {
            return;
        }
        if self.mode == CoreMode::Native {
            if let Some(native) = self.native.as_mut() {
                native.invalidate_translation_cache();
            }
        }
        tracing::info!("CPU mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }

    /// Name of the backend that the next run call will use
    pub fn backend_name(&self) -> &'static str {
        match (&self.native, self.mode) {
            (Some(native), CoreMode::Native) => native.name(),
            _ => self.interpreter.name(),
        }
    }

    fn native_active(&self) -> bool {
        self.native.is_some() && self.mode == CoreMode::Native
    }

    /// The active backend together with the state it runs on
    fn active(&mut self) -> (&mut dyn CpuBackend, &mut PowerPcState) {
        let backend: &mut dyn CpuBackend = match (self.native.as_mut(), self.mode) {
            (Some(native), CoreMode::Native) => native.as_mut(),
            _ => &mut self.interpreter,
        };
        (backend, &mut *self.state)
    }

    /// Drop native translations, e.g. after guest code was overwritten
    pub fn invalidate_translation_cache(&mut self) {
        if let Some(native) = self.native.as_mut() {
            native.invalidate_translation_cache();
        }
    }

    /// Forward cache flushes requested by guest code to the native backend
    fn sync_translation_cache(&mut self) {
        if self.interpreter.take_cache_invalidation() {
            self.invalidate_translation_cache();
        }
    }

    /// Service pending interrupts after native code returned
    ///
    /// The interpreter does this itself at every batch boundary.
    fn drain_exceptions(&mut self) {
        self.interrupts.deliver(&mut self.state);
        exceptions::check_exceptions(&mut self.state);
    }

    /// Execute exactly one instruction with the active backend
    pub fn single_step(&mut self) -> Result<(), CpuError> {
        let native = self.native_active();
        let (backend, state) = self.active();
        let result = backend.single_step(state);
        if native && result.is_ok() {
            self.drain_exceptions();
        }
        self.sync_translation_cache();
        result
    }

    /// Run until the cycle budget in `downcount` is exhausted, a breakpoint
    /// matches or a halt is requested
    pub fn run(&mut self) -> Result<RunExit, CpuError> {
        if self.halt.swap(false, Ordering::AcqRel) {
            return Ok(RunExit::Halted);
        }

        let result = if self.debugging {
            self.run_debug()
        } else if self.native_active() {
            self.run_native()
        } else {
            self.interpreter.run(&mut self.state)
        };

        self.sync_translation_cache();
        result
    }

    /// Native batch followed by an exception pass
    fn run_native(&mut self) -> Result<RunExit, CpuError> {
        let (backend, state) = self.active();
        let exit = backend.run(state)?;
        self.drain_exceptions();
        if exit == RunExit::BudgetExhausted && self.halt.swap(false, Ordering::AcqRel) {
            return Ok(RunExit::Halted);
        }
        Ok(exit)
    }

    /// Per-instruction loop with breakpoint checks
    fn run_debug(&mut self) -> Result<RunExit, CpuError> {
        while self.state.downcount > 0 {
            if self.halt.swap(false, Ordering::AcqRel) {
                return Ok(RunExit::Halted);
            }
            match self.interpreter.step(&mut self.state) {
                Ok(cycles) => self.state.downcount -= cycles as i32,
                Err(CpuError::Breakpoint { addr }) => {
                    tracing::info!("Breakpoint hit at 0x{:08x}", addr);
                    return Ok(RunExit::Breakpoint { addr });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(RunExit::BudgetExhausted)
    }

    /// Reset the processor to its power-on state
    pub fn reset(&mut self) {
        self.state.reset();
        self.invalidate_translation_cache();
    }

    pub fn save_state(&self) -> Vec<u8> {
        self.state.save_state()
    }

    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), CpuError> {
        self.state.load_state(bytes)?;
        self.invalidate_translation_cache();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::{vector, Exceptions};
    use crate::interpreter::BreakpointType;
    use og_memory::FlatMemory;
    use std::sync::atomic::AtomicUsize;

    const BASE: u32 = 0x8000_3000;

    /// Backend that records how it was driven
    #[derive(Default)]
    struct RecordingBackend {
        runs: Arc<AtomicUsize>,
        invalidations: Arc<AtomicUsize>,
    }

    impl CpuBackend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn init(&mut self) -> Result<(), CpuError> {
            Ok(())
        }

        fn shutdown(&mut self) {}

        fn single_step(&mut self, state: &mut PowerPcState) -> Result<(), CpuError> {
            state.pc = state.pc.wrapping_add(4);
            Ok(())
        }

        fn run(&mut self, state: &mut PowerPcState) -> Result<RunExit, CpuError> {
            self.runs.fetch_add(1, Ordering::Relaxed);
            state.downcount = 0;
            Ok(RunExit::BudgetExhausted)
        }

        fn invalidate_translation_cache(&mut self) {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn create_cpu(program: &[u32]) -> (Cpu, Arc<FlatMemory>) {
        let memory = FlatMemory::new();
        for (i, word) in program.iter().enumerate() {
            memory.write_u32(BASE + 4 * i as u32, *word).unwrap();
        }
        let mut cpu = Cpu::new(memory.clone(), &CpuConfig::default());
        cpu.state_mut().pc = BASE;
        (cpu, memory)
    }

    #[test]
    fn test_native_falls_back_to_interpreter() {
        // li r3, 7
        let (mut cpu, _memory) = create_cpu(&[0x3860_0007]);
        cpu.set_mode(CoreMode::Native);
        assert_eq!(cpu.init_native(), Err(CpuError::NoNativeBackend));
        assert_eq!(cpu.backend_name(), "interpreter");

        cpu.single_step().unwrap();
        assert_eq!(cpu.state().gpr[3], 7);
    }

    #[test]
    fn test_native_backend_selected() {
        let (mut cpu, _memory) = create_cpu(&[]);
        let backend = RecordingBackend::default();
        let runs = Arc::clone(&backend.runs);
        let invalidations = Arc::clone(&backend.invalidations);
        cpu.install_native(Box::new(backend));
        assert!(cpu.init_native().is_ok());

        cpu.set_mode(CoreMode::Native);
        assert_eq!(cpu.backend_name(), "recording");
        cpu.state_mut().downcount = 100;
        assert_eq!(cpu.run().unwrap(), RunExit::BudgetExhausted);
        assert_eq!(runs.load(Ordering::Relaxed), 1);

        cpu.set_mode(CoreMode::Interpreter);
        assert_eq!(invalidations.load(Ordering::Relaxed), 1);
        assert_eq!(cpu.backend_name(), "interpreter");
    }

    #[test]
    fn test_guest_cache_flush_reaches_native() {
        // icbi 0, r3
        let (mut cpu, _memory) = create_cpu(&[0x7C00_1FAC]);
        let backend = RecordingBackend::default();
        let invalidations = Arc::clone(&backend.invalidations);
        cpu.install_native(Box::new(backend));

        cpu.single_step().unwrap();
        assert_eq!(invalidations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_halt_request() {
        let (mut cpu, _memory) = create_cpu(&[0x4800_0000]);
        cpu.state_mut().downcount = 10;
        cpu.request_halt();
        assert_eq!(cpu.run().unwrap(), RunExit::Halted);
        assert_eq!(cpu.state().pc, BASE);

        // The request is consumed
        assert_eq!(cpu.run().unwrap(), RunExit::BudgetExhausted);
    }

    #[test]
    fn test_debug_run_stops_at_breakpoint() {
        // li r3, 1; li r4, 2; li r5, 3
        let (mut cpu, _memory) = create_cpu(&[0x3860_0001, 0x3880_0002, 0x38A0_0003]);
        cpu.set_debugging(true);
        cpu.interpreter().add_breakpoint(BASE + 8, BreakpointType::Unconditional);
        cpu.state_mut().downcount = 100;

        assert_eq!(cpu.run().unwrap(), RunExit::Breakpoint { addr: BASE + 8 });
        assert_eq!(cpu.state().gpr[4], 2);
        assert_eq!(cpu.state().gpr[5], 0);

        cpu.state_mut().downcount = 1;
        assert_eq!(cpu.run().unwrap(), RunExit::BudgetExhausted);
        assert_eq!(cpu.state().gpr[5], 3);
    }

    #[test]
    fn test_strict_unknown_aborts_run() {
        let memory = FlatMemory::new();
        let config = CpuConfig {
            strict_unknown_instructions: true,
            ..CpuConfig::default()
        };
        let mut cpu = Cpu::new(memory, &config);
        cpu.state_mut().pc = BASE;
        cpu.state_mut().downcount = 10;

        assert_eq!(
            cpu.run(),
            Err(CpuError::UnknownInstruction { addr: BASE, opcode: 0 })
        );
    }

    #[test]
    fn test_interrupt_line_delivery() {
        // nop
        let (mut cpu, _memory) = create_cpu(&[0x6000_0000]);
        cpu.state_mut().msr = crate::state::Msr::EE.bits();
        cpu.interrupt_line().raise(Exceptions::EXTERNAL_INT);

        cpu.single_step().unwrap();
        assert_eq!(cpu.state().pc, vector::EXTERNAL_INT);
    }

    #[test]
    fn test_native_run_takes_external_interrupt() {
        let (mut cpu, _memory) = create_cpu(&[]);
        let backend = RecordingBackend::default();
        let runs = Arc::clone(&backend.runs);
        cpu.install_native(Box::new(backend));
        cpu.set_mode(CoreMode::Native);
        cpu.state_mut().msr = crate::state::Msr::EE.bits();

        cpu.state_mut().downcount = 100;
        assert_eq!(cpu.run().unwrap(), RunExit::BudgetExhausted);
        assert_eq!(cpu.state().pc, BASE);

        cpu.interrupt_line().raise(Exceptions::EXTERNAL_INT);
        for _ in 0..3 {
            cpu.state_mut().downcount = 100;
            assert_eq!(cpu.run().unwrap(), RunExit::BudgetExhausted);
        }
        assert_eq!(runs.load(Ordering::Relaxed), 4);
        assert_eq!(cpu.state().pc, vector::EXTERNAL_INT);
        assert_eq!(cpu.state().spr[crate::state::spr::SRR0], BASE);
        assert!(cpu.state().pending().is_empty());
    }

    #[test]
    fn test_native_single_step_takes_external_interrupt() {
        let (mut cpu, _memory) = create_cpu(&[]);
        cpu.install_native(Box::new(RecordingBackend::default()));
        cpu.set_mode(CoreMode::Native);
        cpu.state_mut().msr = crate::state::Msr::EE.bits();
        cpu.interrupt_line().raise(Exceptions::EXTERNAL_INT);

        cpu.single_step().unwrap();
        assert_eq!(cpu.state().pc, vector::EXTERNAL_INT);
        assert_eq!(cpu.state().spr[crate::state::spr::SRR0], BASE + 4);
    }

    #[test]
    fn test_debug_run_charges_instruction_cycles() {
        // mulli r3, r3, 2 (x2); li r5, 1
        let (mut cpu, _memory) = create_cpu(&[0x1C63_0002, 0x1C63_0002, 0x38A0_0001]);
        cpu.set_debugging(true);
        cpu.state_mut().gpr[3] = 1;
        cpu.state_mut().downcount = 6;

        assert_eq!(cpu.run().unwrap(), RunExit::BudgetExhausted);
        assert_eq!(cpu.state().gpr[3], 4);
        assert_eq!(cpu.state().gpr[5], 0);
        assert_eq!(cpu.state().pc, BASE + 8);
        assert_eq!(cpu.state().downcount, 0);
    }

    #[test]
    fn test_save_load_state() {
        let (mut cpu, _memory) = create_cpu(&[0x3860_0007]);
        cpu.single_step().unwrap();
        let saved = cpu.save_state();

        cpu.reset();
        assert_eq!(cpu.state().gpr[3], 0);

        cpu.load_state(&saved).unwrap();
        assert_eq!(cpu.state().gpr[3], 7);
        assert_eq!(cpu.state().pc, BASE + 4);

        assert!(matches!(
            cpu.load_state(&saved[..16]),
            Err(CpuError::SaveState { .. })
        ));
    }
}

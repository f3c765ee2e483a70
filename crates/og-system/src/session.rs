//! Emulation session
//!
//! A [`Session`] owns guest memory, the CPU and the system clock. It is the
//! only place that feeds the CPU new cycle budgets.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use og_core::config::Config;
use og_core::error::Result;
use og_cpu::{CoreTiming, Cpu, RunExit};
use og_memory::FlatMemory;

use crate::timing::FixedTiming;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing is executing
    Stopped,
    /// Slices may be run
    Running,
    /// Stopped at a breakpoint or halt request, resumable
    Paused,
}

/// Top-level emulation session
pub struct Session {
    /// Current session state
    state: SessionState,
    /// Configuration
    config: Config,
    memory: Arc<FlatMemory>,
    cpu: Cpu,
    timing: Box<dyn CoreTiming>,
    /// Completed run calls
    slices_run: u64,
}

impl Session {
    /// Create a session with GameCube memory
    pub fn new(config: Config) -> Self {
        Self::with_memory(config, FlatMemory::new())
    }

    /// Create a session over an existing memory map
    pub fn with_memory(config: Config, memory: Arc<FlatMemory>) -> Self {
        let cpu = Cpu::new(memory.clone(), &config.cpu);
        let timing = Box::new(FixedTiming::new(config.cpu.cycles_per_slice));
        tracing::info!(
            "Session created ({:?} mode, {} cycles per slice)",
            config.cpu.core_mode,
            config.cpu.cycles_per_slice
        );

        Self {
            state: SessionState::Stopped,
            config,
            memory,
            cpu,
            timing,
            slices_run: 0,
        }
    }

    /// Replace the system clock
    pub fn set_timing(&mut self, timing: Box<dyn CoreTiming>) {
        self.timing = timing;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &Arc<FlatMemory> {
        &self.memory
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn slices_run(&self) -> u64 {
        self.slices_run
    }

    /// Flag another thread can set to stop the current slice
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        self.cpu.halt_handle()
    }

    /// Copy a raw big-endian image into guest memory
    pub fn load_image(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        self.memory.write_bytes(addr, bytes)?;
        self.cpu.invalidate_translation_cache();
        tracing::info!("Loaded {} bytes at 0x{:08x}", bytes.len(), addr);
        Ok(())
    }

    /// Point the CPU at `entry`
    pub fn set_entry_point(&mut self, entry: u32) {
        self.cpu.state_mut().pc = entry;
    }

    /// Start the session
    pub fn start(&mut self) -> Result<()> {
        self.state = SessionState::Running;
        tracing::info!("Session started at 0x{:08x}", self.cpu.state().pc);
        Ok(())
    }

    /// Pause the session
    pub fn pause(&mut self) -> Result<()> {
        if self.state == SessionState::Running {
            self.state = SessionState::Paused;
            tracing::info!("Session paused at 0x{:08x}", self.cpu.state().pc);
        }
        Ok(())
    }

    /// Resume the session
    pub fn resume(&mut self) -> Result<()> {
        if self.state == SessionState::Paused {
            self.state = SessionState::Running;
            tracing::info!("Session resumed");
        }
        Ok(())
    }

    /// Stop the session
    pub fn stop(&mut self) -> Result<()> {
        self.state = SessionState::Stopped;
        tracing::info!("Session stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == SessionState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SessionState::Stopped
    }

    /// Run up to `count` slices
    ///
    /// Returns early when a breakpoint or halt pauses the session. A CPU
    /// error stops the session and is passed to the caller. Does nothing
    /// unless the session is running.
    pub fn run_slices(&mut self, count: u64) -> Result<RunExit> {
        let mut exit = RunExit::BudgetExhausted;
        for _ in 0..count {
            if !self.is_running() {
                break;
            }

            if self.cpu.state().downcount <= 0 {
                self.timing.advance(self.cpu.state_mut());
            }

            exit = match self.cpu.run() {
                Ok(exit) => exit,
                Err(err) => {
                    tracing::error!("CPU stopped at 0x{:08x}: {}", self.cpu.state().pc, err);
                    self.stop()?;
                    return Err(err.into());
                }
            };
            self.slices_run += 1;

            match exit {
                RunExit::BudgetExhausted => {}
                RunExit::Breakpoint { .. } | RunExit::Halted => {
                    self.pause()?;
                    break;
                }
            }
        }
        Ok(exit)
    }

    /// Reset the CPU and stop
    pub fn reset(&mut self) -> Result<()> {
        self.cpu.reset();
        self.stop()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use og_core::error::{CpuError, EmulatorError};
    use og_cpu::state::spr;
    use og_cpu::BreakpointType;

    const ENTRY: u32 = 0x8000_3100;

    fn words(code: &[u32]) -> Vec<u8> {
        code.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    fn session_with(code: &[u32], config: Config) -> Session {
        let mut session = Session::new(config);
        session.load_image(ENTRY, &words(code)).unwrap();
        session.set_entry_point(ENTRY);
        session
    }

    #[test]
    fn test_session_state_transitions() {
        let mut session = Session::default();
        assert!(session.is_stopped());

        session.start().unwrap();
        assert!(session.is_running());

        session.pause().unwrap();
        assert!(session.is_paused());

        session.resume().unwrap();
        assert!(session.is_running());

        session.stop().unwrap();
        assert!(session.is_stopped());
    }

    #[test]
    fn test_run_slices_requires_running() {
        let mut session = session_with(&[0x3860_0001], Config::default());
        assert_eq!(session.run_slices(4).unwrap(), RunExit::BudgetExhausted);
        assert_eq!(session.slices_run(), 0);
        assert_eq!(session.cpu().state().gpr[3], 0);
    }

    #[test]
    fn test_run_slices_advances_clock() {
        let mut config = Config::default();
        config.cpu.cycles_per_slice = 1200;
        let mut session = session_with(
            &[
                0x3860_0000, // li r3, 0
                0x3863_0001, // addi r3, r3, 1
                0x4BFF_FFFC, // b -4
            ],
            config,
        );
        session.start().unwrap();

        assert_eq!(session.run_slices(3).unwrap(), RunExit::BudgetExhausted);
        assert_eq!(session.slices_run(), 3);
        assert!(session.cpu().state().gpr[3] > 0);

        // Two slices have been charged to the clock
        assert_eq!(session.cpu().state().time_base(), 200);
    }

    #[test]
    fn test_breakpoint_pauses_session() {
        let mut config = Config::default();
        config.cpu.enable_debugging = true;
        let mut session = session_with(&[0x3860_0001, 0x3880_0002, 0x4800_0000], config);
        session
            .cpu()
            .interpreter()
            .add_breakpoint(ENTRY + 4, BreakpointType::Unconditional);
        session.start().unwrap();

        let exit = session.run_slices(10).unwrap();
        assert_eq!(exit, RunExit::Breakpoint { addr: ENTRY + 4 });
        assert!(session.is_paused());
        assert_eq!(session.cpu().state().gpr[3], 1);

        session.resume().unwrap();
        session.run_slices(1).unwrap();
        assert_eq!(session.cpu().state().gpr[4], 2);
    }

    #[test]
    fn test_halt_pauses_session() {
        let mut session = session_with(&[0x4800_0000], Config::default());
        session.start().unwrap();
        session.cpu().request_halt();

        assert_eq!(session.run_slices(5).unwrap(), RunExit::Halted);
        assert!(session.is_paused());
    }

    #[test]
    fn test_cpu_error_stops_session() {
        let mut config = Config::default();
        config.cpu.strict_unknown_instructions = true;
        let mut session = session_with(&[0x3860_0001, 0x0000_0000], config);
        session.start().unwrap();

        let err = session.run_slices(1).unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::Cpu(CpuError::UnknownInstruction { addr, .. }) if addr == ENTRY + 4
        ));
        assert!(session.is_stopped());
    }

    #[test]
    fn test_decrementer_reaches_guest() {
        let mut config = Config::default();
        config.cpu.cycles_per_slice = 120;
        let mut session = session_with(&[0x4800_0000], config);
        // Decrementer handler: li r3, 0x99; b .
        session
            .load_image(0x0000_0900, &words(&[0x3860_0099, 0x4800_0000]))
            .unwrap();
        session.cpu_mut().state_mut().msr = og_cpu::state::Msr::EE.bits();
        session.cpu_mut().state_mut().spr[spr::DEC] = 5;
        session.start().unwrap();

        session.run_slices(3).unwrap();
        assert_eq!(session.cpu().state().gpr[3], 0x99);
        assert_eq!(session.cpu().state().spr[spr::SRR0], ENTRY);
    }
}

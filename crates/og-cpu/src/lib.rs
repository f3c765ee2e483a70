//! Gekko (GameCube/Wii Broadway) PowerPC CPU core for oxidized-gekko
//!
//! This crate implements the 32-bit PowerPC 750CL variant used by the
//! GameCube and Wii: integer and floating-point units, the paired-single
//! SIMD extension with quantized loads and stores, and the exception model.
//! Execution goes through [`Interpreter`]; [`Cpu`] selects between it and an
//! optional native backend.

pub mod backend;
pub mod cpu;
pub mod decoder;
pub mod exceptions;
pub mod fpscr;
pub mod instructions;
pub mod interpreter;
pub mod numeric;
pub mod ps;
pub mod state;
pub mod tables;

pub use backend::{CoreTiming, CpuBackend, RunExit};
pub use cpu::Cpu;
pub use decoder::Instruction;
pub use exceptions::{Exceptions, InterruptLine};
pub use interpreter::{Breakpoint, BreakpointCondition, BreakpointType, Interpreter};
pub use ps::PairedSingle;
pub use state::PowerPcState;

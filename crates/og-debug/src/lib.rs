//! Debugging tools for oxidized-gekko
//!
//! This crate provides:
//! - a Gekko disassembler driven by the interpreter's opcode descriptors
//! - an opcode profiler over the interpreter's per-opcode run counters

pub mod disassembler;
pub mod profiler;

pub use disassembler::{disassemble, disassemble_range, DisassembledInstruction};
pub use profiler::{OpcodeProfile, Profiler};

//! Error types for oxidized-gekko

use thiserror::Error;

/// Main emulator error type
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("CPU error: {0}")]
    Cpu(#[from] CpuError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the memory subsystem
///
/// These never reach the host from inside an instruction: the interpreter
/// turns them into data or fetch faults for the guest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Unmapped address: 0x{addr:08x}")]
    Unmapped { addr: u32 },

    #[error("Access of {size} bytes at 0x{addr:08x} crosses the end of a region")]
    OutOfRange { addr: u32, size: u32 },

    #[error("Write to read-only region at 0x{addr:08x}")]
    ReadOnly { addr: u32 },

    #[error("Instruction fetch from non-executable region at 0x{addr:08x}")]
    NoExecute { addr: u32 },
}

/// Host-visible CPU errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("Unknown instruction 0x{opcode:08x} at 0x{addr:08x}")]
    UnknownInstruction { addr: u32, opcode: u32 },

    #[error("Breakpoint hit at 0x{addr:08x}")]
    Breakpoint { addr: u32 },

    #[error("Save state size mismatch: expected {expected} bytes, got {actual}")]
    SaveState { expected: usize, actual: usize },

    #[error("No native backend installed")]
    NoNativeBackend,

    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, EmulatorError>;

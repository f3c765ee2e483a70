//! Logging for oxidized-gekko
//!
//! Everything goes through `tracing`. The CPU core logs on two targets:
//! [`CPU_TARGET`] for per-instruction traces and breakpoint changes, and
//! [`EXCEPTION_TARGET`] for memory faults and exception entry. `RUST_LOG`
//! directives such as `exceptions=debug` are merged with the level from the
//! `[debug]` config section.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogLevel};

/// Target of instruction traces
pub const CPU_TARGET: &str = "cpu";
/// Target of fault and exception entry messages
pub const EXCEPTION_TARGET: &str = "exceptions";

/// Most verbose level enabled by `level`, `None` when logging is off
pub fn max_level(level: LogLevel) -> Option<Level> {
    match level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    }
}

/// Install the global subscriber described by `[debug]`
///
/// Does nothing if a subscriber is already installed.
pub fn init(config: &Config) {
    let Some(level) = max_level(config.debug.log_level) else {
        return;
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let console = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let mut file_error = None;
    let file_layer = if config.debug.log_to_file {
        match std::fs::File::create(&config.debug.log_path) {
            Ok(file) => Some(fmt::layer().with_writer(file).with_ansi(false)),
            Err(err) => {
                file_error = Some(err);
                None
            }
        }
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init();

    if let Some(err) = file_error {
        tracing::warn!(
            "Cannot write log file {}: {}",
            config.debug.log_path.display(),
            err
        );
    }
}

/// Console logging at info level, for tests and tools without a config
pub fn init_default() {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// Per-instruction trace on [`CPU_TARGET`]
#[macro_export]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: $crate::logging::CPU_TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! cpu_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: $crate::logging::CPU_TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! exception_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: $crate::logging::EXCEPTION_TARGET, $($arg)*)
    };
}

/// Fault or exception entry on [`EXCEPTION_TARGET`]
#[macro_export]
macro_rules! exception_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: $crate::logging::EXCEPTION_TARGET, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_level() {
        assert_eq!(max_level(LogLevel::Off), None);
        assert_eq!(max_level(LogLevel::Warn), Some(Level::WARN));
        assert_eq!(max_level(LogLevel::Trace), Some(Level::TRACE));
        assert!(max_level(LogLevel::Debug) > max_level(LogLevel::Info));
    }

    #[test]
    fn test_repeated_init() {
        init_default();
        let mut config = Config::default();
        config.debug.log_level = LogLevel::Trace;
        init(&config);
        init_default();

        cpu_trace!("0x{:08x}: {}", 0x8000_3000u32, "addi");
        exception_debug!("Data fault at 0x{:08x}", 0u32);
    }
}

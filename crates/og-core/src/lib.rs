//! Core infrastructure for oxidized-gekko
//!
//! Shared error types, configuration and logging used by every other crate
//! in the workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{EmulatorError, Result};

//! Configuration management for oxidized-gekko

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cpu: CpuConfig,
    pub debug: DebugConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when no file exists yet
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Path of the configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("oxidized-gekko");
        path.push("config.toml");
        Ok(path)
    }
}

/// Which execution engine drives the CPU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreMode {
    #[default]
    Interpreter,
    /// Native code generating backend, falls back to the interpreter when
    /// none is installed
    Native,
}

/// CPU configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub core_mode: CoreMode,
    /// Check breakpoints before every instruction
    pub enable_debugging: bool,
    /// Abort the run loop on unknown opcodes instead of raising a program
    /// exception in the guest
    pub strict_unknown_instructions: bool,
    /// Cycle budget handed to the CPU per scheduler slice
    pub cycles_per_slice: i32,
    /// Keep per-opcode execution counters
    pub count_instructions: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            core_mode: CoreMode::Interpreter,
            enable_debugging: false,
            strict_unknown_instructions: false,
            cycles_per_slice: 20_000,
            count_instructions: false,
        }
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_file: false,
            log_path: PathBuf::from("oxidized-gekko.log"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cpu.core_mode, CoreMode::Interpreter);
        assert!(!config.cpu.strict_unknown_instructions);
        assert!(config.cpu.cycles_per_slice > 0);
        assert_eq!(config.debug.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [cpu]
            core_mode = "Native"
            enable_debugging = true
            "#,
        )
        .unwrap();
        assert_eq!(config.cpu.core_mode, CoreMode::Native);
        assert!(config.cpu.enable_debugging);
        assert_eq!(config.cpu.cycles_per_slice, 20_000);
        assert!(!config.debug.log_to_file);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = Config::default();
        config.cpu.strict_unknown_instructions = true;
        config.debug.log_level = LogLevel::Trace;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert!(parsed.cpu.strict_unknown_instructions);
        assert_eq!(parsed.debug.log_level, LogLevel::Trace);
    }
}

//! Machine configuration.
//!
//! Loaded from JSON; every field has a default so a config file only needs
//! to name what it changes:
//!
//! ```json
//! { "ram_size": 16, "ram_read_cycles": 3, "unsupported_mode": "immediate" }
//! ```

use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::bus::{RAM_ADDRESS_SPACE, ROM_ADDRESS_SPACE};

mod defaults {
    /// Full 12-bit ROM space.
    pub const ROM_SIZE: usize = 4096;
    /// Full 8-bit RAM space.
    pub const RAM_SIZE: usize = 256;
    /// Bus cycles a RAM read is held before the byte is sampled.
    pub const RAM_READ_CYCLES: u8 = 3;
    /// Run limit when none is given.
    pub const MAX_CYCLES: u64 = 10_000;
}

/// What to do with an instruction whose mode field is not assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedModePolicy {
    /// Resolve the operand as immediate but leave every register alone.
    #[default]
    Nop,
    /// Resolve the operand as immediate and execute the opcode with it.
    Immediate,
}

/// Parameters of one simulated machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// ROM nibbles backing the 12-bit fetch space.
    pub rom_size: usize,
    /// RAM bytes backing the 8-bit data space.
    pub ram_size: usize,
    /// Bus cycles spent on each zero-indexed operand read.
    pub ram_read_cycles: u8,
    /// Default clock limit for `run`.
    pub max_cycles: u64,
    pub unsupported_mode: UnsupportedModePolicy,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            rom_size: defaults::ROM_SIZE,
            ram_size: defaults::RAM_SIZE,
            ram_read_cycles: defaults::RAM_READ_CYCLES,
            max_cycles: defaults::MAX_CYCLES,
            unsupported_mode: UnsupportedModePolicy::default(),
        }
    }
}

impl MachineConfig {
    /// Read and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against the architectural limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rom_size > ROM_ADDRESS_SPACE {
            return Err(ConfigError::Invalid(format!(
                "rom_size {} exceeds the {}-nibble address space",
                self.rom_size, ROM_ADDRESS_SPACE
            )));
        }
        if self.ram_size > RAM_ADDRESS_SPACE {
            return Err(ConfigError::Invalid(format!(
                "ram_size {} exceeds the {}-byte address space",
                self.ram_size, RAM_ADDRESS_SPACE
            )));
        }
        if self.ram_read_cycles == 0 {
            return Err(ConfigError::Invalid("ram_read_cycles must be at least 1".into()));
        }
        Ok(())
    }
}

/// Errors that can occur while loading a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

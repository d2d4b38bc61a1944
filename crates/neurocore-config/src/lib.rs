// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore Configuration
//!
//! Configuration of the host kernel that runs neurocore role images: machine resources,
//! logging and the parameters of a simulation run.
//!
//! Loading is three-tier:
//! 1. `neurocore.toml` (searched for, or given explicitly)
//! 2. `NEUROCORE_*` environment variables
//! 3. CLI overrides passed as a key/value map
//!
//! The result is validated before it is returned.
//!
//! ```rust,no_run
//! use neurocore_config::load_config;
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("SDRAM: {} bytes", config.machine.sdram_bytes);
//! ```
//!
//! Role images are not configured here; they stay the byte-exact format the roles parse.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    load_config_or_default, CONFIG_FILE_NAME,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

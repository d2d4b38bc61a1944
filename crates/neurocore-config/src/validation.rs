// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks value ranges and cross-field consistency. All problems are collected and reported
//! together.

use crate::{ConfigError, ConfigResult, NeurocoreConfig};

/// Largest population a single core can hold; one input slab word per neuron
const MAX_NEURONS_PER_CORE: u32 = 1024;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    MustBePositive { field: String },
    NotWordAligned { field: String, value: u64 },
    OutOfRange { field: String, value: u64, max: u64 },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MustBePositive { field } => write!(f, "{} must be greater than zero", field),
            Self::NotWordAligned { field, value } => {
                write!(f, "{} = {} is not a multiple of 4", field, value)
            }
            Self::OutOfRange { field, value, max } => {
                write!(f, "{} = {} exceeds the maximum of {}", field, value, max)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &NeurocoreConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_machine(config, &mut errors);
    validate_logging(config, &mut errors);
    validate_simulation(config, &mut errors);

    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

fn positive(field: &str, value: u64, errors: &mut Vec<ConfigValidationError>) {
    if value == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
}

fn validate_machine(config: &NeurocoreConfig, errors: &mut Vec<ConfigValidationError>) {
    let machine = &config.machine;
    positive("machine.sdram_bytes", machine.sdram_bytes as u64, errors);
    if machine.sdram_bytes % 4 != 0 {
        errors.push(ConfigValidationError::NotWordAligned {
            field: "machine.sdram_bytes".to_string(),
            value: machine.sdram_bytes as u64,
        });
    }
    positive("machine.dtcm_bytes", machine.dtcm_bytes as u64, errors);
    positive("machine.link_capacity", machine.link_capacity as u64, errors);
    positive("machine.cycles_per_us", machine.cycles_per_us as u64, errors);
}

fn validate_logging(config: &NeurocoreConfig, errors: &mut Vec<ConfigValidationError>) {
    let logging = &config.logging;
    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", logging.level, LOG_LEVELS.join(", ")),
        });
    }
    let format = logging.format.to_lowercase();
    if format != "text" && format != "json" {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.format".to_string(),
            reason: format!("'{}' is neither text nor json", logging.format),
        });
    }
}

fn validate_simulation(config: &NeurocoreConfig, errors: &mut Vec<ConfigValidationError>) {
    let sim = &config.simulation;
    positive("simulation.timer_period_us", sim.timer_period_us as u64, errors);
    positive("simulation.num_neurons", sim.num_neurons as u64, errors);
    if sim.num_neurons > MAX_NEURONS_PER_CORE {
        errors.push(ConfigValidationError::OutOfRange {
            field: "simulation.num_neurons".to_string(),
            value: sim.num_neurons as u64,
            max: MAX_NEURONS_PER_CORE as u64,
        });
    }
    if sim.connection_percent > 100 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "simulation.connection_percent".to_string(),
            value: sim.connection_percent as u64,
            max: 100,
        });
    }
    if sim.rate_hz as u64 * sim.timer_period_us as u64 > 1_000_000 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "simulation.rate_hz".to_string(),
            reason: "more than one spike per tick on average".to_string(),
        });
    }
}

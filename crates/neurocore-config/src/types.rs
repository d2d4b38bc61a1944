// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `neurocore.toml`. Every field has a default, so a file
//! only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeurocoreConfig {
    pub machine: MachineConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

/// Host kernel resources
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Shared SDRAM image size; a multiple of 4
    pub sdram_bytes: u32,
    /// Per-core DTCM budget
    pub dtcm_bytes: usize,
    /// Packets a handler may send before the link reports full
    pub link_capacity: usize,
    /// Cycle counter rate used by busy waits
    pub cycles_per_us: u32,
    /// Pace ticks to wall-clock time
    pub real_time: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            sdram_bytes: 16 * 1024 * 1024,
            dtcm_bytes: 256 * 1024,
            link_capacity: 64,
            cycles_per_us: 200,
            real_time: false,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// text or json
    pub format: String,
    /// Crates logged at debug level regardless of `level`
    pub debug_crates: Vec<String>,
    /// Directory for rolling log files; console only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            debug_crates: Vec::new(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Parameters of the demo network run by the host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks to simulate
    pub ticks: u32,
    pub timer_period_us: u32,
    /// Seed of the Poisson sources' generator
    pub seed: [u32; 4],
    /// Poisson rate of every source
    pub rate_hz: u32,
    pub num_sources: u32,
    pub num_neurons: u32,
    /// Probability in percent that a source connects to a neuron
    pub connection_percent: u32,
    /// Synaptic weight of every connection, in the synapse processor's weight format
    pub weight: u32,
    /// Synaptic delay of every connection in ticks
    pub delay: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 1000,
            timer_period_us: 1000,
            seed: [123, 456, 789, 1011],
            rate_hz: 20,
            num_sources: 64,
            num_neurons: 32,
            connection_percent: 25,
            weight: 0x600,
            delay: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: NeurocoreConfig = toml::from_str(
            r#"
            [simulation]
            ticks = 50
            seed = [1, 2, 3, 4]
            "#,
        )
        .unwrap();
        assert_eq!(config.simulation.ticks, 50);
        assert_eq!(config.simulation.seed, [1, 2, 3, 4]);
        assert_eq!(config.simulation.rate_hz, SimulationConfig::default().rate_hz);
        assert_eq!(config.machine, MachineConfig::default());
    }

    #[test]
    fn test_json_format_is_case_insensitive() {
        let logging = LoggingConfig {
            format: "JSON".to_string(),
            ..Default::default()
        };
        assert!(logging.is_json());
        assert!(!LoggingConfig::default().is_json());
    }
}

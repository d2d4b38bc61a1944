// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, NeurocoreConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the file [`find_config_file`] looks for
pub const CONFIG_FILE_NAME: &str = "neurocore.toml";

/// Find the neurocore configuration file
///
/// Search order:
/// 1. `NEUROCORE_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEUROCORE_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEUROCORE_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NEUROCORE_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load, override and validate the configuration
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurocoreConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };
    debug!(path = %config_file.display(), "Loading configuration");

    let content = fs::read_to_string(&config_file)?;
    let config: NeurocoreConfig = toml::from_str(&content)?;
    finish(config, cli_args)
}

/// Like [`load_config`], but starts from defaults when no file is given and none is found
///
/// An explicit path that does not exist is still an error.
pub fn load_config_or_default(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurocoreConfig> {
    if config_path.is_some() {
        return load_config(config_path, cli_args);
    }
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) => {
            debug!("No configuration file, using defaults");
            finish(NeurocoreConfig::default(), cli_args)
        }
        Err(e) => Err(e),
    }
}

fn finish(
    mut config: NeurocoreConfig,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurocoreConfig> {
    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }
    validate_config(&config)?;
    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Four comma separated words, e.g. `1,2,3,4`
fn parse_seed(value: &str) -> Option<[u32; 4]> {
    let words = value
        .split(',')
        .map(|w| w.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    words.try_into().ok()
}

/// Apply environment variable overrides to configuration
///
/// - `NEUROCORE_SDRAM_BYTES` -> `machine.sdram_bytes`
/// - `NEUROCORE_DTCM_BYTES` -> `machine.dtcm_bytes`
/// - `NEUROCORE_LINK_CAPACITY` -> `machine.link_capacity`
/// - `NEUROCORE_REAL_TIME` -> `machine.real_time`
/// - `NEUROCORE_LOG_LEVEL` -> `logging.level`
/// - `NEUROCORE_LOG_FORMAT` -> `logging.format`
/// - `NEUROCORE_LOG_DIR` -> `logging.log_dir`
/// - `NEUROCORE_TICKS` -> `simulation.ticks`
/// - `NEUROCORE_TIMER_PERIOD_US` -> `simulation.timer_period_us`
/// - `NEUROCORE_SEED` -> `simulation.seed`
/// - `NEUROCORE_RATE_HZ` -> `simulation.rate_hz`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut NeurocoreConfig) {
    if let Some(v) = env_parse::<u32>("NEUROCORE_SDRAM_BYTES") {
        config.machine.sdram_bytes = v;
    }
    if let Some(v) = env_parse::<usize>("NEUROCORE_DTCM_BYTES") {
        config.machine.dtcm_bytes = v;
    }
    if let Some(v) = env_parse::<usize>("NEUROCORE_LINK_CAPACITY") {
        config.machine.link_capacity = v;
    }
    if let Ok(value) = env::var("NEUROCORE_REAL_TIME") {
        config.machine.real_time = parse_bool(&value);
    }

    if let Ok(value) = env::var("NEUROCORE_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("NEUROCORE_LOG_FORMAT") {
        config.logging.format = value;
    }
    if let Ok(value) = env::var("NEUROCORE_LOG_DIR") {
        config.logging.log_dir = Some(PathBuf::from(value));
    }

    if let Some(v) = env_parse::<u32>("NEUROCORE_TICKS") {
        config.simulation.ticks = v;
    }
    if let Some(v) = env_parse::<u32>("NEUROCORE_TIMER_PERIOD_US") {
        config.simulation.timer_period_us = v;
    }
    if let Some(seed) = env::var("NEUROCORE_SEED").ok().and_then(|v| parse_seed(&v)) {
        config.simulation.seed = seed;
    }
    if let Some(v) = env_parse::<u32>("NEUROCORE_RATE_HZ") {
        config.simulation.rate_hz = v;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Apply CLI argument overrides to configuration
///
/// Keys: `ticks`, `seed`, `rate_hz`, `timer_period_us`, `num_sources`, `num_neurons`,
/// `real_time`, `log_level`, `log_format`.
pub fn apply_cli_overrides(config: &mut NeurocoreConfig, cli_args: &HashMap<String, String>) {
    let number = |key: &str| cli_args.get(key).and_then(|v| v.trim().parse::<u32>().ok());

    if let Some(v) = number("ticks") {
        config.simulation.ticks = v;
    }
    if let Some(seed) = cli_args.get("seed").and_then(|v| parse_seed(v)) {
        config.simulation.seed = seed;
    }
    if let Some(v) = number("rate_hz") {
        config.simulation.rate_hz = v;
    }
    if let Some(v) = number("timer_period_us") {
        config.simulation.timer_period_us = v;
    }
    if let Some(v) = number("num_sources") {
        config.simulation.num_sources = v;
    }
    if let Some(v) = number("num_neurons") {
        config.simulation.num_neurons = v;
    }
    if let Some(value) = cli_args.get("real_time") {
        config.machine.real_time = parse_bool(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_format") {
        config.logging.format = value.clone();
    }
}

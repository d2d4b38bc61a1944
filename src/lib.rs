// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore
//!
//! On-chip neuromorphic simulation runtime. Each core of a many-core machine runs one of four
//! event-driven roles against a configuration image in shared SDRAM:
//!
//! - **synapse processor**: receives spikes, fetches synaptic rows, accumulates delayed input
//!   and applies STDP
//! - **neuron processor**: integrates input, emits spikes, records and back-propagates them
//! - **spike source**: Poisson or array driven spike trains
//! - **current input**: Poisson driven current injection
//!
//! This umbrella crate re-exports the workspace members and adds the glue the host tools need:
//! configuration conversion and a small demo network.
//!
//! ```rust,no_run
//! use neurocore::prelude::*;
//!
//! let config = neurocore::config::load_config_or_default(None, None).unwrap();
//! let mut machine = Machine::new(neurocore::machine_config(&config.machine));
//! let network = DemoNetwork::build(&mut machine, &config.simulation).unwrap();
//! let report = machine.run(config.simulation.ticks + 1);
//! println!("{:?} {:?}", report, network.summary(&machine));
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod network;

pub use neurocore_config as config;
pub use neurocore_hal as hal;
pub use neurocore_npu_burst_engine as burst_engine;
pub use neurocore_npu_neural as neural;
pub use neurocore_npu_plasticity as plasticity;
pub use neurocore_npu_runtime as runtime;
pub use neurocore_observability as observability;

pub mod prelude {
    pub use crate::network::{DemoNetwork, NetworkError, NetworkSummary};
    pub use neurocore_config::NeurocoreConfig;
    pub use neurocore_hal::{Application, CoreId, ExitCode, Platform, Sdram};
    pub use neurocore_npu_burst_engine::{
        IfCondExpProcessor, IfCurrExpProcessor, Machine, MachineHandle, MachineReport,
        NeuronProcessor, SpikeSource, SynapseProcessor,
    };
    pub use neurocore_npu_neural::{S1615, S1615_ONE};
    pub use neurocore_npu_plasticity::{StaticRowProcessor, StdpRowProcessor};
    pub use neurocore_npu_runtime::{ConfigImage, ImageBuilder, ImageLocation};
}

/// Host kernel settings from the loaded configuration
pub fn machine_config(config: &neurocore_config::MachineConfig) -> burst_engine::MachineConfig {
    burst_engine::MachineConfig {
        sdram_bytes: config.sdram_bytes,
        dtcm_bytes: config.dtcm_bytes,
        link_capacity: config.link_capacity,
        cycles_per_us: config.cycles_per_us,
        real_time: config.real_time,
    }
}

/// Logging options from the loaded configuration
pub fn logging_options(
    config: &neurocore_config::LoggingConfig,
) -> Result<observability::LoggingOptions, observability::UnknownLogFormat> {
    Ok(observability::LoggingOptions {
        level: config.level.to_lowercase(),
        format: config.format.parse()?,
        log_dir: config.log_dir.clone(),
    })
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore Burst Engine
//!
//! The four role binaries and the host stub kernel that runs them.
//!
//! ## Roles
//! - [`SynapseProcessor`]: spikes in, delayed synaptic input out, STDP on the rows
//! - [`NeuronProcessor`]: input in, membrane integration, spikes and back propagation out
//! - [`SpikeSource`]: Poisson or array driven spikes
//! - [`CurrentInput`]: Poisson driven current injection
//!
//! ## Kernel
//! [`Machine`] runs cores in lock-step ticks over one shared SDRAM image, with prioritised
//! per-core mailboxes and a `(key, mask)` multicast routing table. [`MachineHandle`] moves a
//! machine onto its own thread.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod machine;
pub mod machine_handle;
pub mod roles;

pub use error::{MachineError, Result, RoleError};
pub use machine::{CorePlatform, CoreState, Machine, MachineConfig, MachineReport};
pub use machine_handle::{MachineCommand, MachineHandle};
pub use roles::current_input::CurrentInput;
pub use roles::neuron_processor::{
    boot_neuron_processor, IfCondExpProcessor, IfCurrExpProcessor, NeuronConfig, NeuronKind,
    NeuronProcessor, NeuronStatistic,
};
pub use roles::spike_source::{SpikeSource, SpikeSourceConfig, SpikeSourceStatistic};
pub use roles::synapse_processor::{
    boot_synapse_processor, SynapseConfig, SynapseProcessor, SynapseStatistic,
};
pub use roles::{Role, TickCounter};

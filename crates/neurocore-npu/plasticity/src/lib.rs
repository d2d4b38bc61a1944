// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore Synaptic Plasticity
//!
//! Row processors for the synapse role. A row processor turns a fetched synaptic row into
//! weights deposited in the ring buffer and, for plastic rows, updates the row in place so the
//! role can write it back.
//!
//! - [`StaticRowProcessor`]: fixed weights, one word per synapse
//! - [`StdpRowProcessor`]: spike-timing-dependent plasticity, generic over a
//!   [`TimingDependence`] and a [`WeightDependence`]
//!
//! Post-synaptic spikes reach the processor through
//! [`RowProcessor::add_post_synaptic_spike`] and are kept in a bounded per-neuron
//! [`PostEventHistory`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod post_events;
pub mod row;
pub mod synaptic_word;
pub mod timing;
pub mod weight;

pub use error::{PlasticityError, Result};
pub use post_events::{PostEvent, PostEventHistory, PostEventWindow};
pub use row::stdp_row::{
    read_rules, PlasticSynapse, TimingRule, TimingRuleId, WeightRule, WeightRuleId,
    POST_HISTORY_SIZE,
};
pub use row::{
    encode_header, DelayExtension, RowOutcome, RowProcessor, StaticRowProcessor,
    StdpRowProcessor, ROW_HEADER_WORDS,
};
pub use synaptic_word::{clamp_delay, Synapse, SynapticWordFormat};
pub use timing::{
    NearestPairTiming, PairTiming, TauLut, TimingDependence, Vogels2011Timing, WeightUpdate,
};
pub use weight::{AdditiveWeight, MultiplicativeWeight, WeightDependence};

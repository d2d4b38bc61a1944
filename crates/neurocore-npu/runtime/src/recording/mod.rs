// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Recording
//!
//! Observables a role persists to SDRAM while it runs:
//! - **Spikes**: one bit per recorded neuron per tick
//! - **Analogue**: sampled per-neuron values of one channel
//! - **Back propagation**: the per-tick "neuron spiked" bit-vector exchanged between neuron and
//!   synapse processors through double-buffered slabs
//!
//! Recording regions have a fixed size. Once a stream is full the remaining samples are
//! discarded and a single warning is logged.

pub mod analogue;
pub mod back_propagation;
pub mod spike;

pub use analogue::AnalogueRecorder;
pub use back_propagation::{
    BackPropagationInput, BackPropagationInputs, BackPropagationOutput, BackPropagationSlabs,
    MAX_BACK_PROPAGATION_INPUTS,
};
pub use spike::{decode_spike_recording, SpikeRecorder};

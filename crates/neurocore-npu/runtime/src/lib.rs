// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore Runtime Structures
//!
//! The shared-memory side of every role: how a core finds its configuration and the data
//! structures it keeps in DTCM and SDRAM while the event loop runs.
//!
//! ## Layout
//! - **config / regions / image_builder**: the role image format
//! - **key_lookup**: spike key to synaptic row resolution
//! - **spike_input_buffer / circular_buffer / delay_buffer**: row work queues
//! - **ring_buffer / slab / input_buffer**: delayed synaptic input and its hand-off to neurons
//! - **recording**: spike, analogue and back-propagation streams
//! - **poisson_source / array_source / flush**: spike generation
//! - **statistics / profiler**: counters and cycle samples
//!
//! Nothing here issues events; the roles in `neurocore-npu-burst-engine` drive these
//! structures from their handlers.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod array_source;
pub mod circular_buffer;
pub mod config;
pub mod delay_buffer;
pub mod error;
pub mod flush;
pub mod image_builder;
pub mod input_buffer;
pub mod key_lookup;
pub mod poisson_source;
pub mod profiler;
pub mod recording;
pub mod regions;
pub mod ring_buffer;
pub mod slab;
pub mod spike_input_buffer;
pub mod statistics;

pub use array_source::ArraySource;
pub use circular_buffer::CircularBuffer;
pub use config::{ensure_len, ConfigImage, ImageLocation, RegionId, SystemRegion, IMAGE_MAGIC};
pub use delay_buffer::{DelayBuffer, DelayBufferLayout, DelayRow};
pub use error::{Result, RuntimeError};
pub use flush::{FlushState, FLUSH_DISABLED};
pub use image_builder::ImageBuilder;
pub use input_buffer::{InputBufferDescriptor, InputBuffers};
pub use key_lookup::{KeyLookup, KeyLookupEntry, RowLocation, RowOffsetLength, MAX_ROW_SYNAPSES};
pub use poisson_source::{PoissonParameters, PoissonSource, PoissonSourceLayout};
pub use profiler::{Profiler, ProfilerScope, ProfilerTag, PROFILER_ENTER};
pub use recording::{
    decode_spike_recording, AnalogueRecorder, BackPropagationInput, BackPropagationInputs,
    BackPropagationOutput, BackPropagationSlabs, SpikeRecorder,
};
pub use regions::{CurrentInputRegion, NeuronRegion, SpikeSourceRegion, SynapseRegion};
pub use ring_buffer::RingBuffer;
pub use slab::SlabPair;
pub use spike_input_buffer::SpikeInputBuffer;
pub use statistics::{StatisticId, Statistics};

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Roles
//!
//! A role is the program a core runs. Each role owns all of its state in one struct (its
//! context) that implements [`Application`]; the kernel hands that struct to every handler by
//! mutable reference, so handlers never reach for process-wide state.
//!
//! | Role | Image regions | Consumes | Produces |
//! |------|---------------|----------|----------|
//! | [`SynapseProcessor`] | [`SynapseRegion`](neurocore_npu_runtime::SynapseRegion) | spikes, back propagation | input slabs |
//! | [`NeuronProcessor`] | [`NeuronRegion`](neurocore_npu_runtime::NeuronRegion) | input slabs | spikes, back propagation |
//! | [`SpikeSource`] | [`SpikeSourceRegion`](neurocore_npu_runtime::SpikeSourceRegion) | - | spikes |
//! | [`CurrentInput`] | [`CurrentInputRegion`](neurocore_npu_runtime::CurrentInputRegion) | - | input slabs |

pub mod current_input;
pub mod neuron_processor;
pub mod spike_source;
pub mod synapse_processor;

pub use current_input::CurrentInput;
pub use neuron_processor::{boot_neuron_processor, NeuronKind, NeuronProcessor};
pub use spike_source::SpikeSource;
pub use synapse_processor::{boot_synapse_processor, SynapseProcessor};

use crate::error::Result;
use neurocore_hal::{Application, Dtcm, MemoryRegion, Sdram};
use neurocore_npu_neural::models::WordState;
use neurocore_npu_runtime::config::ensure_len;
use neurocore_npu_runtime::ImageLocation;

/// A role that can be started from its image alone
pub trait Role: Application + Send + Sized {
    fn boot(sdram: &Sdram, location: ImageLocation, dtcm: &mut Dtcm) -> Result<Self>;
}

/// Tick number of a role
///
/// Starts one before tick 0 so the first timer event advances it to 0; wraps like the
/// hardware counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickCounter(u32);

impl Default for TickCounter {
    fn default() -> Self {
        Self(u32::MAX)
    }
}

impl TickCounter {
    #[inline]
    pub fn advance(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    #[inline]
    pub fn current(&self) -> u32 {
        self.0
    }
}

/// Per-item model blocks laid out as `[mutable × n, immutable × n]`
pub(crate) struct ModelBlocks<S, P> {
    pub state: Vec<S>,
    pub params: Vec<P>,
}

impl<S: WordState + Clone, P: WordState + Clone> ModelBlocks<S, P> {
    pub fn read(region: &MemoryRegion, what: &'static str, n: usize, dtcm: &mut Dtcm) -> Result<Self> {
        ensure_len(region, what, (n * (S::WORDS + P::WORDS)) as u32)?;
        let words = region.to_vec()?;
        let (state_words, param_words) = words.split_at(n * S::WORDS);
        dtcm.charge(n * (core::mem::size_of::<S>() + core::mem::size_of::<P>()))?;
        let state = state_words
            .chunks_exact(S::WORDS.max(1))
            .take(n)
            .map(S::from_words)
            .collect::<core::result::Result<Vec<_>, _>>()?;
        let params = param_words
            .chunks_exact(P::WORDS.max(1))
            .take(n)
            .map(P::from_words)
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(Self { state, params })
    }

    /// Encode as region words
    pub fn to_words(state: &[S], params: &[P]) -> Vec<u32> {
        let mut words = Vec::with_capacity(state.len() * S::WORDS + params.len() * P::WORDS);
        for s in state {
            s.write_words(&mut words);
        }
        for p in params {
            p.write_words(&mut words);
        }
        words
    }

    /// Write the mutable half back over the region
    pub fn write_state(region: &MemoryRegion, state: &[S]) -> Result<()> {
        let mut words = Vec::with_capacity(state.len() * S::WORDS);
        for s in state {
            s.write_words(&mut words);
        }
        region.write_slice(0, &words)?;
        Ok(())
    }
}

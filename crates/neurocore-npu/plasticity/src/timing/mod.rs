// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Timing Dependences
//!
//! A timing dependence turns the relative timing of pre- and post-synaptic spikes into
//! depression or potentiation magnitudes (S2011). It owns the traces kept in the row header
//! (pre-synaptic) and in the post-event history (post-synaptic), and the decay tables that
//! age them.
//!
//! | Rule | Pre trace | Post trace | Effect |
//! |------|-----------|------------|--------|
//! | [`PairTiming`] | S2011 | S2011 | all-to-all pairing through accumulated traces |
//! | [`NearestPairTiming`] | none | none | only the nearest spike pair counts |
//! | [`Vogels2011Timing`] | S2011 | S2011 | symmetric inhibitory rule with offset `rho` |

pub mod nearest_pair;
pub mod pair;
pub mod vogels_2011;

pub use nearest_pair::NearestPairTiming;
pub use pair::PairTiming;
pub use vogels_2011::Vogels2011Timing;

use crate::error::Result;
use crate::post_events::PostEvent;
use neurocore_hal::RegionCursor;
use neurocore_npu_neural::{ExpDecayLut, S2011, S2011_ONE};

/// Entries of each decay table; older differences decay to zero
pub const TAU_LUT_ENTRIES: usize = 256;

/// Decay table of the timing rules
pub type TauLut = ExpDecayLut<TAU_LUT_ENTRIES>;

/// Weight change requested by a spike pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUpdate {
    Depression(S2011),
    Potentiation(S2011),
}

pub trait TimingDependence: Sized {
    /// Trace stored in the row header alongside `lastPreTick`
    type PreTrace: Copy + Default + core::fmt::Debug;
    /// Trace stored with each post-synaptic event
    type PostTrace: Copy + Default + core::fmt::Debug;

    /// Row header words holding the pre-synaptic trace
    const PRE_TRACE_WORDS: usize;

    /// Parse the rule's parameters from the plasticity region
    fn read(cursor: &mut RegionCursor) -> Result<Self>;

    /// Encode the parameters as region words
    fn to_words(&self) -> Vec<u32>;

    fn read_pre_trace(words: &[u32]) -> Self::PreTrace;

    fn write_pre_trace(trace: Self::PreTrace, words: &mut [u32]);

    /// Trace after a pre-synaptic spike at `time`
    fn add_pre_spike(&self, time: u32, last_time: u32, last_trace: Self::PreTrace) -> Self::PreTrace;

    /// Trace after a post-synaptic spike at `time`
    fn add_post_spike(&self, time: u32, last_time: u32, last_trace: Self::PostTrace) -> Self::PostTrace;

    /// Effect of a pre-synaptic spike at `time` given the last post-synaptic event before it
    fn apply_pre_spike(
        &self,
        time: u32,
        trace: Self::PreTrace,
        last_pre_time: u32,
        last_pre_trace: Self::PreTrace,
        last_post: Option<PostEvent<Self::PostTrace>>,
    ) -> Option<WeightUpdate>;

    /// Effect of a post-synaptic spike at `time` given the last pre-synaptic spike
    fn apply_post_spike(
        &self,
        time: u32,
        trace: Self::PostTrace,
        last_pre_time: u32,
        last_pre_trace: Self::PreTrace,
        last_post: Option<PostEvent<Self::PostTrace>>,
    ) -> Option<WeightUpdate>;
}

/// `trace × decay` in S2011
#[inline(always)]
pub(crate) fn decay(trace: S2011, factor: i32) -> S2011 {
    (trace * factor) >> neurocore_npu_neural::fixed::S2011_SHIFT
}

/// Decayed trace plus one new spike
#[inline(always)]
pub(crate) fn accumulate(lut: &TauLut, time: u32, last_time: u32, last_trace: S2011) -> S2011 {
    decay(last_trace, lut.get(time.wrapping_sub(last_time))) + S2011_ONE
}

pub(crate) fn read_lut(cursor: &mut RegionCursor) -> Result<TauLut> {
    let words = cursor.read_words(TauLut::WORDS as u32)?;
    Ok(TauLut::from_words(&words)?)
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! All-to-all pair rule
//!
//! ```text
//! region: [tauPlus LUT, tauMinus LUT]
//! ```

use super::{accumulate, decay, read_lut, TauLut, TimingDependence, WeightUpdate};
use crate::error::Result;
use crate::post_events::PostEvent;
use neurocore_hal::RegionCursor;
use neurocore_npu_neural::S2011;

#[derive(Debug, Clone)]
pub struct PairTiming {
    pub tau_plus: TauLut,
    pub tau_minus: TauLut,
}

impl PairTiming {
    /// Tables for time constants given in ticks (S1615)
    pub fn new(tau_plus_ticks: i32, tau_minus_ticks: i32) -> Self {
        Self {
            tau_plus: TauLut::generate(tau_plus_ticks),
            tau_minus: TauLut::generate(tau_minus_ticks),
        }
    }
}

impl TimingDependence for PairTiming {
    type PreTrace = S2011;
    type PostTrace = S2011;
    const PRE_TRACE_WORDS: usize = 1;

    fn read(cursor: &mut RegionCursor) -> Result<Self> {
        Ok(Self {
            tau_plus: read_lut(cursor)?,
            tau_minus: read_lut(cursor)?,
        })
    }

    fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(2 * TauLut::WORDS);
        self.tau_plus.write_words(&mut words);
        self.tau_minus.write_words(&mut words);
        words
    }

    fn read_pre_trace(words: &[u32]) -> S2011 {
        words.first().map_or(0, |&w| w as i32)
    }

    fn write_pre_trace(trace: S2011, words: &mut [u32]) {
        if let Some(w) = words.first_mut() {
            *w = trace as u32;
        }
    }

    fn add_pre_spike(&self, time: u32, last_time: u32, last_trace: S2011) -> S2011 {
        accumulate(&self.tau_plus, time, last_time, last_trace)
    }

    fn add_post_spike(&self, time: u32, last_time: u32, last_trace: S2011) -> S2011 {
        accumulate(&self.tau_minus, time, last_time, last_trace)
    }

    fn apply_pre_spike(
        &self,
        time: u32,
        _trace: S2011,
        _last_pre_time: u32,
        _last_pre_trace: S2011,
        last_post: Option<PostEvent<S2011>>,
    ) -> Option<WeightUpdate> {
        let post = last_post?;
        let elapsed = time.wrapping_sub(post.time) as i32;
        (elapsed > 0).then(|| {
            WeightUpdate::Depression(decay(post.trace, self.tau_minus.get(elapsed as u32)))
        })
    }

    fn apply_post_spike(
        &self,
        time: u32,
        _trace: S2011,
        last_pre_time: u32,
        last_pre_trace: S2011,
        _last_post: Option<PostEvent<S2011>>,
    ) -> Option<WeightUpdate> {
        let elapsed = time.wrapping_sub(last_pre_time) as i32;
        (elapsed > 0).then(|| {
            WeightUpdate::Potentiation(decay(last_pre_trace, self.tau_plus.get(elapsed as u32)))
        })
    }
}

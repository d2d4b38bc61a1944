// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Nearest-pair rule: only the closest pre/post pairing contributes and no traces are kept
//!
//! ```text
//! region: [tauPlus LUT, tauMinus LUT]
//! ```

use super::{read_lut, TauLut, TimingDependence, WeightUpdate};
use crate::error::Result;
use crate::post_events::PostEvent;
use neurocore_hal::RegionCursor;

#[derive(Debug, Clone)]
pub struct NearestPairTiming {
    pub tau_plus: TauLut,
    pub tau_minus: TauLut,
}

impl NearestPairTiming {
    pub fn new(tau_plus_ticks: i32, tau_minus_ticks: i32) -> Self {
        Self {
            tau_plus: TauLut::generate(tau_plus_ticks),
            tau_minus: TauLut::generate(tau_minus_ticks),
        }
    }
}

impl TimingDependence for NearestPairTiming {
    type PreTrace = ();
    type PostTrace = ();
    const PRE_TRACE_WORDS: usize = 0;

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

    fn read_pre_trace(_words: &[u32]) {}

    fn write_pre_trace(_trace: (), _words: &mut [u32]) {}

    fn add_pre_spike(&self, _time: u32, _last_time: u32, _last_trace: ()) {}

    fn add_post_spike(&self, _time: u32, _last_time: u32, _last_trace: ()) {}

    fn apply_pre_spike(
        &self,
        time: u32,
        _trace: (),
        _last_pre_time: u32,
        _last_pre_trace: (),
        last_post: Option<PostEvent<()>>,
    ) -> Option<WeightUpdate> {
        let post = last_post?;
        let elapsed = time.wrapping_sub(post.time) as i32;
        (elapsed > 0).then(|| WeightUpdate::Depression(self.tau_minus.get(elapsed as u32)))
    }

    fn apply_post_spike(
        &self,
        time: u32,
        _trace: (),
        last_pre_time: u32,
        _last_pre_trace: (),
        _last_post: Option<PostEvent<()>>,
    ) -> Option<WeightUpdate> {
        let elapsed = time.wrapping_sub(last_pre_time) as i32;
        (elapsed > 0).then(|| WeightUpdate::Potentiation(self.tau_plus.get(elapsed as u32)))
    }
}

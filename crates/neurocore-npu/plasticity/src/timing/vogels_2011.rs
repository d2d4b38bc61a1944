// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Vogels et al. (2011) inhibitory rule
//!
//! Both orderings potentiate by the partner's decayed trace; every pre-synaptic spike also
//! subtracts `alpha` (the target-rate offset, `2 × rho × tau` in trace units).
//!
//! ```text
//! region: [alpha (S2011), tau LUT]
//! ```

use super::{accumulate, decay, read_lut, TauLut, TimingDependence, WeightUpdate};
use crate::error::Result;
use crate::post_events::PostEvent;
use neurocore_hal::RegionCursor;
use neurocore_npu_neural::{S2011, S2011_ONE};

#[derive(Debug, Clone)]
pub struct Vogels2011Timing {
    pub alpha: S2011,
    pub tau: TauLut,
}

impl Vogels2011Timing {
    pub fn new(alpha: S2011, tau_ticks: i32) -> Self {
        Self {
            alpha,
            tau: TauLut::generate(tau_ticks),
        }
    }
}

impl TimingDependence for Vogels2011Timing {
    type PreTrace = S2011;
    type PostTrace = S2011;
    const PRE_TRACE_WORDS: usize = 1;

    fn read(cursor: &mut RegionCursor) -> Result<Self> {
        Ok(Self {
            alpha: cursor.read_i32()?,
            tau: read_lut(cursor)?,
        })
    }

    fn to_words(&self) -> Vec<u32> {
        let mut words = vec![self.alpha as u32];
        self.tau.write_words(&mut words);
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
        accumulate(&self.tau, time, last_time, last_trace)
    }

    fn add_post_spike(&self, time: u32, last_time: u32, last_trace: S2011) -> S2011 {
        accumulate(&self.tau, time, last_time, last_trace)
    }

    fn apply_pre_spike(
        &self,
        time: u32,
        _trace: S2011,
        _last_pre_time: u32,
        _last_pre_trace: S2011,
        last_post: Option<PostEvent<S2011>>,
    ) -> Option<WeightUpdate> {
        let decayed = last_post.map_or(0, |post| {
            decay(post.trace, self.tau.get(time.wrapping_sub(post.time)))
        });
        Some(WeightUpdate::Potentiation(decayed - self.alpha))
    }

    fn apply_post_spike(
        &self,
        time: u32,
        _trace: S2011,
        last_pre_time: u32,
        last_pre_trace: S2011,
        _last_post: Option<PostEvent<S2011>>,
    ) -> Option<WeightUpdate> {
        let decayed = decay(last_pre_trace, self.tau.get(time.wrapping_sub(last_pre_time)));
        Some(WeightUpdate::Potentiation(decayed + S2011_ONE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurocore_npu_neural::S1615_ONE;

    #[test]
    fn test_lone_pre_spike_depresses_by_alpha() {
        let timing = Vogels2011Timing::new(S2011_ONE / 4, 20 * S1615_ONE);
        assert_eq!(
            timing.apply_pre_spike(50, S2011_ONE, 0, 0, None),
            Some(WeightUpdate::Potentiation(-S2011_ONE / 4))
        );
    }

    #[test]
    fn test_post_spike_always_potentiates() {
        let timing = Vogels2011Timing::new(S2011_ONE / 4, 20 * S1615_ONE);
        let Some(WeightUpdate::Potentiation(p)) =
            timing.apply_post_spike(12, S2011_ONE, 10, S2011_ONE, None)
        else {
            panic!("expected potentiation");
        };
        assert!(p > S2011_ONE && p < 2 * S2011_ONE);
    }
}

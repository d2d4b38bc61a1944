// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Additive weight dependence
//!
//! Magnitudes accumulate over the whole update and are applied once:
//!
//! ```text
//! w' = clamp(w + Σpot × A2+ − Σdep × A2−, minW, maxW)
//! region: [minW, maxW, A2+ (U0.32), A2− (U0.32)]
//! ```
//!
//! `A2+` and `A2−` are scaled by the weight range when loaded, so the accumulated S2011
//! magnitudes convert straight into weight units.

use super::WeightDependence;
use crate::error::Result;
use neurocore_hal::RegionCursor;
use neurocore_npu_neural::fixed::S2011_SHIFT;
use neurocore_npu_neural::{WeightFormat, S2011, U032};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditiveWeight {
    pub min_weight: i32,
    pub max_weight: i32,
    /// As configured, U0.32
    pub a2_plus: U032,
    pub a2_minus: U032,
    scaled_a2_plus: i32,
    scaled_a2_minus: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditiveState {
    initial_weight: i32,
    potentiation: S2011,
    depression: S2011,
}

impl AdditiveWeight {
    pub fn new(min_weight: i32, max_weight: i32, a2_plus: U032, a2_minus: U032) -> Self {
        let range = (max_weight as i64 - min_weight as i64).max(0);
        let scale = |a2: U032| ((a2 as i64 * range) >> 32) as i32;
        Self {
            min_weight,
            max_weight,
            a2_plus,
            a2_minus,
            scaled_a2_plus: scale(a2_plus),
            scaled_a2_minus: scale(a2_minus),
        }
    }
}

impl WeightDependence for AdditiveWeight {
    type State = AdditiveState;

    fn read(cursor: &mut RegionCursor, _format: WeightFormat) -> Result<Self> {
        let min_weight = cursor.read_i32()?;
        let max_weight = cursor.read_i32()?;
        let a2_plus = cursor.read_u32()?;
        let a2_minus = cursor.read_u32()?;
        Ok(Self::new(min_weight, max_weight, a2_plus, a2_minus))
    }

    fn to_words(&self) -> Vec<u32> {
        vec![
            self.min_weight as u32,
            self.max_weight as u32,
            self.a2_plus,
            self.a2_minus,
        ]
    }

    fn initial_state(&self, weight: i32) -> AdditiveState {
        AdditiveState {
            initial_weight: weight,
            potentiation: 0,
            depression: 0,
        }
    }

    fn apply_depression(&self, state: &mut AdditiveState, magnitude: S2011) {
        state.depression = state.depression.saturating_add(magnitude);
    }

    fn apply_potentiation(&self, state: &mut AdditiveState, magnitude: S2011) {
        state.potentiation = state.potentiation.saturating_add(magnitude);
    }

    fn final_weight(&self, state: AdditiveState) -> i32 {
        let pot = (state.potentiation as i64 * self.scaled_a2_plus as i64) >> S2011_SHIFT;
        let dep = (state.depression as i64 * self.scaled_a2_minus as i64) >> S2011_SHIFT;
        (state.initial_weight as i64 + pot - dep)
            .clamp(self.min_weight as i64, self.max_weight as i64) as i32
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Weight Dependences
//!
//! A weight dependence converts the depression and potentiation magnitudes produced by a
//! timing rule into a new weight, bounded by `[minW, maxW]`. Weights are in the synapse
//! processor's runtime weight format.

pub mod additive;
pub mod multiplicative;

pub use additive::AdditiveWeight;
pub use multiplicative::MultiplicativeWeight;

use crate::error::Result;
use crate::timing::WeightUpdate;
use neurocore_hal::RegionCursor;
use neurocore_npu_neural::{WeightFormat, S2011};

pub trait WeightDependence: Sized {
    /// Per-synapse state while a row is being updated
    type State: Copy + core::fmt::Debug;

    fn read(cursor: &mut RegionCursor, format: WeightFormat) -> Result<Self>;

    fn to_words(&self) -> Vec<u32>;

    fn initial_state(&self, weight: i32) -> Self::State;

    fn apply_depression(&self, state: &mut Self::State, magnitude: S2011);

    fn apply_potentiation(&self, state: &mut Self::State, magnitude: S2011);

    fn final_weight(&self, state: Self::State) -> i32;

    fn apply(&self, state: &mut Self::State, update: WeightUpdate) {
        match update {
            WeightUpdate::Depression(m) => self.apply_depression(state, m),
            WeightUpdate::Potentiation(m) => self.apply_potentiation(state, m),
        }
    }
}

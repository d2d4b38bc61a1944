// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Multiplicative (soft-bound) weight dependence
//!
//! Each event moves the weight by a fraction of its distance to the bound it approaches:
//!
//! ```text
//! pot: w += ((maxW − w) × A2+ >> fracBits) × magnitude
//! dep: w −= ((w − minW) × A2− >> fracBits) × magnitude
//! region: [minW, maxW, A2+, A2−]          A2± in the runtime weight format
//! ```

use super::WeightDependence;
use crate::error::Result;
use neurocore_hal::RegionCursor;
use neurocore_npu_neural::fixed::S2011_SHIFT;
use neurocore_npu_neural::{WeightFormat, S2011};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplicativeWeight {
    pub min_weight: i32,
    pub max_weight: i32,
    pub a2_plus: i32,
    pub a2_minus: i32,
    format: WeightFormat,
}

impl MultiplicativeWeight {
    pub fn new(format: WeightFormat, min_weight: i32, max_weight: i32, a2_plus: i32, a2_minus: i32) -> Self {
        Self {
            min_weight,
            max_weight,
            a2_plus,
            a2_minus,
            format,
        }
    }

    #[inline]
    fn step(&self, distance: i32, a2: i32, magnitude: S2011) -> i64 {
        let scale = self.format.mul(distance, a2) as i64;
        (scale * magnitude as i64) >> S2011_SHIFT
    }
}

impl WeightDependence for MultiplicativeWeight {
    type State = i32;

    fn read(cursor: &mut RegionCursor, format: WeightFormat) -> Result<Self> {
        Ok(Self::new(
            format,
            cursor.read_i32()?,
            cursor.read_i32()?,
            cursor.read_i32()?,
            cursor.read_i32()?,
        ))
    }

    fn to_words(&self) -> Vec<u32> {
        vec![
            self.min_weight as u32,
            self.max_weight as u32,
            self.a2_plus as u32,
            self.a2_minus as u32,
        ]
    }

    fn initial_state(&self, weight: i32) -> i32 {
        weight
    }

    fn apply_depression(&self, weight: &mut i32, magnitude: S2011) {
        let step = self.step(*weight - self.min_weight, self.a2_minus, magnitude);
        *weight = (*weight as i64 - step).max(self.min_weight as i64) as i32;
    }

    fn apply_potentiation(&self, weight: &mut i32, magnitude: S2011) {
        let step = self.step(self.max_weight - *weight, self.a2_plus, magnitude);
        *weight = (*weight as i64 + step).min(self.max_weight as i64) as i32;
    }

    fn final_weight(&self, weight: i32) -> i32 {
        weight.clamp(self.min_weight, self.max_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurocore_npu_neural::S2011_ONE;

    #[test]
    fn test_soft_bounds() {
        let format = WeightFormat::new(15);
        // A2 = 0.5
        let rule = MultiplicativeWeight::new(format, 0, 1 << 15, 1 << 14, 1 << 14);
        let mut w = rule.initial_state(1 << 14);
        rule.apply_potentiation(&mut w, S2011_ONE);
        assert_eq!(w, (1 << 14) + (1 << 13));
        rule.apply_potentiation(&mut w, S2011_ONE);
        assert_eq!(w, (1 << 14) + (1 << 13) + (1 << 12));

        let mut w = rule.initial_state(1 << 14);
        rule.apply_depression(&mut w, S2011_ONE);
        assert_eq!(rule.final_weight(w), 1 << 13);
    }

    #[test]
    fn test_weight_never_crosses_bounds() {
        let format = WeightFormat::new(15);
        let rule = MultiplicativeWeight::new(format, 100, 1 << 15, 1 << 15, 1 << 15);
        let mut w = rule.initial_state(1000);
        for _ in 0..20 {
            rule.apply_depression(&mut w, 4 * S2011_ONE);
        }
        assert_eq!(rule.final_weight(w), 100);
    }
}

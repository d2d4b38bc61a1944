// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Intrinsic plasticity: per-neuron excitability adaptation

use crate::fixed::S1615;

pub trait IntrinsicPlasticity {
    /// Additional input current for `neuron` this tick
    fn intrinsic_current(&self, neuron: usize) -> S1615;

    /// Adapt after `neuron` has been updated
    fn apply_spike(&mut self, neuron: usize, spiked: bool);
}

/// No adaptation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntrinsicPlasticity;

impl IntrinsicPlasticity for NoIntrinsicPlasticity {
    #[inline(always)]
    fn intrinsic_current(&self, _neuron: usize) -> S1615 {
        0
    }

    #[inline(always)]
    fn apply_spike(&mut self, _neuron: usize, _spiked: bool) {}
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Conductance-based Integrate-and-Fire
//!
//! Synaptic inputs are conductances; the input current depends on the distance to the reversal
//! potentials:
//!
//! ```text
//! I = g_exc × (V_rev_exc - V) + g_inh × (V_rev_inh - V) + I_ext + I_offset
//! ```
//!
//! Integration, threshold and refractory handling are shared with [`IfCurr`](super::IfCurr).

use super::if_curr::{integrate, IfCurrParams, IfState};
use super::threshold::{ConstantThreshold, ThresholdModel};
use super::traits::{check_words, ModelParameters, NeuronModel, WordState};
use crate::error::Result;
use crate::fixed::{mul_s1615, S1615};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfCondParams<TP> {
    pub membrane: IfCurrParams<TP>,
    pub v_rev_exc: S1615,
    pub v_rev_inh: S1615,
}

impl<TP: WordState> WordState for IfCondParams<TP> {
    const WORDS: usize = IfCurrParams::<TP>::WORDS + 2;

    fn from_words(words: &[u32]) -> Result<Self> {
        check_words(words, Self::WORDS)?;
        let base = IfCurrParams::<TP>::WORDS;
        Ok(Self {
            membrane: IfCurrParams::from_words(words)?,
            v_rev_exc: words[base] as i32,
            v_rev_inh: words[base + 1] as i32,
        })
    }

    fn write_words(&self, out: &mut Vec<u32>) {
        self.membrane.write_words(out);
        out.push(self.v_rev_exc as u32);
        out.push(self.v_rev_inh as u32);
    }
}

impl<TP: ModelParameters> ModelParameters for IfCondParams<TP> {
    fn validate(&self) -> Result<()> {
        self.membrane.validate()
    }
}

/// Conductance-based leaky integrate-and-fire neuron
#[derive(Debug, Clone, Copy, Default)]
pub struct IfCond<T = ConstantThreshold> {
    threshold: T,
}

impl<T> IfCond<T> {
    pub fn new(threshold: T) -> Self {
        Self { threshold }
    }
}

impl<T: ThresholdModel> NeuronModel for IfCond<T> {
    type State = IfState;
    type Params = IfCondParams<T::Params>;

    fn model_name(&self) -> &'static str {
        "if_cond"
    }

    #[inline]
    fn update(
        &self,
        state: &mut IfState,
        params: &Self::Params,
        exc_input: S1615,
        inh_input: S1615,
        ext_current: S1615,
    ) -> bool {
        let exc = mul_s1615(exc_input, params.v_rev_exc.wrapping_sub(state.v));
        let inh = mul_s1615(inh_input, params.v_rev_inh.wrapping_sub(state.v));
        let input = exc
            .wrapping_add(inh)
            .wrapping_add(ext_current)
            .wrapping_add(params.membrane.i_offset);
        integrate(&self.threshold, state, &params.membrane, input)
    }

    fn membrane_voltage(&self, state: &IfState) -> S1615 {
        state.v
    }
}

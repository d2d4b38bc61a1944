// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exponentially decaying current synapses (one excitatory and one inhibitory receptor)

use super::traits::{check_words, ModelParameters, SynapseModel, WordState};
use crate::error::{NeuralError, Result};
use crate::fixed::{mul_s1615, S1615, S1615_ONE};

/// Receptor index of the excitatory input
pub const RECEPTOR_EXC: u32 = 0;
/// Receptor index of the inhibitory input
pub const RECEPTOR_INH: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpSynapseState {
    pub i_exc: S1615,
    pub i_inh: S1615,
}

impl WordState for ExpSynapseState {
    const WORDS: usize = 2;

    fn from_words(words: &[u32]) -> Result<Self> {
        check_words(words, Self::WORDS)?;
        Ok(Self {
            i_exc: words[0] as i32,
            i_inh: words[1] as i32,
        })
    }

    fn write_words(&self, out: &mut Vec<u32>) {
        out.push(self.i_exc as u32);
        out.push(self.i_inh as u32);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpSynapseParams {
    /// e^(-dt/τexc)
    pub exp_tau_exc: S1615,
    /// Scale applied when reading the excitatory current
    pub init_exc: S1615,
    pub exp_tau_inh: S1615,
    pub init_inh: S1615,
}

impl WordState for ExpSynapseParams {
    const WORDS: usize = 4;

    fn from_words(words: &[u32]) -> Result<Self> {
        check_words(words, Self::WORDS)?;
        Ok(Self {
            exp_tau_exc: words[0] as i32,
            init_exc: words[1] as i32,
            exp_tau_inh: words[2] as i32,
            init_inh: words[3] as i32,
        })
    }

    fn write_words(&self, out: &mut Vec<u32>) {
        out.extend_from_slice(&[
            self.exp_tau_exc as u32,
            self.init_exc as u32,
            self.exp_tau_inh as u32,
            self.init_inh as u32,
        ]);
    }
}

impl ModelParameters for ExpSynapseParams {
    fn validate(&self) -> Result<()> {
        let decay = 0..=S1615_ONE;
        if !decay.contains(&self.exp_tau_exc) || !decay.contains(&self.exp_tau_inh) {
            return Err(NeuralError::InvalidParameter {
                model: "exp_synapse",
                reason: "decay factors must be in [0, 1]",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpSynapse;

impl SynapseModel for ExpSynapse {
    type State = ExpSynapseState;
    type Params = ExpSynapseParams;

    fn model_name(&self) -> &'static str {
        "exp_synapse"
    }

    #[inline]
    fn shape(&self, state: &mut ExpSynapseState, params: &ExpSynapseParams) {
        state.i_exc = mul_s1615(state.i_exc, params.exp_tau_exc);
        state.i_inh = mul_s1615(state.i_inh, params.exp_tau_inh);
    }

    /// Unknown receptors are ignored
    #[inline]
    fn apply_input(
        &self,
        state: &mut ExpSynapseState,
        _params: &ExpSynapseParams,
        input: S1615,
        receptor: u32,
    ) {
        match receptor {
            RECEPTOR_EXC => state.i_exc = state.i_exc.wrapping_add(input),
            RECEPTOR_INH => state.i_inh = state.i_inh.wrapping_add(input),
            _ => {}
        }
    }

    #[inline]
    fn exc_input(&self, state: &ExpSynapseState, params: &ExpSynapseParams) -> S1615 {
        mul_s1615(state.i_exc, params.init_exc)
    }

    #[inline]
    fn inh_input(&self, state: &ExpSynapseState, params: &ExpSynapseParams) -> S1615 {
        mul_s1615(state.i_inh, params.init_inh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: ExpSynapseParams = ExpSynapseParams {
        exp_tau_exc: S1615_ONE / 2,
        init_exc: 2 * S1615_ONE,
        exp_tau_inh: S1615_ONE / 4,
        init_inh: S1615_ONE,
    };

    #[test]
    fn test_input_decays_per_tick() {
        let mut state = ExpSynapseState::default();
        ExpSynapse.apply_input(&mut state, &PARAMS, S1615_ONE, RECEPTOR_EXC);
        ExpSynapse.apply_input(&mut state, &PARAMS, S1615_ONE, RECEPTOR_INH);
        assert_eq!(ExpSynapse.exc_input(&state, &PARAMS), 2 * S1615_ONE);
        ExpSynapse.shape(&mut state, &PARAMS);
        assert_eq!(state.i_exc, S1615_ONE / 2);
        assert_eq!(state.i_inh, S1615_ONE / 4);
        assert_eq!(ExpSynapse.inh_input(&state, &PARAMS), S1615_ONE / 4);
    }

    #[test]
    fn test_unknown_receptor_ignored() {
        let mut state = ExpSynapseState::default();
        ExpSynapse.apply_input(&mut state, &PARAMS, S1615_ONE, 7);
        assert_eq!(state, ExpSynapseState::default());
    }
}

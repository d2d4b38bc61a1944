// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Current-based Integrate-and-Fire
//!
//! ```text
//! Outside the refractory period:
//!     alpha = (I_exc - I_inh + I_ext + I_offset) × R_membrane + V_rest
//!     V     = alpha - expTC × (alpha - V)
//!
//! Threshold crossed:
//!     V = V_reset, refractory countdown = T_refractory ticks
//! ```
//!
//! During the countdown the membrane is held and the countdown decrements once per tick.

use super::threshold::{ConstantThreshold, ThresholdModel};
use super::traits::{check_words, ModelParameters, NeuronModel, WordState};
use crate::error::{NeuralError, Result};
use crate::fixed::{mul_s1615, S1615, S1615_ONE};

/// Mutable state shared by the integrate-and-fire models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IfState {
    pub v: S1615,
    pub refractory_timer: i32,
}

impl WordState for IfState {
    const WORDS: usize = 2;

    fn from_words(words: &[u32]) -> Result<Self> {
        check_words(words, Self::WORDS)?;
        Ok(Self {
            v: words[0] as i32,
            refractory_timer: words[1] as i32,
        })
    }

    fn write_words(&self, out: &mut Vec<u32>) {
        out.push(self.v as u32);
        out.push(self.refractory_timer as u32);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfCurrParams<TP> {
    pub v_reset: S1615,
    pub v_rest: S1615,
    /// e^(-dt/τm)
    pub exp_tc: S1615,
    pub r_membrane: S1615,
    pub i_offset: S1615,
    /// Ticks
    pub t_refractory: i32,
    pub threshold: TP,
}

const IF_CURR_WORDS: usize = 6;

impl<TP: WordState> WordState for IfCurrParams<TP> {
    const WORDS: usize = IF_CURR_WORDS + TP::WORDS;

    fn from_words(words: &[u32]) -> Result<Self> {
        check_words(words, Self::WORDS)?;
        Ok(Self {
            v_reset: words[0] as i32,
            v_rest: words[1] as i32,
            exp_tc: words[2] as i32,
            r_membrane: words[3] as i32,
            i_offset: words[4] as i32,
            t_refractory: words[5] as i32,
            threshold: TP::from_words(&words[IF_CURR_WORDS..])?,
        })
    }

    fn write_words(&self, out: &mut Vec<u32>) {
        out.extend_from_slice(&[
            self.v_reset as u32,
            self.v_rest as u32,
            self.exp_tc as u32,
            self.r_membrane as u32,
            self.i_offset as u32,
            self.t_refractory as u32,
        ]);
        self.threshold.write_words(out);
    }
}

impl<TP: ModelParameters> ModelParameters for IfCurrParams<TP> {
    fn validate(&self) -> Result<()> {
        let invalid = |reason| NeuralError::InvalidParameter {
            model: "if_curr",
            reason,
        };
        if !(0..=S1615_ONE).contains(&self.exp_tc) {
            return Err(invalid("exp_tc must be in [0, 1]"));
        }
        if self.r_membrane < 0 {
            return Err(invalid("r_membrane must be non-negative"));
        }
        if self.t_refractory < 0 {
            return Err(invalid("t_refractory must be non-negative"));
        }
        self.threshold.validate()
    }
}

/// One integration step shared by the IF models; `input` is the total input current
#[inline(always)]
pub(crate) fn integrate<T: ThresholdModel>(
    threshold: &T,
    state: &mut IfState,
    params: &IfCurrParams<T::Params>,
    input: S1615,
) -> bool {
    if state.refractory_timer > 0 {
        state.refractory_timer -= 1;
        return false;
    }

    let alpha = mul_s1615(input, params.r_membrane).wrapping_add(params.v_rest);
    state.v = alpha.wrapping_sub(mul_s1615(params.exp_tc, alpha.wrapping_sub(state.v)));

    if threshold.has_crossed(state.v, &params.threshold) {
        state.v = params.v_reset;
        state.refractory_timer = params.t_refractory;
        return true;
    }
    false
}

/// Current-based leaky integrate-and-fire neuron
#[derive(Debug, Clone, Copy, Default)]
pub struct IfCurr<T = ConstantThreshold> {
    threshold: T,
}

impl<T> IfCurr<T> {
    pub fn new(threshold: T) -> Self {
        Self { threshold }
    }
}

impl<T: ThresholdModel> NeuronModel for IfCurr<T> {
    type State = IfState;
    type Params = IfCurrParams<T::Params>;

    fn model_name(&self) -> &'static str {
        "if_curr"
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
        let input = exc_input
            .wrapping_sub(inh_input)
            .wrapping_add(ext_current)
            .wrapping_add(params.i_offset);
        integrate(&self.threshold, state, params, input)
    }

    fn membrane_voltage(&self, state: &IfState) -> S1615 {
        state.v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::threshold::ConstantThresholdParams;

    fn params(t_refractory: i32) -> IfCurrParams<ConstantThresholdParams> {
        IfCurrParams {
            v_reset: 0,
            v_rest: 0,
            exp_tc: S1615_ONE / 2,
            r_membrane: S1615_ONE,
            i_offset: 0,
            t_refractory,
            threshold: ConstantThresholdParams {
                v_threshold: S1615_ONE,
            },
        }
    }

    #[test]
    fn test_relaxes_towards_alpha() {
        let model = IfCurr::<ConstantThreshold>::default();
        let params = params(0);
        let mut state = IfState::default();
        // alpha = 0.5, v = 0.5 - 0.5·(0.5 - 0) = 0.25
        assert!(!model.update(&mut state, &params, S1615_ONE / 2, 0, 0));
        assert_eq!(state.v, S1615_ONE / 4);
        assert!(!model.update(&mut state, &params, S1615_ONE / 2, 0, 0));
        assert_eq!(state.v, 3 * S1615_ONE / 8);
    }

    #[test]
    fn test_spike_resets_and_holds_for_refractory_period() {
        let model = IfCurr::<ConstantThreshold>::default();
        let params = params(2);
        let mut state = IfState::default();
        let drive = 4 * S1615_ONE;

        assert!(model.update(&mut state, &params, drive, 0, 0));
        assert_eq!(state.v, 0);
        assert_eq!(state.refractory_timer, 2);

        // Two held ticks, then integration resumes
        assert!(!model.update(&mut state, &params, drive, 0, 0));
        assert!(!model.update(&mut state, &params, drive, 0, 0));
        assert_eq!(state.v, 0);
        assert!(model.update(&mut state, &params, drive, 0, 0));
    }

    #[test]
    fn test_inhibition_subtracts() {
        let model = IfCurr::<ConstantThreshold>::default();
        let params = params(0);
        let mut state = IfState::default();
        model.update(&mut state, &params, S1615_ONE, S1615_ONE, 0);
        assert_eq!(state.v, 0);
    }

    #[test]
    fn test_word_layout_round_trips() {
        let params = params(3);
        let mut words = Vec::new();
        params.write_words(&mut words);
        assert_eq!(words.len(), IfCurrParams::<ConstantThresholdParams>::WORDS);
        assert_eq!(words[5], 3);
        assert_eq!(IfCurrParams::from_words(&words).unwrap(), params);
        assert!(IfCurrParams::<ConstantThresholdParams>::from_words(&words[..6]).is_err());
    }

    #[test]
    fn test_validation() {
        let mut bad = params(0);
        bad.exp_tc = 2 * S1615_ONE;
        assert!(bad.validate().is_err());
        assert!(params(0).validate().is_ok());
    }
}

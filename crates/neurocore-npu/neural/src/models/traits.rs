// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Model traits shared by all kernels

use crate::error::{NeuralError, Result};
use crate::fixed::S1615;
use core::fmt::Debug;

/// A block of model data with a fixed word layout
pub trait WordState: Sized {
    /// Words occupied by one block
    const WORDS: usize;

    /// Decode from the first `WORDS` words of `words`
    fn from_words(words: &[u32]) -> Result<Self>;

    /// Append the encoded block to `out`
    fn write_words(&self, out: &mut Vec<u32>);
}

/// Fail unless `words` holds at least `expected` words
pub fn check_words(words: &[u32], expected: usize) -> Result<()> {
    if words.len() < expected {
        return Err(NeuralError::ShortWords {
            expected,
            found: words.len(),
        });
    }
    Ok(())
}

/// Parameter validation
pub trait ModelParameters {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Membrane dynamics of a point neuron
pub trait NeuronModel {
    type State: WordState + Clone + Debug;
    type Params: WordState + ModelParameters + Clone + Debug;

    fn model_name(&self) -> &'static str;

    /// Advance one tick; returns `true` if the neuron spiked
    fn update(
        &self,
        state: &mut Self::State,
        params: &Self::Params,
        exc_input: S1615,
        inh_input: S1615,
        ext_current: S1615,
    ) -> bool;

    fn membrane_voltage(&self, state: &Self::State) -> S1615;
}

/// Post-synaptic input shaping
pub trait SynapseModel {
    type State: WordState + Clone + Debug;
    type Params: WordState + ModelParameters + Clone + Debug;

    fn model_name(&self) -> &'static str;

    /// Decay the synaptic state by one tick
    fn shape(&self, state: &mut Self::State, params: &Self::Params);

    /// Add input (S1615) arriving on `receptor`
    fn apply_input(&self, state: &mut Self::State, params: &Self::Params, input: S1615, receptor: u32);

    fn exc_input(&self, state: &Self::State, params: &Self::Params) -> S1615;

    fn inh_input(&self, state: &Self::State, params: &Self::Params) -> S1615;
}

/// Analogue recording channels of the neuron processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Recordable {
    MembraneVoltage = 0,
    ExcInput = 1,
    InhInput = 2,
    ExtCurrent = 3,
}

impl Recordable {
    pub const COUNT: usize = 4;
    pub const ALL: [Recordable; Self::COUNT] = [
        Recordable::MembraneVoltage,
        Recordable::ExcInput,
        Recordable::InhInput,
        Recordable::ExtCurrent,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

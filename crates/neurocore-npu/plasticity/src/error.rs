// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for row processing

use neurocore_hal::HalError;
use neurocore_npu_neural::NeuralError;
use neurocore_npu_runtime::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlasticityError {
    /// A fetched row is shorter than its own synapse count implies
    #[error("synaptic row too short: {num_synapses} synapses need {needed} words, have {available}")]
    RowTooShort {
        num_synapses: u32,
        needed: usize,
        available: usize,
    },

    /// The plasticity region names a rule this build does not provide
    #[error("unknown {kind} rule {id}")]
    UnknownRule { kind: &'static str, id: u32 },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<HalError> for PlasticityError {
    fn from(e: HalError) -> Self {
        Self::Runtime(e.into())
    }
}

impl From<NeuralError> for PlasticityError {
    fn from(e: NeuralError) -> Self {
        Self::Runtime(e.into())
    }
}

pub type Result<T> = core::result::Result<T, PlasticityError>;

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for neural computation

/// Neural computation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NeuralError {
    /// A model parameter block failed validation
    #[error("invalid {model} parameter: {reason}")]
    InvalidParameter {
        model: &'static str,
        reason: &'static str,
    },

    /// A word slice is too short for the structure read from it
    #[error("expected {expected} words, found {found}")]
    ShortWords { expected: usize, found: usize },
}

/// Result type for neural computation
pub type Result<T> = core::result::Result<T, NeuralError>;

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for runtime operations
//!
//! Every variant here is fatal at startup: a role that fails to parse its image never enters
//! the event loop. Recoverable conditions during simulation are counted in statistics instead.

use neurocore_hal::HalError;
use neurocore_npu_neural::NeuralError;

/// Runtime errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// Word 0 of the image is not the expected magic number
    #[error("config header invalid: magic 0x{found:08x}, expected 0x{expected:08x}")]
    ConfigHeaderInvalid { found: u32, expected: u32 },

    /// A region offset is misaligned or points outside the image
    #[error("region {region} has invalid offset 0x{offset:08x}")]
    RegionOffsetInvalid { region: &'static str, offset: u32 },

    /// A region the role cannot run without is absent
    #[error("required region {region} is missing")]
    MissingRegion { region: &'static str },

    /// Region content is shorter than its own header claims
    #[error("region {region} too short: need {needed} words, have {available}")]
    RegionTooShort {
        region: &'static str,
        needed: u32,
        available: u32,
    },

    /// A configuration value is outside what the role supports
    #[error("invalid {what}: {reason}")]
    InvalidParameter { what: &'static str, reason: String },

    /// Memory access or allocation failure
    #[error(transparent)]
    Hal(#[from] HalError),

    /// Model parameter validation failure
    #[error(transparent)]
    Neural(#[from] NeuralError),
}

impl RuntimeError {
    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            what,
            reason: reason.into(),
        }
    }

    /// True for failures of the DTCM allocator
    pub fn is_alloc_failure(&self) -> bool {
        matches!(self, Self::Hal(HalError::AllocFailure { .. }))
    }
}

/// Result type for runtime operations
pub type Result<T> = core::result::Result<T, RuntimeError>;

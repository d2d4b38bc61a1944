// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for role start-up and the host kernel

use neurocore_hal::{CoreId, ExitCode, HalError};
use neurocore_npu_neural::NeuralError;
use neurocore_npu_plasticity::PlasticityError;
use neurocore_npu_runtime::RuntimeError;

/// Failure to bring a role up; the core exits with [`RoleError::exit_code`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Plasticity(#[from] PlasticityError),

    /// The role needs something the image does not provide
    #[error("{role}: {reason}")]
    Unsupported { role: &'static str, reason: String },
}

impl From<HalError> for RoleError {
    fn from(e: HalError) -> Self {
        Self::Runtime(e.into())
    }
}

impl From<NeuralError> for RoleError {
    fn from(e: NeuralError) -> Self {
        Self::Runtime(e.into())
    }
}

impl RoleError {
    pub fn unsupported(role: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            role,
            reason: reason.into(),
        }
    }

    /// Non-zero exit status reported by the core
    pub fn exit_code(&self) -> ExitCode {
        let alloc = match self {
            Self::Runtime(e) => e.is_alloc_failure(),
            Self::Plasticity(PlasticityError::Runtime(e)) => e.is_alloc_failure(),
            _ => false,
        };
        if alloc {
            ExitCode::ALLOC_FAILURE
        } else {
            ExitCode::CONFIG_INVALID
        }
    }
}

/// Misuse of the host kernel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    #[error("core {0} is already loaded")]
    CoreInUse(CoreId),

    #[error("core {0} is not loaded")]
    UnknownCore(CoreId),

    #[error("tag {tag} of core {core} is already allocated")]
    TagInUse { core: CoreId, tag: u32 },

    #[error(transparent)]
    Hal(#[from] HalError),

    #[error("failed to start machine thread: {0}")]
    Spawn(String),

    #[error("machine thread has stopped")]
    Disconnected,
}

pub type Result<T> = core::result::Result<T, RoleError>;

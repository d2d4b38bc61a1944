// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Model Kernels
//!
//! Neuron dynamics are generic over a threshold model and composed with a synapse model and an
//! intrinsic-plasticity model by the neuron processor, all with static dispatch. Every model
//! splits its per-neuron data into a mutable state block and an immutable parameter block, each
//! read from (and the state written back to) SDRAM as plain words.

pub mod exp_synapse;
pub mod if_cond;
pub mod if_curr;
pub mod intrinsic_plasticity;
pub mod threshold;
pub mod traits;

pub use exp_synapse::{ExpSynapse, ExpSynapseParams, ExpSynapseState};
pub use if_cond::{IfCond, IfCondParams};
pub use if_curr::{IfCurr, IfCurrParams, IfState};
pub use intrinsic_plasticity::{IntrinsicPlasticity, NoIntrinsicPlasticity};
pub use threshold::{ConstantThreshold, ConstantThresholdParams, ThresholdModel};
pub use traits::{ModelParameters, NeuronModel, Recordable, SynapseModel, WordState};

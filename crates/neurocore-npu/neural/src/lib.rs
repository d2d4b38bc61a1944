// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore Neural Computation (Platform-Agnostic)
//!
//! Everything a role needs to compute, with no knowledge of memory layout or events:
//! - **Fixed point**: S1615 / U032 / S2011 arithmetic, `exp`, `ln`, reciprocal, sqrt
//! - **Lookup tables**: exponential-decay tables used by synapses and STDP
//! - **Bit-fields**: packed boolean vectors shared with SDRAM
//! - **Random**: the MarsKiss64 generator and non-uniform variates
//! - **Models**: neuron, synapse, threshold and intrinsic-plasticity kernels
//!
//! No floating point is used anywhere in this crate.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bitfield;
pub mod error;
pub mod exp_decay_lut;
pub mod fixed;
pub mod models;
pub mod random;

pub use bitfield::BitField;
pub use error::{NeuralError, Result};
pub use exp_decay_lut::ExpDecayLut;
pub use fixed::{
    exp_s1615, ln_s1615, log_fact, mul16_s2011, mul_s1615, mul_s1615_u032, mul_u032,
    reciprocal_s1615, sqrt_s1615, WeightFormat, S1615, S1615_ONE, S2011, S2011_ONE, U032,
};
pub use models::{
    ConstantThreshold, ExpSynapse, IfCond, IfCurr, IntrinsicPlasticity, ModelParameters,
    NeuronModel, NoIntrinsicPlasticity, Recordable, SynapseModel, ThresholdModel, WordState,
};
pub use random::{MarsKiss64, RandomSource};

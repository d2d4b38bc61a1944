// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reproducible random numbers
//!
//! Every draw comes from a caller-owned generator seeded from the config image, so identical
//! seeds give identical spike trains on every run.

pub mod mars_kiss64;
pub mod non_uniform;

pub use mars_kiss64::MarsKiss64;
pub use non_uniform::{
    binomial, binomial_fraction, exponential, hypergeometric, normal, poisson, uniform_below,
};

/// Source of uniform 32-bit words (interpreted as U032 in [0, 1))
pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike threshold models

use super::traits::{check_words, ModelParameters, WordState};
use crate::error::Result;
use crate::fixed::S1615;
use core::fmt::Debug;

pub trait ThresholdModel {
    type Params: WordState + ModelParameters + Clone + Debug;

    fn has_crossed(&self, v: S1615, params: &Self::Params) -> bool;
}

/// Fixed voltage threshold: spike when `v >= vThreshold`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantThreshold;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantThresholdParams {
    pub v_threshold: S1615,
}

impl WordState for ConstantThresholdParams {
    const WORDS: usize = 1;

    fn from_words(words: &[u32]) -> Result<Self> {
        check_words(words, Self::WORDS)?;
        Ok(Self {
            v_threshold: words[0] as i32,
        })
    }

    fn write_words(&self, out: &mut Vec<u32>) {
        out.push(self.v_threshold as u32);
    }
}

impl ModelParameters for ConstantThresholdParams {}

impl ThresholdModel for ConstantThreshold {
    type Params = ConstantThresholdParams;

    #[inline(always)]
    fn has_crossed(&self, v: S1615, params: &Self::Params) -> bool {
        v >= params.v_threshold
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Ring Buffer
//!
//! Per-(tick, post-neuron) accumulator of synaptic input, `2^(D+I)` cells in the runtime weight
//! format:
//!
//! ```text
//! index(tick, i) = ((tick & (2^D - 1)) << I) | i
//! ```
//!
//! The `2^I` cells of a tick's slot are read out at that tick and cleared before the slot is
//! indexed again `2^D` ticks later. Additions wrap, so the order in which rows deposit into a
//! cell never matters.

use crate::error::{Result, RuntimeError};
use neurocore_hal::Dtcm;

/// Delay bits of the synaptic word format
pub const DEFAULT_DELAY_BITS: u32 = 3;
/// Post-neuron index bits of the synaptic word format
pub const DEFAULT_INDEX_BITS: u32 = 10;

#[derive(Debug, Clone)]
pub struct RingBuffer {
    cells: Vec<i32>,
    delay_bits: u32,
    index_bits: u32,
}

impl RingBuffer {
    pub fn new(delay_bits: u32, index_bits: u32) -> Self {
        Self {
            cells: vec![0; 1 << (delay_bits + index_bits)],
            delay_bits,
            index_bits,
        }
    }

    pub fn allocate(delay_bits: u32, index_bits: u32, dtcm: &mut Dtcm) -> Result<Self> {
        if delay_bits + index_bits > 20 {
            return Err(RuntimeError::invalid(
                "ring buffer",
                format!("2^({delay_bits}+{index_bits}) cells exceed core memory"),
            ));
        }
        Ok(Self {
            cells: dtcm.alloc(1 << (delay_bits + index_bits), 0)?,
            delay_bits,
            index_bits,
        })
    }

    pub fn delay_bits(&self) -> u32 {
        self.delay_bits
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    /// Cells per tick slot
    pub fn slice_len(&self) -> usize {
        1 << self.index_bits
    }

    #[inline(always)]
    fn slot_start(&self, tick: u32) -> usize {
        ((tick & ((1 << self.delay_bits) - 1)) as usize) << self.index_bits
    }

    #[inline(always)]
    pub fn index(&self, tick: u32, neuron: u32) -> usize {
        self.slot_start(tick) | (neuron & ((1 << self.index_bits) - 1)) as usize
    }

    #[inline(always)]
    pub fn add_weight(&mut self, tick: u32, neuron: u32, weight: i32) {
        let index = self.index(tick, neuron);
        self.cells[index] = self.cells[index].wrapping_add(weight);
    }

    pub fn output_slice(&self, tick: u32) -> &[i32] {
        let start = self.slot_start(tick);
        &self.cells[start..start + self.slice_len()]
    }

    pub fn clear_output(&mut self, tick: u32) {
        let start = self.slot_start(tick);
        let len = self.slice_len();
        self.cells[start..start + len].fill(0);
    }

    /// Copy the tick's slot into `out` as raw words
    pub fn copy_output(&self, tick: u32, out: &mut Vec<u32>) {
        out.clear();
        out.extend(self.output_slice(tick).iter().map(|&w| w as u32));
    }
}

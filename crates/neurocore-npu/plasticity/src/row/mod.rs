// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synaptic Row Processing
//!
//! A row lists every synapse leaving one pre-synaptic neuron. All rows start with the same
//! header:
//!
//! ```text
//! [numSynapses, delayExtTick, delayExtOffset, ...]
//! ```
//!
//! `delayExtTick` (relative to the processing tick, 0 = none) and `delayExtOffset` (a packed
//! row-offset-length from the matrix base) chain a second row for delays the synaptic word
//! cannot express.

pub mod static_row;
pub mod stdp_row;

pub use static_row::StaticRowProcessor;
pub use stdp_row::StdpRowProcessor;

use crate::error::{PlasticityError, Result};
use neurocore_npu_runtime::{RingBuffer, RowOffsetLength};

/// Words shared by every row format before the synapses
pub const ROW_HEADER_WORDS: usize = 3;

const NUM_SYNAPSES: usize = 0;
const DELAY_EXT_TICK: usize = 1;
const DELAY_EXT_OFFSET: usize = 2;

/// Row to be re-queued for a later tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayExtension {
    /// Absolute tick the row is due
    pub tick: u32,
    pub row: RowOffsetLength,
    pub flush: bool,
}

/// What the pipeline must do after a row has been processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowOutcome {
    pub delay_extension: Option<DelayExtension>,
    /// The row changed from this word to its end and must be written back to SDRAM
    pub write_back_from: Option<usize>,
    /// Weights added to the ring buffer
    pub weights_deposited: u32,
}

/// Processes fetched rows of one format
pub trait RowProcessor {
    fn name(&self) -> &'static str;

    /// Words in a row of `num_synapses` synapses
    fn row_words(&self, num_synapses: u32) -> u32;

    /// Apply a row fetched on `tick`; `flush` rows update plasticity state without depositing
    fn process_row(
        &mut self,
        tick: u32,
        row: &mut [u32],
        flush: bool,
        ring: &mut RingBuffer,
    ) -> Result<RowOutcome>;

    /// Record that post-synaptic `neuron` spiked on `tick`
    fn add_post_synaptic_spike(&mut self, _tick: u32, _neuron: u32) {}
}

/// Number of synapses and delay extension of a row, checking it is complete
pub(crate) fn read_header(
    row: &[u32],
    tick: u32,
    flush: bool,
    row_words: impl Fn(u32) -> u32,
) -> Result<(usize, Option<DelayExtension>)> {
    let num_synapses = row.get(NUM_SYNAPSES).copied().unwrap_or(0);
    let needed = row_words(num_synapses) as usize;
    if row.len() < needed.max(ROW_HEADER_WORDS) {
        return Err(PlasticityError::RowTooShort {
            num_synapses,
            needed,
            available: row.len(),
        });
    }
    let ext_tick = row[DELAY_EXT_TICK];
    let extension = (ext_tick != 0).then(|| DelayExtension {
        tick: tick.wrapping_add(ext_tick),
        row: RowOffsetLength(row[DELAY_EXT_OFFSET]),
        flush,
    });
    Ok((num_synapses as usize, extension))
}

/// Header words of a new row
pub fn encode_header(num_synapses: usize, extension: Option<(u32, RowOffsetLength)>) -> [u32; 3] {
    let (ext_tick, ext_offset) = extension.map_or((0, 0), |(t, r)| (t, r.0));
    [num_synapses as u32, ext_tick, ext_offset]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_extension_is_relative() {
        let row = [0, 3, RowOffsetLength::new(8, 2).0];
        let (n, ext) = read_header(&row, 5, false, |n| 3 + n).unwrap();
        assert_eq!(n, 0);
        let ext = ext.unwrap();
        assert_eq!(ext.tick, 8);
        assert_eq!(ext.row.word_offset(), 16);
        assert_eq!(ext.row.num_synapses(), 2);
    }

    #[test]
    fn test_truncated_row_rejected() {
        let row = [4, 0, 0, 1, 2];
        assert!(matches!(
            read_header(&row, 0, false, |n| 3 + n),
            Err(PlasticityError::RowTooShort { needed: 7, .. })
        ));
    }
}

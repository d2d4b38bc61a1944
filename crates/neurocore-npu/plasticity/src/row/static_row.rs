// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static rows: `[numSynapses, delayExtTick, delayExtOffset, synapticWord × numSynapses]`

use super::{encode_header, read_header, RowOutcome, RowProcessor, ROW_HEADER_WORDS};
use crate::error::Result;
use crate::synaptic_word::{clamp_delay, Synapse, SynapticWordFormat};
use neurocore_npu_runtime::{RingBuffer, RowOffsetLength};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct StaticRowProcessor {
    format: SynapticWordFormat,
}

impl StaticRowProcessor {
    pub fn new(format: SynapticWordFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &SynapticWordFormat {
        &self.format
    }

    /// Encode a row
    pub fn encode_row(
        format: &SynapticWordFormat,
        synapses: &[Synapse],
        extension: Option<(u32, RowOffsetLength)>,
    ) -> Vec<u32> {
        let mut words = encode_header(synapses.len(), extension).to_vec();
        words.extend(synapses.iter().map(|&s| format.encode(s)));
        words
    }
}

impl RowProcessor for StaticRowProcessor {
    fn name(&self) -> &'static str {
        "static"
    }

    fn row_words(&self, num_synapses: u32) -> u32 {
        // A corrupt count saturates to a length no fetched row can have
        (ROW_HEADER_WORDS as u32)
            .checked_add(num_synapses)
            .unwrap_or(u32::MAX)
    }

    fn process_row(
        &mut self,
        tick: u32,
        row: &mut [u32],
        flush: bool,
        ring: &mut RingBuffer,
    ) -> Result<RowOutcome> {
        let (num_synapses, delay_extension) = read_header(row, tick, flush, |n| self.row_words(n))?;
        let mut outcome = RowOutcome {
            delay_extension,
            ..Default::default()
        };
        if flush {
            return Ok(outcome);
        }
        for &word in &row[ROW_HEADER_WORDS..ROW_HEADER_WORDS + num_synapses] {
            let synapse = self.format.decode(word);
            ring.add_weight(
                tick.wrapping_add(clamp_delay(synapse.delay)),
                synapse.index,
                self.format.clamp_weight(synapse.weight),
            );
        }
        outcome.weights_deposited = num_synapses as u32;
        trace!(tick, num_synapses, "Static row processed");
        Ok(outcome)
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Analogue recording of one channel
//!
//! ```text
//! region: [samplingInterval, indicesBitField × ceil(n/32), samples...]
//! ```
//!
//! Every `samplingInterval` ticks (starting at tick 0) the value of each selected neuron is
//! appended in neuron order. An interval of 0 disables the channel.

use crate::config::ensure_len;
use crate::error::Result;
use neurocore_hal::{Dtcm, MemoryRegion};
use neurocore_npu_neural::{bitfield, BitField};
use tracing::warn;

#[derive(Debug, Default)]
pub struct AnalogueRecorder {
    samples: Option<MemoryRegion>,
    indices: BitField,
    sampling_interval: u32,
    countdown: u32,
    position: u32,
    truncated: bool,
}

impl AnalogueRecorder {
    pub fn read(region: Option<&MemoryRegion>, num_neurons: usize, dtcm: &mut Dtcm) -> Result<Self> {
        let Some(region) = region else {
            return Ok(Self::default());
        };
        let index_words = bitfield::words_for(num_neurons) as u32;
        ensure_len(region, "AnalogueRecording", 1 + index_words)?;
        let mut cursor = region.cursor();
        let sampling_interval = cursor.read_u32()?;
        dtcm.charge(index_words as usize * 4)?;
        let indices = BitField::from_words(cursor.read_words(index_words)?, num_neurons);
        Ok(Self {
            samples: Some(cursor.rest()?),
            indices,
            sampling_interval,
            ..Default::default()
        })
    }

    /// Region words sampling `indices` every `interval` ticks with room for `sample_words`
    pub fn layout(interval: u32, indices: &BitField, sample_words: u32) -> Vec<u32> {
        let mut words = vec![interval];
        words.extend_from_slice(indices.words());
        words.resize(words.len() + sample_words as usize, 0);
        words
    }

    /// True if this tick is a sampling tick
    pub fn is_sampling(&self) -> bool {
        self.samples.is_some() && self.sampling_interval > 0 && self.countdown == 0
    }

    #[inline]
    pub fn record(&mut self, neuron: usize, value: i32) {
        if !self.is_sampling() || !self.indices.test(neuron) {
            return;
        }
        let Some(samples) = &self.samples else {
            return;
        };
        if self.position < samples.len_words() {
            let _ = samples.write(self.position, value as u32);
            self.position += 1;
        } else if !self.truncated {
            self.truncated = true;
            warn!(words = samples.len_words(), "Analogue recording full, truncating");
        }
    }

    /// Advance the sampling countdown
    pub fn end_tick(&mut self) {
        if self.sampling_interval == 0 {
            return;
        }
        if self.countdown == 0 {
            self.countdown = self.sampling_interval - 1;
        } else {
            self.countdown -= 1;
        }
    }

    pub fn samples_written(&self) -> u32 {
        self.position
    }

    /// Neurons sampled per sampling tick
    pub fn samples_per_tick(&self) -> usize {
        self.indices.count()
    }
}

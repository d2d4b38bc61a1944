// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike recording
//!
//! ```text
//! region: [numWords, indicesBitField × numWords, stream...]
//! ```
//!
//! Every tick appends `ceil(recorded / 32)` words to the stream, bit `k` of the tick's bits
//! belonging to the `k`-th recorded neuron.

use crate::config::ensure_len;
use crate::error::Result;
use neurocore_hal::{Dtcm, MemoryRegion};
use neurocore_npu_neural::{bitfield, BitField};
use tracing::warn;

#[derive(Debug, Default)]
pub struct SpikeRecorder {
    stream: Option<MemoryRegion>,
    indices: BitField,
    word: u32,
    bit: u32,
    position: u32,
    truncated: bool,
}

impl SpikeRecorder {
    /// Recorder over an optional region; absent regions record nothing
    pub fn read(region: Option<&MemoryRegion>, dtcm: &mut Dtcm) -> Result<Self> {
        let Some(region) = region else {
            return Ok(Self::default());
        };
        ensure_len(region, "SpikeRecording", 1)?;
        let mut cursor = region.cursor();
        let num_words = cursor.read_u32()?;
        ensure_len(region, "SpikeRecording", 1 + num_words)?;
        dtcm.charge(num_words as usize * 4)?;
        let indices = BitField::from_words(cursor.read_words(num_words)?, num_words as usize * 32);
        Ok(Self {
            stream: Some(cursor.rest()?),
            indices,
            ..Default::default()
        })
    }

    /// Region words for recording the neurons set in `indices` with room for `stream_words`
    pub fn layout(indices: &BitField, stream_words: u32) -> Vec<u32> {
        let mut words = vec![indices.words().len() as u32];
        words.extend_from_slice(indices.words());
        words.resize(words.len() + stream_words as usize, 0);
        words
    }

    pub fn is_enabled(&self) -> bool {
        self.stream.is_some() && self.indices.count() > 0
    }

    /// Called for every neuron in index order each tick
    #[inline]
    pub fn record(&mut self, neuron: usize, spiked: bool) {
        if self.stream.is_none() || !self.indices.test(neuron) {
            return;
        }
        if spiked {
            self.word |= 1 << self.bit;
        }
        self.bit += 1;
        if self.bit == 32 {
            self.flush_word();
        }
    }

    /// Write out a partially filled word
    pub fn end_tick(&mut self) {
        if self.bit > 0 {
            self.flush_word();
        }
    }

    fn flush_word(&mut self) {
        if let Some(stream) = &self.stream {
            if self.position < stream.len_words() {
                // In range by the check above
                let _ = stream.write(self.position, self.word);
                self.position += 1;
            } else if !self.truncated {
                self.truncated = true;
                warn!(words = stream.len_words(), "Spike recording full, truncating");
            }
        }
        self.word = 0;
        self.bit = 0;
    }

    /// Stream words written so far
    pub fn words_written(&self) -> u32 {
        self.position
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Decode a spike recording region into the recorded neuron indices that spiked each tick
pub fn decode_spike_recording(region_words: &[u32], ticks: usize) -> Vec<Vec<usize>> {
    let Some((&num_words, rest)) = region_words.split_first() else {
        return Vec::new();
    };
    let num_words = (num_words as usize).min(rest.len());
    let (indices, stream) = rest.split_at(num_words);
    let recorded: Vec<usize> = bitfield::iter_set(indices).collect();
    let words_per_tick = bitfield::words_for(recorded.len());
    if words_per_tick == 0 {
        return vec![Vec::new(); ticks];
    }
    stream
        .chunks(words_per_tick)
        .take(ticks)
        .map(|tick_words| {
            bitfield::iter_set(tick_words)
                .filter_map(|k| recorded.get(k).copied())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurocore_hal::Sdram;

    fn recorder(sdram: &Sdram, recorded: &[usize], stream_words: u32) -> (SpikeRecorder, MemoryRegion) {
        let mut indices = BitField::new(40);
        for &n in recorded {
            indices.set(n);
        }
        let words = SpikeRecorder::layout(&indices, stream_words);
        let base = sdram.allocate(words.len() as u32 * 4).unwrap();
        let region = sdram.region(base, words.len() as u32 * 4).unwrap();
        region.write_slice(0, &words).unwrap();
        (SpikeRecorder::read(Some(&region), &mut Dtcm::default()).unwrap(), region)
    }

    #[test]
    fn test_only_recorded_neurons_take_bits() {
        let sdram = Sdram::new(1024);
        let (mut rec, region) = recorder(&sdram, &[1, 3, 35], 4);
        let ticks: [&[usize]; 3] = [&[1, 2], &[35], &[]];
        for tick_spikes in ticks {
            for n in 0..40 {
                rec.record(n, tick_spikes.contains(&n));
            }
            rec.end_tick();
        }
        assert_eq!(rec.words_written(), 3);
        let decoded = decode_spike_recording(&region.to_vec().unwrap(), 3);
        assert_eq!(decoded, vec![vec![1], vec![35], vec![]]);
    }

    #[test]
    fn test_full_stream_truncates() {
        let sdram = Sdram::new(1024);
        let (mut rec, _) = recorder(&sdram, &[0], 2);
        for _ in 0..5 {
            rec.record(0, true);
            rec.end_tick();
        }
        assert_eq!(rec.words_written(), 2);
        assert!(rec.is_truncated());
    }

    #[test]
    fn test_absent_region_records_nothing() {
        let mut rec = SpikeRecorder::read(None, &mut Dtcm::default()).unwrap();
        rec.record(0, true);
        rec.end_tick();
        assert!(!rec.is_enabled());
        assert_eq!(rec.words_written(), 0);
    }
}

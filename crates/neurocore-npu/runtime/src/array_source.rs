// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Array Spike Source
//!
//! Replays a precomputed spike raster: one bit-field of sources per tick.
//!
//! ```text
//! region: [numTicks, wordsPerTick, bitfield × numTicks]
//! ```
//!
//! Ticks past the end of the raster emit nothing.

use crate::config::ensure_len;
use crate::error::Result;
use neurocore_hal::MemoryRegion;
use neurocore_npu_neural::bitfield;

#[derive(Debug, Clone)]
pub struct ArraySource {
    region: MemoryRegion,
    num_ticks: u32,
    words_per_tick: u32,
    /// Scratch for one tick's bit-field
    tick_words: Vec<u32>,
}

impl ArraySource {
    pub fn read(region: &MemoryRegion, num_sources: usize) -> Result<Self> {
        ensure_len(region, "ArraySource", 2)?;
        let num_ticks = region.read(0)?;
        let words_per_tick = region.read(1)?;
        ensure_len(region, "ArraySource", 2 + num_ticks * words_per_tick)?;
        let scratch = (words_per_tick as usize).min(bitfield::words_for(num_sources));
        Ok(Self {
            region: region.tail(2)?,
            num_ticks,
            words_per_tick,
            tick_words: vec![0; scratch],
        })
    }

    /// Build the region words for `raster[tick]` = sources spiking on that tick
    pub fn encode(num_sources: usize, raster: &[Vec<usize>]) -> Vec<u32> {
        let words_per_tick = bitfield::words_for(num_sources);
        let mut words = vec![raster.len() as u32, words_per_tick as u32];
        for spikes in raster {
            let mut tick_words = vec![0u32; words_per_tick];
            for &source in spikes {
                bitfield::set_bit(&mut tick_words, source);
            }
            words.extend_from_slice(&tick_words);
        }
        words
    }

    pub fn num_ticks(&self) -> u32 {
        self.num_ticks
    }

    /// Call `emit(source, 1)` for every source spiking on `tick`
    pub fn update(&mut self, tick: u32, mut emit: impl FnMut(usize, u32)) -> Result<()> {
        if tick >= self.num_ticks || self.tick_words.is_empty() {
            return Ok(());
        }
        self.region
            .read_slice(tick * self.words_per_tick, &mut self.tick_words)?;
        for source in bitfield::iter_set(&self.tick_words) {
            emit(source, 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurocore_hal::Sdram;

    #[test]
    fn test_raster_replays_then_stops() {
        let raster = vec![vec![0, 33], vec![], vec![5]];
        let words = ArraySource::encode(40, &raster);
        let sdram = Sdram::new(256);
        let region = sdram.region(0, words.len() as u32 * 4).unwrap();
        region.write_slice(0, &words).unwrap();

        let mut source = ArraySource::read(&region, 40).unwrap();
        let mut spikes = Vec::new();
        for tick in 0..5 {
            source
                .update(tick, |s, _| spikes.push((tick, s)))
                .unwrap();
        }
        assert_eq!(spikes, vec![(0, 0), (0, 33), (2, 5)]);
    }
}

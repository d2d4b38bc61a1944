// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Flush events
//!
//! A neuron silent for longer than `flushTimeTicks` sends a flush packet so downstream STDP rows
//! are brought up to date without waiting for the next real spike.
//!
//! ```text
//! region: [flushTimeTicks]       u32::MAX disables flushing
//! ```

use crate::config::ensure_len;
use crate::error::Result;
use neurocore_hal::{Dtcm, MemoryRegion};

pub const FLUSH_DISABLED: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct FlushState {
    flush_time: u32,
    /// Ticks since each neuron last spiked or flushed
    time_since_last_spike: Vec<u32>,
}

impl FlushState {
    pub fn new(flush_time: u32, num_neurons: usize) -> Self {
        Self {
            flush_time,
            time_since_last_spike: if flush_time == FLUSH_DISABLED {
                Vec::new()
            } else {
                vec![0; num_neurons]
            },
        }
    }

    /// Read the region; an absent region disables flushing
    pub fn read(region: Option<&MemoryRegion>, num_neurons: usize, dtcm: &mut Dtcm) -> Result<Self> {
        let flush_time = match region {
            Some(region) => {
                ensure_len(region, "Flush", 1)?;
                region.read(0)?
            }
            None => FLUSH_DISABLED,
        };
        if flush_time != FLUSH_DISABLED {
            dtcm.charge(num_neurons * core::mem::size_of::<u32>())?;
        }
        Ok(Self::new(flush_time, num_neurons))
    }

    pub fn is_enabled(&self) -> bool {
        self.flush_time != FLUSH_DISABLED
    }

    pub fn flush_time(&self) -> u32 {
        self.flush_time
    }

    /// Advance `neuron` by one tick; true if it should send a flush instead of staying silent
    pub fn should_flush(&mut self, neuron: usize, spiked: bool) -> bool {
        let Some(elapsed) = self.time_since_last_spike.get_mut(neuron) else {
            return false;
        };
        if spiked {
            *elapsed = 0;
            return false;
        }
        *elapsed += 1;
        if *elapsed > self.flush_time {
            *elapsed = 0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_after_silence() {
        let mut flush = FlushState::new(3, 2);
        let pattern: Vec<bool> = (0..8).map(|_| flush.should_flush(0, false)).collect();
        assert_eq!(
            pattern,
            vec![false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_spike_resets_countdown() {
        let mut flush = FlushState::new(2, 1);
        assert!(!flush.should_flush(0, false));
        assert!(!flush.should_flush(0, false));
        assert!(!flush.should_flush(0, true));
        assert!(!flush.should_flush(0, false));
        assert!(!flush.should_flush(0, false));
        assert!(flush.should_flush(0, false));
    }

    #[test]
    fn test_disabled_never_flushes() {
        let mut flush = FlushState::read(None, 4, &mut Dtcm::default()).unwrap();
        assert!(!flush.is_enabled());
        assert!((0..100).all(|_| !flush.should_flush(1, false)));
    }
}

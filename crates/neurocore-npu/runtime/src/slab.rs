// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Double-buffered SDRAM slabs
//!
//! A writer fills slab `tick % 2` during `tick`; the reader consumes it during `tick + 1`, by
//! which time the writer has moved to the other slab.

use crate::error::Result;
use neurocore_hal::{RegionCursor, Sdram};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlabPair {
    /// Absolute SDRAM byte addresses
    pub buffers: [u32; 2],
}

impl SlabPair {
    /// Reserve two slabs of `words` words each
    pub fn allocate(sdram: &Sdram, words: u32) -> Result<Self> {
        Ok(Self {
            buffers: [sdram.allocate(words * 4)?, sdram.allocate(words * 4)?],
        })
    }

    pub fn read(cursor: &mut RegionCursor) -> Result<Self> {
        Ok(Self {
            buffers: [cursor.read_u32()?, cursor.read_u32()?],
        })
    }

    pub fn to_words(&self) -> [u32; 2] {
        self.buffers
    }

    /// Slab the writer fills during `tick`
    #[inline]
    pub fn write_slab(&self, tick: u32) -> u32 {
        self.buffers[(tick % 2) as usize]
    }

    /// Slab the reader consumes during `tick`
    #[inline]
    pub fn read_slab(&self, tick: u32) -> u32 {
        self.buffers[(tick.wrapping_add(1) % 2) as usize]
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Delay Extension Buffer
//!
//! Rows whose delay exceeds the ring buffer's reach are re-queued here for the tick on which
//! they become due. Each of the `numSlots` delay slots is an SDRAM array of up to `bufferSize`
//! row-offset-length descriptors; the descriptor count and a per-descriptor flush flag stay in
//! core.
//!
//! ```text
//! region: [numDelaySlots, bufferSize, slotBase × numDelaySlots]     (absolute byte addresses)
//! ```
//!
//! A slot that is full rejects further rows. The drop is remembered and reported when the slot
//! is next serviced.

use crate::circular_buffer::CircularBuffer;
use crate::config::ensure_len;
use crate::error::{Result, RuntimeError};
use crate::key_lookup::RowOffsetLength;
use neurocore_hal::{
    DmaDirection, DmaTag, Dtcm, MemoryRegion, Platform, Sdram,
};
use neurocore_npu_neural::bitfield;
use tracing::{error, trace};

/// A deferred row and whether it only carries a flush event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayRow {
    pub row: RowOffsetLength,
    pub flush: bool,
}

/// SDRAM placement of the delay slots, as written to the region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayBufferLayout {
    pub buffer_size: u32,
    pub slot_bases: Vec<u32>,
}

impl DelayBufferLayout {
    /// Reserve `num_slots` slot arrays of `buffer_size` descriptors
    pub fn allocate(sdram: &Sdram, num_slots: u32, buffer_size: u32) -> Result<Self> {
        let slot_bases = (0..num_slots)
            .map(|_| sdram.allocate(buffer_size * 4))
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            buffer_size,
            slot_bases,
        })
    }

    pub fn to_words(&self) -> Vec<u32> {
        let mut words = vec![self.slot_bases.len() as u32, self.buffer_size];
        words.extend_from_slice(&self.slot_bases);
        words
    }
}

#[derive(Debug)]
pub struct DelayBuffer {
    delay_mask: u32,
    buffer_size: u32,
    slots: Vec<MemoryRegion>,
    row_count: Vec<u32>,
    /// `numSlots × bufferSize` flush flags
    flush: Vec<u32>,
    /// Rows rejected per slot since it was last serviced
    dropped: Vec<u32>,
    /// DMA target, owned by the DMA engine while a fetch is in flight
    dma_buffer: Option<Vec<u32>>,
}

impl DelayBuffer {
    pub fn read(region: &MemoryRegion, dtcm: &mut Dtcm) -> Result<Self> {
        ensure_len(region, "DelayBuffer", 2)?;
        let mut cursor = region.cursor();
        let num_slots = cursor.read_u32()?;
        let buffer_size = cursor.read_u32()?;
        if !num_slots.is_power_of_two() {
            return Err(RuntimeError::invalid(
                "delay buffer",
                format!("{num_slots} slots is not a power of two"),
            ));
        }
        ensure_len(region, "DelayBuffer", 2 + num_slots)?;

        let sdram = region.sdram();
        let slots = cursor
            .read_words(num_slots)?
            .into_iter()
            .map(|base| sdram.region(base, buffer_size * 4))
            .collect::<core::result::Result<Vec<_>, _>>()?;

        let flush_bits = (num_slots * buffer_size) as usize;
        Ok(Self {
            delay_mask: num_slots - 1,
            buffer_size,
            slots,
            row_count: dtcm.alloc(num_slots as usize, 0)?,
            flush: dtcm.alloc(bitfield::words_for(flush_bits), 0)?,
            dropped: dtcm.alloc(num_slots as usize, 0)?,
            dma_buffer: Some(dtcm.alloc(buffer_size as usize, 0)?),
        })
    }

    pub fn num_slots(&self) -> u32 {
        self.delay_mask + 1
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    #[inline(always)]
    fn slot(&self, tick: u32) -> usize {
        (tick & self.delay_mask) as usize
    }

    #[inline(always)]
    fn flush_bit(&self, slot: usize, index: u32) -> usize {
        slot * self.buffer_size as usize + index as usize
    }

    pub fn row_count(&self, tick: u32) -> u32 {
        self.row_count[self.slot(tick)]
    }

    /// Queue `row` for `tick`; `false` (and the row is dropped) when the slot is full
    pub fn add_row(&mut self, tick: u32, row: RowOffsetLength, flush: bool) -> bool {
        let slot = self.slot(tick);
        let count = self.row_count[slot];
        if count >= self.buffer_size {
            self.dropped[slot] += 1;
            return false;
        }
        if let Err(e) = self.slots[slot].write(count, row.0) {
            error!(error = %e, slot, "Delay slot write failed");
            self.dropped[slot] += 1;
            return false;
        }
        let bit = self.flush_bit(slot, count);
        if flush {
            bitfield::set_bit(&mut self.flush, bit);
        } else {
            bitfield::clear_bit(&mut self.flush, bit);
        }
        self.row_count[slot] = count + 1;
        trace!(tick, slot, count = count + 1, flush, "Delay row queued");
        true
    }

    /// Start the DMA of this tick's descriptors; `false` if there is nothing to fetch
    pub fn fetch(&mut self, tick: u32, tag: DmaTag, platform: &mut dyn Platform) -> bool {
        let slot = self.slot(tick);
        let count = self.row_count[slot] as usize;
        if count == 0 {
            return false;
        }
        let Some(mut buffer) = self.dma_buffer.take() else {
            error!(tick, "Delay buffer fetch while a fetch is in flight");
            return false;
        };
        buffer.resize(count, 0);
        platform.dma_transfer(tag, self.slots[slot].base(), buffer, DmaDirection::Read);
        true
    }

    /// Queue the fetched descriptors for processing and reset the slot
    ///
    /// Returns the number of rows queued.
    pub fn process_dma_buffer(
        &mut self,
        tick: u32,
        buffer: Vec<u32>,
        queue: &mut CircularBuffer<DelayRow>,
    ) -> usize {
        let slot = self.slot(tick);
        let mut queued = 0;
        for (i, &word) in buffer.iter().enumerate() {
            let row = DelayRow {
                row: RowOffsetLength(word),
                flush: bitfield::test_bit(&self.flush, self.flush_bit(slot, i as u32)),
            };
            if queue.push(row) {
                queued += 1;
            } else {
                self.dropped[slot] += 1;
            }
        }
        self.row_count[slot] = 0;
        self.dma_buffer = Some(buffer);
        queued
    }

    /// Reset the slot of `tick`, returning the rows lost on it (overflow drops plus any
    /// descriptors never fetched)
    pub fn clear_slot(&mut self, tick: u32) -> u32 {
        let slot = self.slot(tick);
        let lost = self.dropped[slot] + self.row_count[slot];
        self.dropped[slot] = 0;
        self.row_count[slot] = 0;
        lost
    }
}

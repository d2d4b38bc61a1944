// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Spike Input Buffer
//!
//! Fixed-capacity single-producer/single-consumer queue of spike keys. The multicast handler
//! is the only producer and the row pipeline the only consumer, so the indices need nothing
//! stronger than acquire/release ordering. A full buffer rejects the key and leaves its
//! contents untouched; the caller counts the rejection.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use neurocore_hal::Dtcm;

use crate::error::Result;

#[derive(Debug)]
pub struct SpikeInputBuffer {
    slots: Box<[AtomicU32]>,
    /// Next slot to read (consumer-owned)
    head: AtomicUsize,
    /// Next slot to write (producer-owned)
    tail: AtomicUsize,
}

impl SpikeInputBuffer {
    /// Buffer holding up to `capacity` keys
    pub fn new(capacity: usize) -> Self {
        // One slot stays empty to tell full from empty
        let slots = (0..capacity + 1).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Allocate from the core's DTCM budget
    pub fn allocate(capacity: usize, dtcm: &mut Dtcm) -> Result<Self> {
        dtcm.charge((capacity + 1) * core::mem::size_of::<u32>())?;
        dtcm.charge_struct::<Self>()?;
        Ok(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() {
            0
        } else {
            next
        }
    }

    /// Producer side; `false` when full
    pub fn add_spike(&self, key: u32) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = self.advance(tail);
        if next == self.head.load(Ordering::Acquire) {
            return false;
        }
        self.slots[tail].store(key, Ordering::Relaxed);
        self.tail.store(next, Ordering::Release);
        true
    }

    /// Consumer side
    pub fn next_spike(&self) -> Option<u32> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        let key = self.slots[head].load(Ordering::Relaxed);
        self.head.store(self.advance(head), Ordering::Release);
        Some(key)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            self.slots.len() - head + tail
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

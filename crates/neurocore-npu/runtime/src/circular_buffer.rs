// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity in-core FIFO

use crate::error::Result;
use neurocore_hal::Dtcm;

#[derive(Debug, Clone)]
pub struct CircularBuffer<T> {
    slots: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> CircularBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn allocate(capacity: usize, dtcm: &mut Dtcm) -> Result<Self> {
        Ok(Self {
            slots: dtcm.alloc_default(capacity)?,
            head: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `false` when full
    pub fn push(&mut self, value: T) -> bool {
        if self.len == self.slots.len() {
            return false;
        }
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = value;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        Some(value)
    }

    /// Drop every queued item, returning how many there were
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.head = 0;
        self.len = 0;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_and_clear() {
        let mut buffer = CircularBuffer::<u32>::new(2);
        assert!(buffer.push(1));
        assert!(buffer.push(2));
        assert!(!buffer.push(3));
        assert_eq!(buffer.pop(), Some(1));
        assert!(buffer.push(3));
        assert_eq!(buffer.pop(), Some(2));
        assert_eq!(buffer.clear(), 1);
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_zero_capacity_rejects() {
        let mut buffer = CircularBuffer::<u32>::new(0);
        assert!(!buffer.push(1));
        assert_eq!(buffer.pop(), None);
    }
}

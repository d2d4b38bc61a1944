// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Single-shot bump allocator over core-local memory (DTCM)
//!
//! Every in-core array a role owns is charged against a fixed byte budget at startup. Nothing
//! is ever freed; running out of budget is a fatal configuration error reported before the
//! first tick.

use crate::error::{HalError, Result};
use core::mem::size_of;
use tracing::trace;

/// Default DTCM budget of the host kernel
pub const DEFAULT_DTCM_BYTES: usize = 256 * 1024;

/// DTCM budget tracker
#[derive(Debug, Clone)]
pub struct Dtcm {
    capacity: usize,
    used: usize,
}

impl Dtcm {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity: capacity_bytes,
            used: 0,
        }
    }

    /// Allocate `count` elements initialised to `value`
    pub fn alloc<T: Clone>(&mut self, count: usize, value: T) -> Result<Vec<T>> {
        self.charge(count.saturating_mul(size_of::<T>()))?;
        Ok(vec![value; count])
    }

    /// Allocate `count` default-initialised elements
    pub fn alloc_default<T: Clone + Default>(&mut self, count: usize) -> Result<Vec<T>> {
        self.alloc(count, T::default())
    }

    /// Charge a fixed-size structure that is stored by value
    pub fn charge_struct<T>(&mut self) -> Result<()> {
        self.charge(size_of::<T>())
    }

    /// Charge a raw byte count (rounded up to whole words)
    pub fn charge(&mut self, bytes: usize) -> Result<()> {
        let bytes = bytes.div_ceil(4) * 4;
        let available = self.remaining();
        if bytes > available {
            return Err(HalError::AllocFailure {
                requested: bytes,
                available,
            });
        }
        self.used += bytes;
        trace!(bytes, used = self.used, "DTCM allocation");
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }
}

impl Default for Dtcm {
    fn default() -> Self {
        Self::new(DEFAULT_DTCM_BYTES)
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Free-running cycle counter shared between a core's kernel and its profiler

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Cheap-to-clone handle to a core's cycle counter
#[derive(Debug, Clone, Default)]
pub struct CycleCounter {
    cycles: Arc<AtomicU32>,
}

impl CycleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> u32 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Advance by `cycles`, wrapping like the hardware counter
    pub fn advance(&self, cycles: u32) {
        self.cycles.fetch_add(cycles, Ordering::AcqRel);
    }
}

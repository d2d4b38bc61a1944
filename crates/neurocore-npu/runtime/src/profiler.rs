// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Profiler
//!
//! Cycle-stamped enter/exit samples written into the Profiler region:
//!
//! ```text
//! region: [numSamples, count, {cycleCounter, tag} × numSamples]
//! tag:    bit 31 set on enter, clear on exit
//! ```
//!
//! Samples beyond `numSamples` are counted but not stored. Writes happen with interrupts
//! masked so a handler that preempts a profiled section cannot interleave half a sample.

use crate::config::ensure_len;
use crate::error::Result;
use neurocore_hal::{CycleCounter, InterruptControl, IrqGuard, MemoryRegion, Platform};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Set in the tag word of an enter sample
pub const PROFILER_ENTER: u32 = 1 << 31;

const HEADER_WORDS: u32 = 2;

/// Sections profiled by the roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProfilerTag {
    TimerTick = 0,
    ProcessRow = 1,
    ProcessBackPropagation = 2,
    UpdateNeurons = 3,
    ApplyInput = 4,
    GenerateSpikes = 5,
}

#[derive(Debug)]
struct ProfilerState {
    region: MemoryRegion,
    capacity: u32,
    count: u32,
}

/// Handle to a role's profiler; cloning shares the sample buffer
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    state: Option<Arc<Mutex<ProfilerState>>>,
}

impl Profiler {
    /// A profiler over `region`, or a no-op one when the region is absent
    pub fn read(region: Option<&MemoryRegion>) -> Result<Self> {
        let Some(region) = region else {
            return Ok(Self::disabled());
        };
        ensure_len(region, "Profiler", HEADER_WORDS)?;
        let requested = region.read(0)?;
        let capacity = requested.min((region.len_words() - HEADER_WORDS) / 2);
        region.write(1, 0)?;
        debug!(requested, capacity, "Profiler enabled");
        Ok(Self {
            state: Some(Arc::new(Mutex::new(ProfilerState {
                region: region.clone(),
                capacity,
                count: 0,
            }))),
        })
    }

    pub fn disabled() -> Self {
        Self { state: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Samples taken so far, stored or not
    pub fn samples_taken(&self) -> u32 {
        self.state.as_ref().map_or(0, |s| s.lock().count)
    }

    /// Record one sample
    pub fn write_entry(&self, cycles: u32, tag: u32, irq: &InterruptControl) {
        let Some(state) = &self.state else {
            return;
        };
        let _guard = IrqGuard::new(irq);
        let mut state = state.lock();
        let index = state.count;
        if index < state.capacity {
            let at = HEADER_WORDS + 2 * index;
            // Bounds were established when the capacity was computed
            let _ = state.region.write_slice(at, &[cycles, tag]);
        }
        state.count = state.count.wrapping_add(1);
    }

    /// Profile a section until the returned scope drops
    pub fn scope(&self, tag: ProfilerTag, platform: &dyn Platform) -> ProfilerScope {
        let scope = ProfilerScope {
            profiler: self.clone(),
            tag: tag as u32,
            clock: platform.clock(),
            irq: platform.interrupts(),
        };
        self.write_entry(scope.clock.read(), scope.tag | PROFILER_ENTER, &scope.irq);
        scope
    }

    /// Write the stored sample count into the region header
    pub fn finalise(&self) -> Result<()> {
        if let Some(state) = &self.state {
            let state = state.lock();
            let stored = state.count.min(state.capacity);
            state.region.write(1, stored)?;
            debug!(taken = state.count, stored, "Profiler finalised");
        }
        Ok(())
    }
}

/// Exit sample is written when this drops
#[must_use = "the section ends as soon as the scope is dropped"]
pub struct ProfilerScope {
    profiler: Profiler,
    tag: u32,
    clock: CycleCounter,
    irq: Arc<InterruptControl>,
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        self.profiler
            .write_entry(self.clock.read(), self.tag, &self.irq);
    }
}

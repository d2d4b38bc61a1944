// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Statistics
//!
//! Recoverable errors and activity counts are accumulated in core and written to the
//! Statistics region, one word per counter in declaration order, when the role finalises.
//! Counters are updated inside an interrupt-masked critical section.

use crate::error::Result;
use core::fmt::Debug;
use core::marker::PhantomData;
use neurocore_hal::{InterruptControl, IrqGuard, MemoryRegion};
use tracing::info;

/// Counter index type of one role
pub trait StatisticId: Copy + Debug + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize;

    fn name(self) -> &'static str;
}

/// Define a role's counters as an enum implementing [`StatisticId`]
#[macro_export]
macro_rules! define_statistics {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $index:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $index,
            )*
        }

        impl $crate::statistics::StatisticId for $name {
            const ALL: &'static [Self] = &[$($name::$variant),*];

            fn index(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct Statistics<S: StatisticId> {
    counters: Vec<u32>,
    region: Option<MemoryRegion>,
    _marker: PhantomData<S>,
}

impl<S: StatisticId> Statistics<S> {
    /// Counters written to `region` at finalisation, or kept in core only when it is absent
    pub fn new(region: Option<&MemoryRegion>) -> Self {
        Self {
            counters: vec![0; S::ALL.len()],
            region: region.cloned(),
            _marker: PhantomData,
        }
    }

    pub fn increment(&mut self, id: S, irq: &InterruptControl) {
        self.add(id, 1, irq);
    }

    pub fn add(&mut self, id: S, value: u32, irq: &InterruptControl) {
        let _guard = IrqGuard::new(irq);
        if let Some(counter) = self.counters.get_mut(id.index()) {
            *counter = counter.wrapping_add(value);
        }
    }

    pub fn get(&self, id: S) -> u32 {
        self.counters.get(id.index()).copied().unwrap_or(0)
    }

    /// `(name, value)` for every counter
    pub fn snapshot(&self) -> Vec<(&'static str, u32)> {
        S::ALL.iter().map(|&id| (id.name(), self.get(id))).collect()
    }

    /// Write the counters to the region and log them
    pub fn finalise(&self, role: &'static str) -> Result<()> {
        info!(role, counters = ?self.snapshot(), "Final statistics");
        if let Some(region) = &self.region {
            let count = (self.counters.len() as u32).min(region.len_words());
            region.write_slice(0, &self.counters[..count as usize])?;
        }
        Ok(())
    }
}

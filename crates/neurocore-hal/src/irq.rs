// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Interrupt discipline
//!
//! Critical sections (profiler entries, statistics updates) run with IRQ and FIQ masked. The
//! mask is taken by constructing an [`IrqGuard`] and restored when the guard drops, so every
//! exit path of the critical section restores the previous processor mode.

use core::sync::atomic::{AtomicU32, Ordering};

/// IRQ mask bit in the saved mode word
pub const IRQ_MASK: u32 = 1 << 7;
/// FIQ mask bit in the saved mode word
pub const FIQ_MASK: u32 = 1 << 6;

/// Processor interrupt mask state for one core
#[derive(Debug, Default)]
pub struct InterruptControl {
    mode: AtomicU32,
}

impl InterruptControl {
    pub const fn new() -> Self {
        Self {
            mode: AtomicU32::new(0),
        }
    }

    /// Mask IRQs, returning the previous mode word
    pub fn irq_disable(&self) -> u32 {
        self.mode.fetch_or(IRQ_MASK, Ordering::AcqRel)
    }

    /// Mask FIQs, returning the previous mode word
    pub fn fiq_disable(&self) -> u32 {
        self.mode.fetch_or(FIQ_MASK, Ordering::AcqRel)
    }

    /// Restore a mode word previously returned by `irq_disable`/`fiq_disable`
    pub fn mode_restore(&self, mode: u32) {
        self.mode.store(mode, Ordering::Release);
    }

    pub fn irq_masked(&self) -> bool {
        self.mode.load(Ordering::Acquire) & IRQ_MASK != 0
    }

    pub fn fiq_masked(&self) -> bool {
        self.mode.load(Ordering::Acquire) & FIQ_MASK != 0
    }
}

/// Scoped IRQ + FIQ mask
///
/// ```
/// use neurocore_hal::{InterruptControl, IrqGuard};
///
/// let irq = InterruptControl::new();
/// {
///     let _guard = IrqGuard::new(&irq);
///     assert!(irq.irq_masked() && irq.fiq_masked());
/// }
/// assert!(!irq.irq_masked());
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<'a> {
    control: &'a InterruptControl,
    saved: u32,
}

impl<'a> IrqGuard<'a> {
    pub fn new(control: &'a InterruptControl) -> Self {
        let saved = control.irq_disable();
        control.fiq_disable();
        Self { control, saved }
    }
}

impl Drop for IrqGuard<'_> {
    fn drop(&mut self) {
        self.control.mode_restore(self.saved);
    }
}

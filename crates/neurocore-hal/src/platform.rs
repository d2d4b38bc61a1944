// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Kernel services and role callbacks
//!
//! The kernel schedules four event sources per core, highest priority first:
//! multicast packet, DMA completion, user event, timer tick. A handler runs to completion and
//! is never re-entered; the only way to suspend work is to issue a DMA (or raise a user
//! event) and return, to be re-entered later with the completion.

use crate::clock::CycleCounter;
use crate::irq::InterruptControl;
use crate::sdram::Sdram;
use core::any::Any;
use std::sync::Arc;

/// Index of a core on the machine
pub type CoreId = u32;

/// Completion tag attached to a DMA transfer
pub type DmaTag = u32;

/// Direction of a DMA transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// SDRAM → core-local buffer
    Read,
    /// Core-local buffer → SDRAM
    Write,
}

/// Role exit status (0 = clean completion)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(pub u32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const CONFIG_INVALID: ExitCode = ExitCode(1);
    pub const ALLOC_FAILURE: ExitCode = ExitCode(2);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

/// Services a kernel provides to the role running on a core
pub trait Platform {
    /// Core this handler is running on
    fn core_id(&self) -> CoreId;

    /// Shared SDRAM image (direct word access, used for recording and config)
    fn sdram(&self) -> &Sdram;

    /// Queue an asynchronous transfer of `buffer.len()` words
    ///
    /// The buffer is owned by the DMA engine while the transfer is in flight and is handed back
    /// through [`Application::on_dma_done`] with the same `tag` (filled, for reads).
    fn dma_transfer(&mut self, tag: DmaTag, sdram_address: u32, buffer: Vec<u32>, direction: DmaDirection);

    /// Offer a packet to the multicast link; `false` means the link is full
    fn multicast_send(&mut self, key: u32, payload: Option<u32>) -> bool;

    /// Raise a user event; `false` if one is already pending
    fn trigger_user_event(&mut self) -> bool;

    /// Configure the timer period in microseconds
    fn set_timer_tick(&mut self, micros: u32);

    /// Busy-wait
    fn delay_us(&mut self, micros: u32);

    /// Handle to this core's free-running cycle counter
    fn clock(&self) -> CycleCounter;

    fn cycle_counter(&self) -> u32 {
        self.clock().read()
    }

    /// Interrupt mask control of this core
    fn interrupts(&self) -> Arc<InterruptControl>;

    /// Stop scheduling events for this core
    fn exit(&mut self, code: ExitCode);

    /// Send a packet, retrying with a 1 µs back-off until the link accepts it
    ///
    /// Returns the number of rejected attempts.
    fn multicast_send_blocking(&mut self, key: u32, payload: Option<u32>) -> u32 {
        let mut retries = 0;
        while !self.multicast_send(key, payload) {
            retries += 1;
            self.delay_us(1);
        }
        retries
    }
}

/// Event callbacks of a role binary
pub trait Application: Any {
    /// Short role name for logs
    fn name(&self) -> &'static str;

    /// Called once before the first timer tick
    fn on_start(&mut self, _platform: &mut dyn Platform) {}

    fn on_timer(&mut self, platform: &mut dyn Platform);

    fn on_multicast(&mut self, _key: u32, _payload: Option<u32>, _platform: &mut dyn Platform) {}

    fn on_dma_done(&mut self, _tag: DmaTag, _buffer: Vec<u32>, _platform: &mut dyn Platform) {}

    fn on_user_event(&mut self, _platform: &mut dyn Platform) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

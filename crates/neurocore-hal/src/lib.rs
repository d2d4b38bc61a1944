// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurocore Hardware Abstraction Layer
//!
//! Platform-agnostic contracts between a core's role binary and the kernel that hosts it:
//! - **Platform**: DMA, multicast, timer, user events and interrupt masking
//! - **Application**: event callbacks a role registers with the kernel
//! - **Sdram**: the shared global memory image and bounds-checked `MemoryRegion` views
//! - **Dtcm**: the single-shot bump allocator over core-local memory
//!
//! A role is written only against these traits, so the same role code runs on the host stub
//! kernel used by the tests and on any other kernel that implements `Platform`.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod dtcm;
pub mod error;
pub mod irq;
pub mod platform;
pub mod sdram;

pub use clock::CycleCounter;
pub use dtcm::Dtcm;
pub use error::{HalError, Result};
pub use irq::{InterruptControl, IrqGuard};
pub use platform::{Application, CoreId, DmaDirection, DmaTag, ExitCode, Platform};
pub use sdram::{MemoryRegion, RegionCursor, Sdram};

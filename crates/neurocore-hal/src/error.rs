// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for platform operations

/// Platform errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// Access outside the SDRAM image or a region view
    #[error("out of bounds: word {index} (+{count}) outside region of {len} words at 0x{base:08x}")]
    OutOfBounds {
        base: u32,
        index: u32,
        count: u32,
        len: u32,
    },

    /// Byte address is not word aligned
    #[error("misaligned address 0x{address:08x}")]
    Misaligned { address: u32 },

    /// Core-local memory exhausted during startup
    #[error("DTCM exhausted: requested {requested} bytes, {available} available")]
    AllocFailure { requested: usize, available: usize },

    /// Shared memory exhausted while placing an image or slab
    #[error("SDRAM exhausted: requested {requested} bytes, {available} available")]
    SdramExhausted { requested: u32, available: u32 },
}

/// Result type for platform operations
pub type Result<T> = core::result::Result<T, HalError>;

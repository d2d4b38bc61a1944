// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared global memory (SDRAM)
//!
//! SDRAM is a flat, word-addressable image shared by every core. Addresses are byte addresses
//! from the start of the image and must be word aligned. Roles never hold raw pointers into it:
//! they work through [`MemoryRegion`] views whose extent is fixed when the config image is
//! parsed, and every access is bounds checked against that extent.

use crate::error::{HalError, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Default SDRAM image size of the host kernel (16 MiB)
pub const DEFAULT_SDRAM_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug)]
struct SdramInner {
    words: Vec<u32>,
    next_free: u32,
}

/// Handle to the shared SDRAM image (cheap to clone)
#[derive(Debug, Clone)]
pub struct Sdram {
    inner: Arc<RwLock<SdramInner>>,
}

impl Sdram {
    /// Create a zeroed image of `size_bytes` (rounded down to whole words)
    pub fn new(size_bytes: u32) -> Self {
        let words = (size_bytes / 4) as usize;
        Self {
            inner: Arc::new(RwLock::new(SdramInner {
                words: vec![0; words],
                next_free: 0,
            })),
        }
    }

    pub fn size_bytes(&self) -> u32 {
        (self.inner.read().words.len() * 4) as u32
    }

    /// Reserve `size_bytes` of the image, returning its word-aligned base address
    pub fn allocate(&self, size_bytes: u32) -> Result<u32> {
        let mut inner = self.inner.write();
        let size = size_bytes.div_ceil(4) * 4;
        let total = (inner.words.len() * 4) as u32;
        let available = total - inner.next_free;
        if size > available {
            return Err(HalError::SdramExhausted {
                requested: size,
                available,
            });
        }
        let base = inner.next_free;
        inner.next_free += size;
        Ok(base)
    }

    /// Bytes handed out by `allocate` so far
    pub fn allocated_bytes(&self) -> u32 {
        self.inner.read().next_free
    }

    fn index(words: &[u32], address: u32, count: usize) -> Result<usize> {
        if address & 3 != 0 {
            return Err(HalError::Misaligned { address });
        }
        let start = (address / 4) as usize;
        if start + count > words.len() {
            return Err(HalError::OutOfBounds {
                base: 0,
                index: start as u32,
                count: count as u32,
                len: words.len() as u32,
            });
        }
        Ok(start)
    }

    pub fn read_word(&self, address: u32) -> Result<u32> {
        let inner = self.inner.read();
        let i = Self::index(&inner.words, address, 1)?;
        Ok(inner.words[i])
    }

    pub fn write_word(&self, address: u32, value: u32) -> Result<()> {
        let mut inner = self.inner.write();
        let i = Self::index(&inner.words, address, 1)?;
        inner.words[i] = value;
        Ok(())
    }

    /// Copy `out.len()` words starting at `address`
    pub fn read_words(&self, address: u32, out: &mut [u32]) -> Result<()> {
        let inner = self.inner.read();
        let i = Self::index(&inner.words, address, out.len())?;
        out.copy_from_slice(&inner.words[i..i + out.len()]);
        Ok(())
    }

    pub fn write_words(&self, address: u32, data: &[u32]) -> Result<()> {
        let mut inner = self.inner.write();
        let i = Self::index(&inner.words, address, data.len())?;
        inner.words[i..i + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn fill(&self, address: u32, count: u32, value: u32) -> Result<()> {
        let mut inner = self.inner.write();
        let i = Self::index(&inner.words, address, count as usize)?;
        inner.words[i..i + count as usize].fill(value);
        Ok(())
    }

    /// View of `size_bytes` starting at `base`
    pub fn region(&self, base: u32, size_bytes: u32) -> Result<MemoryRegion> {
        if base & 3 != 0 {
            return Err(HalError::Misaligned { address: base });
        }
        let len_words = size_bytes / 4;
        {
            let inner = self.inner.read();
            Self::index(&inner.words, base, len_words as usize)?;
        }
        Ok(MemoryRegion {
            sdram: self.clone(),
            base,
            len_words,
        })
    }
}

impl Default for Sdram {
    fn default() -> Self {
        Self::new(DEFAULT_SDRAM_BYTES)
    }
}

/// Bounds-checked, word-typed view of part of SDRAM
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    sdram: Sdram,
    base: u32,
    len_words: u32,
}

impl MemoryRegion {
    /// Byte address of the first word
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len_words(&self) -> u32 {
        self.len_words
    }

    pub fn is_empty(&self) -> bool {
        self.len_words == 0
    }

    pub fn sdram(&self) -> &Sdram {
        &self.sdram
    }

    /// Byte address of word `index`
    pub fn address_of(&self, index: u32) -> u32 {
        self.base + index * 4
    }

    fn check(&self, index: u32, count: u32) -> Result<()> {
        if index.checked_add(count).map_or(true, |end| end > self.len_words) {
            return Err(HalError::OutOfBounds {
                base: self.base,
                index,
                count,
                len: self.len_words,
            });
        }
        Ok(())
    }

    pub fn read(&self, index: u32) -> Result<u32> {
        self.check(index, 1)?;
        self.sdram.read_word(self.address_of(index))
    }

    pub fn read_i32(&self, index: u32) -> Result<i32> {
        self.read(index).map(|w| w as i32)
    }

    pub fn write(&self, index: u32, value: u32) -> Result<()> {
        self.check(index, 1)?;
        self.sdram.write_word(self.address_of(index), value)
    }

    pub fn read_slice(&self, index: u32, out: &mut [u32]) -> Result<()> {
        self.check(index, out.len() as u32)?;
        self.sdram.read_words(self.address_of(index), out)
    }

    pub fn write_slice(&self, index: u32, data: &[u32]) -> Result<()> {
        self.check(index, data.len() as u32)?;
        self.sdram.write_words(self.address_of(index), data)
    }

    pub fn to_vec(&self) -> Result<Vec<u32>> {
        let mut out = vec![0; self.len_words as usize];
        self.read_slice(0, &mut out)?;
        Ok(out)
    }

    /// View of `len_words` words starting at word `start`
    pub fn sub_region(&self, start: u32, len_words: u32) -> Result<MemoryRegion> {
        self.check(start, len_words)?;
        Ok(MemoryRegion {
            sdram: self.sdram.clone(),
            base: self.address_of(start),
            len_words,
        })
    }

    /// Everything from word `start` to the end of this view
    pub fn tail(&self, start: u32) -> Result<MemoryRegion> {
        self.sub_region(start, self.len_words.saturating_sub(start))
    }

    pub fn cursor(&self) -> RegionCursor {
        RegionCursor {
            region: self.clone(),
            position: 0,
        }
    }
}

/// Sequential reader over a region, used by the config parsers
#[derive(Debug, Clone)]
pub struct RegionCursor {
    region: MemoryRegion,
    position: u32,
}

impl RegionCursor {
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn remaining(&self) -> u32 {
        self.region.len_words.saturating_sub(self.position)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.region.read(self.position)?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|w| w as i32)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_u32().map(|w| w != 0)
    }

    pub fn read_words(&mut self, count: u32) -> Result<Vec<u32>> {
        let mut out = vec![0; count as usize];
        self.region.read_slice(self.position, &mut out)?;
        self.position += count;
        Ok(out)
    }

    /// Read `count` little-endian `i16` values packed two per word, padded to a word boundary
    pub fn read_i16_packed(&mut self, count: usize) -> Result<Vec<i16>> {
        let words = self.read_words(count.div_ceil(2) as u32)?;
        Ok((0..count)
            .map(|i| {
                let word = words[i / 2];
                (if i % 2 == 0 { word } else { word >> 16 }) as u16 as i16
            })
            .collect())
    }

    pub fn skip(&mut self, count: u32) -> Result<()> {
        self.region.check(self.position, count)?;
        self.position += count;
        Ok(())
    }

    /// Hand out the next `count` words as their own view and advance past them
    pub fn take_region(&mut self, count: u32) -> Result<MemoryRegion> {
        let region = self.region.sub_region(self.position, count)?;
        self.position += count;
        Ok(region)
    }

    /// Everything not yet consumed
    pub fn rest(&self) -> Result<MemoryRegion> {
        self.region.tail(self.position)
    }
}

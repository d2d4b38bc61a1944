// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Image Builder
//!
//! Lays out a role image (header, then each present region in table order) and writes it to
//! SDRAM. Used by the host to load cores and by tests.

use crate::config::{ImageLocation, RegionId, IMAGE_MAGIC};
use crate::error::Result;
use neurocore_hal::Sdram;
use std::marker::PhantomData;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ImageBuilder<R: RegionId> {
    regions: Vec<Option<Vec<u32>>>,
    _marker: PhantomData<R>,
}

impl<R: RegionId> Default for ImageBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegionId> ImageBuilder<R> {
    pub fn new() -> Self {
        Self {
            regions: vec![None; R::COUNT],
            _marker: PhantomData,
        }
    }

    /// Set the contents of `id`; an empty region is still present
    pub fn region(mut self, id: R, words: Vec<u32>) -> Self {
        self.regions[id.index()] = Some(words);
        self
    }

    pub fn set_region(&mut self, id: R, words: Vec<u32>) {
        self.regions[id.index()] = Some(words);
    }

    /// Serialise header and regions
    ///
    /// An empty region shares its offset with the next one and therefore reads back with
    /// zero length.
    pub fn to_words(&self) -> Vec<u32> {
        let header_words = 1 + R::COUNT;
        let body: usize = self.regions.iter().flatten().map(Vec::len).sum();
        let mut words = Vec::with_capacity(header_words + body);
        words.push(IMAGE_MAGIC);
        words.resize(header_words, 0);

        for (i, region) in self.regions.iter().enumerate() {
            if let Some(contents) = region {
                words[1 + i] = (words.len() * 4) as u32;
                words.extend_from_slice(contents);
            }
        }
        words
    }

    /// Allocate space in `sdram` and write the image there
    pub fn write(&self, sdram: &Sdram) -> Result<ImageLocation> {
        let words = self.to_words();
        let len_bytes = words.len() as u32 * 4;
        let base = sdram.allocate(len_bytes)?;
        sdram.write_words(base, &words)?;
        debug!(
            base = format_args!("0x{base:08x}"),
            len_bytes,
            regions = self.regions.iter().flatten().count(),
            "Image written"
        );
        Ok(ImageLocation { base, len_bytes })
    }
}

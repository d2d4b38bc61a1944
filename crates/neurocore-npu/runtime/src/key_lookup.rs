// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Key Lookup
//!
//! Resolves the key of an incoming spike to the synaptic row of its source neuron.
//!
//! ```text
//! region:  [n, {key, mask, packed} × n]        sorted by key
//! packed:  (wordOffset << 10) | (numSynapses - 1)
//!
//! match:   (spikeKey & mask) == key
//! neuron:  spikeKey & !mask
//! row:     base + 4 × (neuron × rowWords(numSynapses) + 2 × wordOffset)
//! ```
//!
//! The same row-offset-length packing is used by delay-extension descriptors.

use crate::config::ensure_len;
use crate::error::Result;
use neurocore_hal::{Dtcm, MemoryRegion};

/// Bits of a packed row-offset-length holding `numSynapses - 1`
pub const ROW_LENGTH_BITS: u32 = 10;
const ROW_LENGTH_MASK: u32 = (1 << ROW_LENGTH_BITS) - 1;

/// Largest row a packed descriptor can describe
pub const MAX_ROW_SYNAPSES: u32 = 1 << ROW_LENGTH_BITS;

/// Packed `(wordOffset, numSynapses)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RowOffsetLength(pub u32);

impl RowOffsetLength {
    /// Pack `num_synapses` (1..=1024) at `word_offset` (in units of two words)
    pub fn new(word_offset: u32, num_synapses: u32) -> Self {
        debug_assert!((1..=MAX_ROW_SYNAPSES).contains(&num_synapses));
        Self((word_offset << ROW_LENGTH_BITS) | ((num_synapses - 1) & ROW_LENGTH_MASK))
    }

    pub fn num_synapses(self) -> u32 {
        (self.0 & ROW_LENGTH_MASK) + 1
    }

    /// Word offset from the matrix base
    pub fn word_offset(self) -> u32 {
        2 * (self.0 >> ROW_LENGTH_BITS)
    }
}

/// One key lookup record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLookupEntry {
    pub key: u32,
    pub mask: u32,
    pub row: RowOffsetLength,
}

/// Resolved synaptic row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    /// Row length in words
    pub words: u32,
    /// Absolute SDRAM byte address of the row
    pub address: u32,
}

/// In-core copy of the key lookup table
#[derive(Debug, Clone, Default)]
pub struct KeyLookup {
    entries: Vec<KeyLookupEntry>,
}

impl KeyLookup {
    /// Build from entries, sorting them by key
    pub fn new(mut entries: Vec<KeyLookupEntry>) -> Self {
        entries.sort_by_key(|e| e.key);
        Self { entries }
    }

    /// Copy the table from its region into DTCM
    pub fn read(region: &MemoryRegion, dtcm: &mut Dtcm) -> Result<Self> {
        ensure_len(region, "KeyLookup", 1)?;
        let mut cursor = region.cursor();
        let count = cursor.read_u32()?;
        ensure_len(region, "KeyLookup", 1 + 3 * count)?;

        let mut entries = dtcm.alloc(
            count as usize,
            KeyLookupEntry {
                key: 0,
                mask: 0,
                row: RowOffsetLength(0),
            },
        )?;
        for entry in entries.iter_mut() {
            entry.key = cursor.read_u32()?;
            entry.mask = cursor.read_u32()?;
            entry.row = RowOffsetLength(cursor.read_u32()?);
        }
        Ok(Self::new(entries))
    }

    /// Encode as region words
    pub fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(1 + 3 * self.entries.len());
        words.push(self.entries.len() as u32);
        for e in &self.entries {
            words.extend_from_slice(&[e.key, e.mask, e.row.0]);
        }
        words
    }

    pub fn entries(&self) -> &[KeyLookupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search for the record matching `key`
    pub fn find(&self, key: u32) -> Option<&KeyLookupEntry> {
        let (mut lo, mut hi) = (0, self.entries.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = &self.entries[mid];
            let masked = key & entry.mask;
            if masked == entry.key {
                return Some(entry);
            }
            if entry.key < masked {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        None
    }

    /// Resolve `key` to its row given the matrix base address and the row format's length
    pub fn lookup_row(
        &self,
        key: u32,
        matrix_base: u32,
        row_words: impl Fn(u32) -> u32,
    ) -> Option<RowLocation> {
        let entry = self.find(key)?;
        let neuron = key & !entry.mask;
        let words = row_words(entry.row.num_synapses());
        let address = matrix_base + 4 * (neuron * words + entry.row.word_offset());
        Some(RowLocation { words, address })
    }
}

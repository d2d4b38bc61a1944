// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Packed boolean vectors
//!
//! Bit `i` lives in word `i / 32` at position `i % 32`. The free functions work on word slices
//! read straight out of SDRAM; [`BitField`] owns its words.

/// Words needed for `bits` booleans
#[inline(always)]
pub const fn words_for(bits: usize) -> usize {
    bits.div_ceil(32)
}

#[inline(always)]
pub fn test_bit(words: &[u32], bit: usize) -> bool {
    words
        .get(bit / 32)
        .is_some_and(|w| w & (1 << (bit % 32)) != 0)
}

#[inline(always)]
pub fn set_bit(words: &mut [u32], bit: usize) {
    if let Some(w) = words.get_mut(bit / 32) {
        *w |= 1 << (bit % 32);
    }
}

#[inline(always)]
pub fn clear_bit(words: &mut [u32], bit: usize) {
    if let Some(w) = words.get_mut(bit / 32) {
        *w &= !(1 << (bit % 32));
    }
}

pub fn clear_all(words: &mut [u32]) {
    words.fill(0);
}

pub fn count_set(words: &[u32]) -> usize {
    words.iter().map(|w| w.count_ones() as usize).sum()
}

/// Indices of set bits in ascending order
pub fn iter_set(words: &[u32]) -> impl Iterator<Item = usize> + '_ {
    words.iter().enumerate().flat_map(|(i, &word)| {
        let mut remaining = word;
        core::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let bit = remaining.trailing_zeros() as usize;
            remaining &= remaining - 1;
            Some(i * 32 + bit)
        })
    })
}

/// Owned bit-field of a fixed number of bits
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitField {
    words: Vec<u32>,
    bits: usize,
}

impl BitField {
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; words_for(bits)],
            bits,
        }
    }

    /// Wrap words read from memory
    pub fn from_words(words: Vec<u32>, bits: usize) -> Self {
        let mut words = words;
        words.resize(words_for(bits), 0);
        Self { words, bits }
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn test(&self, bit: usize) -> bool {
        bit < self.bits && test_bit(&self.words, bit)
    }

    pub fn set(&mut self, bit: usize) {
        if bit < self.bits {
            set_bit(&mut self.words, bit);
        }
    }

    pub fn clear(&mut self, bit: usize) {
        clear_bit(&mut self.words, bit);
    }

    pub fn clear_all(&mut self) {
        clear_all(&mut self.words);
    }

    pub fn count(&self) -> usize {
        count_set(&self.words)
    }

    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        iter_set(&self.words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout_is_little_endian_words() {
        let mut bf = BitField::new(40);
        bf.set(0);
        bf.set(33);
        assert_eq!(bf.words(), &[0x0000_0001, 0x0000_0002]);
        assert!(bf.test(33));
        assert!(!bf.test(32));
    }

    #[test]
    fn test_out_of_range_bits_are_ignored() {
        let mut bf = BitField::new(3);
        bf.set(5);
        assert_eq!(bf.count(), 0);
        assert!(!bf.test(100));
    }

    #[test]
    fn test_iter_set_ascending() {
        let words = [0x8000_0001u32, 0, 0x0000_0010];
        let set: Vec<_> = iter_set(&words).collect();
        assert_eq!(set, vec![0, 31, 68]);
        assert_eq!(count_set(&words), 3);
    }

    #[test]
    fn test_clear() {
        let mut bf = BitField::from_words(vec![u32::MAX], 32);
        bf.clear(4);
        assert!(!bf.test(4));
        bf.clear_all();
        assert_eq!(bf.count(), 0);
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exponential-decay lookup tables
//!
//! `N` S2011 entries of `e^(-t/τ)`, one per `2^SHIFT` ticks. Time differences past the end of
//! the table decay to zero. In SDRAM the table is `N` packed `i16` values, low half first,
//! padded to a whole word.

use crate::error::{NeuralError, Result};
use crate::fixed::{exp_s1615, S1615_ONE, S1615_SHIFT, S2011_SHIFT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpDecayLut<const N: usize, const SHIFT: u32 = 0> {
    table: [i16; N],
}

impl<const N: usize, const SHIFT: u32> ExpDecayLut<N, SHIFT> {
    /// Words occupied by the packed table
    pub const WORDS: usize = N.div_ceil(2);

    pub const fn new(table: [i16; N]) -> Self {
        Self { table }
    }

    /// Unpack from `WORDS` packed words
    pub fn from_words(words: &[u32]) -> Result<Self> {
        if words.len() < Self::WORDS {
            return Err(NeuralError::ShortWords {
                expected: Self::WORDS,
                found: words.len(),
            });
        }
        let table = core::array::from_fn(|i| {
            let word = words[i / 2];
            (if i % 2 == 0 { word } else { word >> 16 }) as u16 as i16
        });
        Ok(Self { table })
    }

    /// Append the packed table to `out`
    pub fn write_words(&self, out: &mut Vec<u32>) {
        for pair in self.table.chunks(2) {
            let lo = pair[0] as u16 as u32;
            let hi = pair.get(1).map_or(0, |v| *v as u16 as u32);
            out.push(lo | (hi << 16));
        }
    }

    /// Table of `e^(-t/τ)` with `τ` given in ticks (S1615), computed without floating point
    pub fn generate(tau_ticks: i32) -> Self {
        let table = core::array::from_fn(|i| {
            if tau_ticks <= 0 {
                return 0;
            }
            let t = ((i as i64) << SHIFT) << S1615_SHIFT;
            let x = (t * S1615_ONE as i64) / tau_ticks as i64;
            let x = x.min(i32::MAX as i64) as i32;
            let decay = exp_s1615(-x);
            (decay >> (S1615_SHIFT - S2011_SHIFT)) as i16
        });
        Self { table }
    }

    /// Decay factor for a time difference of `t` ticks
    #[inline(always)]
    pub fn get(&self, t: u32) -> i32 {
        let index = (t >> SHIFT) as usize;
        if index < N {
            self.table[index] as i32
        } else {
            0
        }
    }

    pub fn entries(&self) -> &[i16; N] {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::S2011_ONE;

    #[test]
    fn test_get_past_end_is_zero() {
        let lut = ExpDecayLut::<3>::new([2048, 1024, 512]);
        assert_eq!(lut.get(0), 2048);
        assert_eq!(lut.get(2), 512);
        assert_eq!(lut.get(3), 0);
        assert_eq!(lut.get(u32::MAX), 0);
    }

    #[test]
    fn test_shift_groups_ticks() {
        let lut = ExpDecayLut::<2, 2>::new([100, 50]);
        assert_eq!(lut.get(3), 100);
        assert_eq!(lut.get(4), 50);
        assert_eq!(lut.get(8), 0);
    }

    #[test]
    fn test_packed_words_pad_odd_length() {
        let lut = ExpDecayLut::<3>::new([1, -1, 7]);
        let mut words = Vec::new();
        lut.write_words(&mut words);
        assert_eq!(words, vec![0xFFFF_0001, 0x0000_0007]);
        assert_eq!(ExpDecayLut::<3>::from_words(&words).unwrap(), lut);
        assert!(ExpDecayLut::<3>::from_words(&words[..1]).is_err());
    }

    #[test]
    fn test_generated_table_decays() {
        let lut = ExpDecayLut::<64>::generate(20 * S1615_ONE);
        assert_eq!(lut.get(0), S2011_ONE);
        // e^(-1) at t = τ
        assert!((lut.get(20) - 753).abs() <= 1);
        let entries = lut.entries();
        assert!(entries.windows(2).all(|w| w[0] >= w[1]));
    }
}

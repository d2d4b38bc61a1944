// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Fixed-Point Arithmetic
//!
//! All role arithmetic is integer. Three formats are used throughout:
//!
//! ```text
//! S1615   i32, 15 fractional bits   membrane voltages, currents, model parameters
//! U032    u32, 32 fractional bits   probabilities in [0, 1)
//! S2011   i32, 11 fractional bits   STDP traces and LUT entries
//! ```
//!
//! plus a runtime [`WeightFormat`] whose fractional-bit count is chosen per synapse processor.
//!
//! The transcendental functions evaluate in Q62 with `i128` intermediates and round once at the
//! end, so `exp_s1615` and `ln_s1615` are within one unit of the correctly rounded result.

/// 32-bit signed, 15 fractional bits
pub type S1615 = i32;
/// 32-bit unsigned, 32 fractional bits
pub type U032 = u32;
/// 32-bit signed, 11 fractional bits
pub type S2011 = i32;

pub const S1615_SHIFT: u32 = 15;
pub const S1615_ONE: S1615 = 1 << S1615_SHIFT;
pub const S2011_SHIFT: u32 = 11;
pub const S2011_ONE: S2011 = 1 << S2011_SHIFT;

/// Smallest argument for which `exp_s1615` is non-zero
pub const EXP_MIN: S1615 = -340_695;
/// Largest argument for which `exp_s1615` does not saturate
pub const EXP_MAX: S1615 = 363_408;

const Q62_SHIFT: u32 = 62;
const ONE_Q62: i128 = 1 << Q62_SHIFT;
/// ln(2) in Q62
const LN2_Q62: i128 = 3_196_577_161_300_663_914;
/// ln(2π)/2 in Q62
const HALF_LN_2PI_Q62: i128 = 4_237_855_985_374_161_229;

#[inline(always)]
pub const fn mul_s1615(a: S1615, b: S1615) -> S1615 {
    ((a as i64 * b as i64) >> S1615_SHIFT) as i32
}

#[inline(always)]
pub const fn mul_u032(a: U032, b: U032) -> U032 {
    ((a as u64 * b as u64) >> 32) as u32
}

/// Scale an S1615 value by a probability
#[inline(always)]
pub const fn mul_s1615_u032(a: S1615, b: U032) -> S1615 {
    ((a as i64 * b as i64) >> 32) as i32
}

/// 16×16 signed multiply of the low halfwords, shifted right by 11
#[inline(always)]
pub const fn mul16_s2011(a: i32, b: i32) -> S2011 {
    ((a as i16 as i32) * (b as i16 as i32)) >> S2011_SHIFT
}

/// Full-width S2011 multiply
#[inline(always)]
pub const fn mul_s2011(a: S2011, b: S2011) -> S2011 {
    ((a as i64 * b as i64) >> S2011_SHIFT) as i32
}

#[inline(always)]
fn round_shift(value: i128, shift: u32) -> i128 {
    (value + (1 << (shift - 1))) >> shift
}

#[inline(always)]
fn saturate_i32(value: i128) -> i32 {
    value.clamp(i32::MIN as i128, i32::MAX as i128) as i32
}

/// e^x in S1615
///
/// Range reduction `x = k·ln2 + r` with `|r| ≤ ln2/2`, then a Taylor series for `e^r`.
pub fn exp_s1615(x: S1615) -> S1615 {
    if x < EXP_MIN {
        return 0;
    }
    if x > EXP_MAX {
        return i32::MAX;
    }

    let x_q62 = (x as i128) << (Q62_SHIFT - S1615_SHIFT);
    let k = if x_q62 >= 0 {
        (x_q62 + LN2_Q62 / 2) / LN2_Q62
    } else {
        (x_q62 - LN2_Q62 / 2) / LN2_Q62
    };
    let r = x_q62 - k * LN2_Q62;

    let mut sum = ONE_Q62;
    let mut term = ONE_Q62;
    for n in 1..=24 {
        term = ((term * r) >> Q62_SHIFT) / n;
        if term == 0 {
            break;
        }
        sum += term;
    }

    // sum·2^k in Q62 → S1615
    let shift = (Q62_SHIFT - S1615_SHIFT) as i128 - k;
    saturate_i32(round_shift(sum, shift as u32))
}

/// Natural log in Q62 of `value / 2^frac_bits` (`value > 0`)
pub(crate) fn ln_q62(value: u64, frac_bits: u32) -> i128 {
    debug_assert!(value > 0);
    let msb = 63 - value.leading_zeros();
    let exponent = msb as i128 - frac_bits as i128;

    // Mantissa in [1, 2)
    let m = if msb <= Q62_SHIFT {
        (value as i128) << (Q62_SHIFT - msb)
    } else {
        (value as i128) >> (msb - Q62_SHIFT)
    };

    // ln m = 2·atanh((m-1)/(m+1))
    let s = ((m - ONE_Q62) << Q62_SHIFT) / (m + ONE_Q62);
    let s2 = (s * s) >> Q62_SHIFT;
    let mut sum = s;
    let mut term = s;
    let mut k = 3;
    loop {
        term = (term * s2) >> Q62_SHIFT;
        let add = term / k;
        if add == 0 {
            break;
        }
        sum += add;
        k += 2;
    }

    exponent * LN2_Q62 + 2 * sum
}

/// ln(x) in S1615; `i32::MIN` for `x <= 0`
pub fn ln_s1615(x: S1615) -> S1615 {
    if x <= 0 {
        return i32::MIN;
    }
    round_shift(ln_q62(x as u64, S1615_SHIFT), Q62_SHIFT - S1615_SHIFT) as i32
}

/// 1/x in S1615, rounded to nearest; saturates for `x == 0`
pub fn reciprocal_s1615(x: S1615) -> S1615 {
    if x == 0 {
        return i32::MAX;
    }
    let magnitude = (x as i64).abs();
    let q = ((1i64 << (2 * S1615_SHIFT)) + magnitude / 2) / magnitude;
    let q = if x < 0 { -q } else { q };
    q.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Integer square root (floor)
pub(crate) fn isqrt_u64(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let bits = 64 - n.leading_zeros();
    let mut x = 1u64 << bits.div_ceil(2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// √x in S1615; 0 for `x <= 0`
pub fn sqrt_s1615(x: S1615) -> S1615 {
    if x <= 0 {
        return 0;
    }
    isqrt_u64((x as u64) << S1615_SHIFT) as i32
}

/// ln(n!) in S1615, saturating at `i32::MAX`
///
/// Exact summation up to 20!, Stirling's series with two correction terms above.
pub fn log_fact(n: u32) -> S1615 {
    if n < 2 {
        return 0;
    }
    let total = if n <= 20 {
        (2..=n as u64).map(|k| ln_q62(k, 0)).sum::<i128>()
    } else {
        let nn = n as i128;
        let ln_n = ln_q62(n as u64, 0);
        ((2 * nn + 1) * ln_n) / 2 - (nn << Q62_SHIFT) + HALF_LN_2PI_Q62 + ONE_Q62 / (12 * nn)
            - ONE_Q62 / (360 * nn * nn * nn)
    };
    saturate_i32(round_shift(total, Q62_SHIFT - S1615_SHIFT))
}

/// Runtime-selected fixed-point format of synaptic weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightFormat {
    fractional_bits: u32,
}

impl WeightFormat {
    pub const fn new(fractional_bits: u32) -> Self {
        Self { fractional_bits }
    }

    pub const fn fractional_bits(&self) -> u32 {
        self.fractional_bits
    }

    pub const fn one(&self) -> i32 {
        1 << self.fractional_bits
    }

    /// Product of two weights in this format
    #[inline(always)]
    pub const fn mul(&self, a: i32, b: i32) -> i32 {
        ((a as i64 * b as i64) >> self.fractional_bits) as i32
    }

    /// Left shift converting this format to S1615 (negative means right shift)
    pub const fn left_shift_to_s1615(&self) -> i32 {
        S1615_SHIFT as i32 - self.fractional_bits as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s1615(x: f64) -> S1615 {
        (x * S1615_ONE as f64).round() as i32
    }

    #[test]
    fn test_exp_boundaries() {
        assert_eq!(exp_s1615(EXP_MAX + 1), i32::MAX);
        assert_eq!(exp_s1615(EXP_MIN - 1), 0);
        assert_eq!(exp_s1615(0), S1615_ONE);
        assert!(exp_s1615(EXP_MIN) > 0);
    }

    #[test]
    fn test_exp_known_values() {
        assert_eq!(exp_s1615(S1615_ONE), s1615(core::f64::consts::E));
        assert_eq!(exp_s1615(-S1615_ONE), s1615((-1.0f64).exp()));
    }

    #[test]
    fn test_ln_known_values() {
        assert_eq!(ln_s1615(S1615_ONE), 0);
        assert_eq!(ln_s1615(2 * S1615_ONE), s1615(core::f64::consts::LN_2));
        assert_eq!(ln_s1615(0), i32::MIN);
        assert_eq!(ln_s1615(-5), i32::MIN);
    }

    #[test]
    fn test_reciprocal() {
        assert_eq!(reciprocal_s1615(2 * S1615_ONE), S1615_ONE / 2);
        assert_eq!(reciprocal_s1615(-S1615_ONE / 4), -4 * S1615_ONE);
        assert_eq!(reciprocal_s1615(0), i32::MAX);
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt_s1615(4 * S1615_ONE), 2 * S1615_ONE);
        assert_eq!(sqrt_s1615(S1615_ONE / 4), S1615_ONE / 2);
        assert_eq!(sqrt_s1615(-1), 0);
        assert_eq!(isqrt_u64(u64::MAX), u32::MAX as u64);
    }

    #[test]
    fn test_log_fact_matches_float() {
        let mut ln_fact = 0.0f64;
        for n in 1..=200u32 {
            ln_fact += (n as f64).ln();
            let expected = s1615(ln_fact);
            let got = log_fact(n);
            assert!((got - expected).abs() <= 1, "n={n}: {got} vs {expected}");
        }
        assert_eq!(log_fact(0), 0);
        assert_eq!(log_fact(u32::MAX), i32::MAX);
    }

    #[test]
    fn test_mul16_uses_low_halfwords() {
        // High halves are ignored
        assert_eq!(mul16_s2011(0x7FFF_0800, 0x0001_0800), S2011_ONE);
        assert_eq!(mul16_s2011(-S2011_ONE, S2011_ONE), -S2011_ONE);
    }

    #[test]
    fn test_weight_format() {
        let format = WeightFormat::new(11);
        assert_eq!(format.one(), 2048);
        assert_eq!(format.mul(4096, 1024), 2048);
        assert_eq!(format.left_shift_to_s1615(), 4);
    }

    proptest! {
        #[test]
        fn prop_mul_s1615_rounds_within_one(a in any::<i32>(), b in any::<i32>()) {
            let exact = (a as i128 * b as i128) as f64 / S1615_ONE as f64;
            let got = mul_s1615(a, b);
            if exact.abs() < i32::MAX as f64 {
                prop_assert!((got as f64 - exact.round()).abs() <= 1.0);
            }
        }

        #[test]
        fn prop_exp_within_two(x in EXP_MIN..=EXP_MAX) {
            let expected = ((x as f64 / S1615_ONE as f64).exp() * S1615_ONE as f64).round();
            let expected = expected.min(i32::MAX as f64);
            prop_assert!((exp_s1615(x) as f64 - expected).abs() <= 2.0);
        }

        #[test]
        fn prop_ln_inverts_exp(x in 22_713..=EXP_MAX) {
            prop_assert!((ln_s1615(exp_s1615(x)) - x).abs() <= 2);
        }

        #[test]
        fn prop_ln_inverts_exp_over_domain(x in EXP_MIN..=EXP_MAX) {
            let y = exp_s1615(x);
            prop_assume!(y > 0);
            // One unit of exp(x) moves ln by 2^15 / y units
            let slack = (3 * S1615_ONE as i64 + 2 * y as i64 - 1) / (2 * y as i64);
            let error = (ln_s1615(y) as i64 - x as i64).abs();
            prop_assert!(error <= 2 + slack, "x={} y={} error={}", x, y, error);
        }

        #[test]
        fn prop_reciprocal_round_trip(x in 3_277i32..=49_152) {
            let back = reciprocal_s1615(reciprocal_s1615(x));
            prop_assert!((back - x).abs() <= 2, "x={} back={}", x, back);
        }

        #[test]
        fn prop_reciprocal_round_trip_to_ten(x in 3_277i32..=327_680) {
            // Half a unit of 1/x grows by x^2 on the way back
            let back = reciprocal_s1615(reciprocal_s1615(x)) as i64;
            let bound = 2 + ((x as i64 * x as i64) >> 30);
            prop_assert!((back - x as i64).abs() <= bound, "x={} back={}", x, back);
        }

        #[test]
        fn prop_sqrt_squares_back(x in 1i32..i32::MAX) {
            let r = sqrt_s1615(x) as i64;
            let lo = (r * r) >> S1615_SHIFT;
            let hi = ((r + 1) * (r + 1)) >> S1615_SHIFT;
            prop_assert!(lo <= x as i64 && x as i64 <= hi);
        }
    }
}

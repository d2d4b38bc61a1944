// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Non-uniform variates
//!
//! All variates are pure functions of the generator stream: the same generator state always
//! yields the same draw, and each function consumes a deterministic number of words for a
//! given stream.

use super::RandomSource;
use crate::fixed::{
    isqrt_u64, ln_q62, ln_s1615, mul_s1615, mul_u032, S1615, S1615_ONE, S1615_SHIFT, U032,
};

/// Below this many trials a fractional binomial is drawn as individual Bernoulli trials
const BINOMIAL_DIRECT_TRIALS: u32 = 16;

/// Uniform integer in `[0, n)` by multiply-shift
#[inline]
pub fn uniform_below<R: RandomSource + ?Sized>(rng: &mut R, n: u32) -> u32 {
    ((rng.next_u32() as u64 * n as u64) >> 32) as u32
}

/// Exp(1) variate in S1615 (Von Neumann's comparison method)
///
/// Draw `U1 > U2 > ... ` until the run breaks; an odd-length run accepts `a + U1`, otherwise
/// the integer part `a` grows by one and the trial restarts.
pub fn exponential<R: RandomSource + ?Sized>(rng: &mut R) -> S1615 {
    let mut integer_part: i32 = 0;
    loop {
        let first = rng.next_u32();
        let mut previous = first;
        let mut run = 1u32;
        loop {
            let next = rng.next_u32();
            if next > previous {
                break;
            }
            previous = next;
            run += 1;
        }
        if run % 2 == 1 {
            return (integer_part << S1615_SHIFT).saturating_add((first >> 17) as i32);
        }
        integer_part = integer_part.saturating_add(1);
    }
}

/// Poisson variate by the multiplication method
///
/// Returns the `k` with `U1·…·Uk > e^-λ ≥ U1·…·U(k+1)`.
pub fn poisson<R: RandomSource + ?Sized>(rng: &mut R, exp_minus_lambda: U032) -> u32 {
    let mut k = 0;
    // 1.0 saturates to the top of U032
    let mut p = U032::MAX;
    loop {
        p = mul_u032(p, rng.next_u32());
        if p <= exp_minus_lambda {
            return k;
        }
        k += 1;
    }
}

/// Successes in `n` trials given `ln(1-p)` in Q62, by summing geometric waiting times
fn binomial_waiting_time<R: RandomSource + ?Sized>(rng: &mut R, n: u32, ln_q: i128) -> u32 {
    if ln_q >= 0 {
        return 0;
    }
    let mut successes = 0;
    let mut trials: u64 = 0;
    loop {
        // U in (0, 1]
        let u = rng.next_u32() as u64 + 1;
        let ln_u = ln_q62(u, 32);
        trials += (ln_u / ln_q) as u64 + 1;
        if trials > n as u64 {
            return successes;
        }
        successes += 1;
    }
}

/// Binomial(n, p) with `p` in S1615
pub fn binomial<R: RandomSource + ?Sized>(rng: &mut R, n: u32, p: S1615) -> u32 {
    if n == 0 || p <= 0 {
        return 0;
    }
    if p >= S1615_ONE {
        return n;
    }
    if p > S1615_ONE / 2 {
        return n - binomial(rng, n, S1615_ONE - p);
    }
    binomial_waiting_time(rng, n, ln_q62((S1615_ONE - p) as u64, S1615_SHIFT))
}

/// Binomial(n, num/denom) with an exact rational probability
pub fn binomial_fraction<R: RandomSource + ?Sized>(
    rng: &mut R,
    n: u32,
    num: u32,
    denom: u32,
) -> u32 {
    if n == 0 || num == 0 || denom == 0 {
        return 0;
    }
    if num >= denom {
        return n;
    }
    if n <= BINOMIAL_DIRECT_TRIALS {
        return (0..n).filter(|_| uniform_below(rng, denom) < num).count() as u32;
    }
    if 2 * num as u64 > denom as u64 {
        return n - binomial_fraction(rng, n, denom - num, denom);
    }
    let ln_q = ln_q62((denom - num) as u64, 0) - ln_q62(denom as u64, 0);
    binomial_waiting_time(rng, n, ln_q)
}

/// Hypergeometric: good items in a sample of `nsample` drawn without replacement
///
/// Sequential urn draws, sampling whichever of the sample or its complement is smaller.
pub fn hypergeometric<R: RandomSource + ?Sized>(
    rng: &mut R,
    ngood: u32,
    nbad: u32,
    nsample: u32,
) -> u32 {
    let total = ngood as u64 + nbad as u64;
    let nsample = (nsample as u64).min(total);
    if 2 * nsample > total {
        let left_behind = hypergeometric(rng, ngood, nbad, (total - nsample) as u32);
        return ngood - left_behind;
    }

    let mut good = ngood as u64;
    let mut remaining = total;
    let mut drawn = 0;
    for _ in 0..nsample {
        if good == 0 {
            break;
        }
        let pick = ((rng.next_u32() as u128 * remaining as u128) >> 32) as u64;
        if pick < good {
            drawn += 1;
            good -= 1;
        }
        remaining -= 1;
    }
    drawn
}

/// Standard normal variate in S1615 (Marsaglia polar method)
pub fn normal<R: RandomSource + ?Sized>(rng: &mut R) -> S1615 {
    loop {
        let u = (rng.next_u32() >> 16) as i32 - S1615_ONE;
        let v = (rng.next_u32() >> 16) as i32 - S1615_ONE;
        let s = mul_s1615(u, u) + mul_s1615(v, v);
        if s == 0 || s >= S1615_ONE {
            continue;
        }
        // sqrt(-2 ln s / s)
        let ln_s = ln_s1615(s) as i64;
        let t = ((-2 * ln_s) << S1615_SHIFT) / s as i64;
        let factor = isqrt_u64((t as u64) << S1615_SHIFT) as i64;
        return ((u as i64 * factor) >> S1615_SHIFT) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::exp_s1615;
    use crate::random::MarsKiss64;

    fn rng() -> MarsKiss64 {
        MarsKiss64::new([0xDEAD, 0xBEEF, 0xCAFE, 0xF00D])
    }

    fn exp_minus(lambda: S1615) -> U032 {
        ((exp_s1615(-lambda) as u64) << 17).min(u32::MAX as u64) as u32
    }

    #[test]
    fn test_exponential_mean_is_one() {
        let mut rng = rng();
        let n = 20_000i64;
        let sum: i64 = (0..n).map(|_| exponential(&mut rng) as i64).sum();
        let mean = sum / n;
        assert!((mean - S1615_ONE as i64).abs() < S1615_ONE as i64 / 20, "mean {mean}");
    }

    #[test]
    fn test_poisson_mean() {
        let mut rng = rng();
        let threshold = exp_minus(3 * S1615_ONE);
        let n = 20_000u32;
        let sum: u32 = (0..n).map(|_| poisson(&mut rng, threshold)).sum();
        let mean = sum as f64 / n as f64;
        assert!((mean - 3.0).abs() < 0.1, "mean {mean}");
    }

    #[test]
    fn test_poisson_known_counts() {
        let mut rng = MarsKiss64::new([123, 456, 789, 1011]);
        // e^-λ = 0.9
        let counts: Vec<u32> = (0..100).map(|_| poisson(&mut rng, 3_865_470_566)).collect();
        let spiking: Vec<usize> = (0..100).filter(|&t| counts[t] > 0).collect();
        assert_eq!(spiking, [24, 30, 57, 64, 77, 81, 82, 95, 97, 99]);
        assert!(counts.iter().all(|&c| c <= 1));
    }

    #[test]
    fn test_poisson_zero_rate() {
        let mut rng = rng();
        // e^0 saturates to the top of U032; no draw can exceed it
        assert_eq!(poisson(&mut rng, u32::MAX), 0);
    }

    #[test]
    fn test_binomial_edges() {
        let mut rng = rng();
        assert_eq!(binomial(&mut rng, 100, 0), 0);
        assert_eq!(binomial(&mut rng, 100, S1615_ONE), 100);
        assert_eq!(binomial(&mut rng, 0, S1615_ONE / 2), 0);
        assert_eq!(binomial_fraction(&mut rng, 7, 3, 3), 7);
        assert_eq!(binomial_fraction(&mut rng, 7, 0, 3), 0);
    }

    #[test]
    fn test_binomial_means() {
        let mut rng = rng();
        let trials = 4_000u32;
        for (n, p) in [(100u32, 0.1f64), (100, 0.75), (1000, 0.02)] {
            let p_fixed = (p * S1615_ONE as f64) as i32;
            let sum: u64 = (0..trials)
                .map(|_| binomial(&mut rng, n, p_fixed) as u64)
                .sum();
            let mean = sum as f64 / trials as f64;
            let expected = n as f64 * p;
            let sd = (n as f64 * p * (1.0 - p)).sqrt();
            assert!((mean - expected).abs() < 4.0 * sd / (trials as f64).sqrt() + 0.05,
                "n={n} p={p}: mean {mean}");
        }
    }

    #[test]
    fn test_binomial_fraction_means() {
        let mut rng = rng();
        let trials = 4_000u32;
        for (n, num, denom) in [(10u32, 1u32, 4u32), (200, 3, 4), (500, 1, 50)] {
            let sum: u64 = (0..trials)
                .map(|_| binomial_fraction(&mut rng, n, num, denom) as u64)
                .sum();
            let mean = sum as f64 / trials as f64;
            let p = num as f64 / denom as f64;
            let expected = n as f64 * p;
            let sd = (n as f64 * p * (1.0 - p)).sqrt();
            assert!((mean - expected).abs() < 4.0 * sd / (trials as f64).sqrt() + 0.05,
                "n={n} p={p}: mean {mean}");
        }
    }

    #[test]
    fn test_hypergeometric_bounds_and_mean() {
        let mut rng = rng();
        let trials = 4_000u32;
        let mut sum = 0u64;
        for _ in 0..trials {
            let x = hypergeometric(&mut rng, 30, 70, 60);
            assert!(x <= 30);
            sum += x as u64;
        }
        let mean = sum as f64 / trials as f64;
        assert!((mean - 18.0).abs() < 0.3, "mean {mean}");
        assert_eq!(hypergeometric(&mut rng, 5, 5, 10), 5);
        assert_eq!(hypergeometric(&mut rng, 5, 5, 50), 5);
        assert_eq!(hypergeometric(&mut rng, 0, 5, 3), 0);
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = rng();
        let n = 20_000;
        let samples: Vec<f64> = (0..n)
            .map(|_| normal(&mut rng) as f64 / S1615_ONE as f64)
            .collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.06, "var {var}");
    }

    #[test]
    fn test_variates_are_bit_stable() {
        let draw = |seed| {
            let mut rng = MarsKiss64::new(seed);
            (
                binomial(&mut rng, 50, S1615_ONE / 3),
                binomial_fraction(&mut rng, 50, 1, 3),
                hypergeometric(&mut rng, 20, 30, 10),
                exponential(&mut rng),
                normal(&mut rng),
            )
        };
        assert_eq!(draw([9, 8, 7, 6]), draw([9, 8, 7, 6]));
    }
}

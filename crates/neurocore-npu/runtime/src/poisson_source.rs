// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Poisson Source
//!
//! Independent Poisson spike generators, shared by the spike-source and current-input roles.
//!
//! ```text
//! region:    [seed × 4, timeToSpike × numSources, numUnique,
//!             {isSlow, startTick, endTick, data} × numUnique, uniqueIndex × numSources]
//! data:      slow → mean inter-spike interval in ticks (S1615)
//!            fast → e^-λ per tick (U032)
//! ```
//!
//! Slow sources spike at most once per tick and carry a countdown to their next spike; fast
//! sources draw a Poisson count every tick. A source is only active for
//! `startTick <= tick < endTick`.

use crate::config::ensure_len;
use crate::error::{Result, RuntimeError};
use neurocore_hal::{Dtcm, MemoryRegion};
use neurocore_npu_neural::fixed::{exp_s1615, mul_s1615, reciprocal_s1615};
use neurocore_npu_neural::random::{exponential, poisson};
use neurocore_npu_neural::{MarsKiss64, S1615, S1615_ONE, U032};
use tracing::debug;

/// Sources expecting fewer spikes per tick than this are generated as slow sources
pub const SLOW_LAMBDA_LIMIT: S1615 = S1615_ONE / 4;

const PARAMETER_WORDS: u32 = 4;

/// Parameters shared by every source mapped to them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoissonParameters {
    pub is_slow: bool,
    pub start_tick: u32,
    /// Exclusive; `u32::MAX` never ends
    pub end_tick: u32,
    pub data: u32,
}

impl PoissonParameters {
    pub fn slow(start_tick: u32, end_tick: u32, mean_isi_ticks: S1615) -> Self {
        Self {
            is_slow: true,
            start_tick,
            end_tick,
            data: mean_isi_ticks as u32,
        }
    }

    pub fn fast(start_tick: u32, end_tick: u32, exp_minus_lambda: U032) -> Self {
        Self {
            is_slow: false,
            start_tick,
            end_tick,
            data: exp_minus_lambda,
        }
    }

    /// Parameters for a source firing at `rate_hz` with ticks of `timestep_us`
    pub fn from_rate(rate_hz: u32, timestep_us: u32, start_tick: u32, end_tick: u32) -> Self {
        let lambda = ((rate_hz as u64 * timestep_us as u64) << 15) / 1_000_000;
        let lambda = lambda.min(i32::MAX as u64) as S1615;
        if lambda > 0 && lambda < SLOW_LAMBDA_LIMIT {
            Self::slow(start_tick, end_tick, reciprocal_s1615(lambda))
        } else {
            Self::fast(start_tick, end_tick, exp_minus_lambda(lambda))
        }
    }

    pub fn is_active(&self, tick: u32) -> bool {
        tick >= self.start_tick && tick < self.end_tick
    }

    pub fn mean_isi(&self) -> S1615 {
        self.data as S1615
    }

    fn to_words(self) -> [u32; PARAMETER_WORDS as usize] {
        [self.is_slow as u32, self.start_tick, self.end_tick, self.data]
    }
}

/// `e^-λ` as a U032 probability; saturates to the top of the range for λ = 0
pub fn exp_minus_lambda(lambda: S1615) -> U032 {
    ((exp_s1615(-lambda) as u64) << 17).min(u32::MAX as u64) as u32
}

/// Host-side description of a Poisson region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoissonSourceLayout {
    pub seed: [u32; 4],
    pub time_to_spike: Vec<S1615>,
    pub parameters: Vec<PoissonParameters>,
    /// Index into `parameters` for each source
    pub parameter_index: Vec<u32>,
}

impl PoissonSourceLayout {
    /// `num_sources` sources all sharing `parameters`, first slow spike after one mean interval
    pub fn uniform(seed: [u32; 4], num_sources: usize, parameters: PoissonParameters) -> Self {
        let initial = if parameters.is_slow {
            parameters.mean_isi()
        } else {
            0
        };
        Self {
            seed,
            time_to_spike: vec![initial; num_sources],
            parameters: vec![parameters],
            parameter_index: vec![0; num_sources],
        }
    }

    pub fn to_words(&self) -> Vec<u32> {
        let mut words = self.seed.to_vec();
        words.extend(self.time_to_spike.iter().map(|&t| t as u32));
        words.push(self.parameters.len() as u32);
        for p in &self.parameters {
            words.extend_from_slice(&p.to_words());
        }
        words.extend_from_slice(&self.parameter_index);
        words
    }
}

#[derive(Debug, Clone)]
pub struct PoissonSource {
    rng: MarsKiss64,
    time_to_spike: Vec<S1615>,
    parameters: Vec<PoissonParameters>,
    parameter_index: Vec<u32>,
}

impl PoissonSource {
    pub fn read(region: &MemoryRegion, num_sources: usize, dtcm: &mut Dtcm) -> Result<Self> {
        let n = num_sources as u32;
        ensure_len(region, "PoissonSource", 4 + n + 1)?;
        let mut cursor = region.cursor();
        let seed = [
            cursor.read_u32()?,
            cursor.read_u32()?,
            cursor.read_u32()?,
            cursor.read_u32()?,
        ];

        let mut time_to_spike = dtcm.alloc(num_sources, 0)?;
        for t in time_to_spike.iter_mut() {
            *t = cursor.read_i32()?;
        }

        let num_unique = cursor.read_u32()?;
        ensure_len(region, "PoissonSource", 4 + n + 1 + PARAMETER_WORDS * num_unique + n)?;
        let mut parameters = dtcm.alloc(
            num_unique as usize,
            PoissonParameters::fast(0, 0, u32::MAX),
        )?;
        for p in parameters.iter_mut() {
            *p = PoissonParameters {
                is_slow: cursor.read_bool()?,
                start_tick: cursor.read_u32()?,
                end_tick: cursor.read_u32()?,
                data: cursor.read_u32()?,
            };
        }

        let mut parameter_index = dtcm.alloc(num_sources, 0u32)?;
        for (source, index) in parameter_index.iter_mut().enumerate() {
            let raw = cursor.read_u32()?;
            if raw >= num_unique {
                return Err(RuntimeError::invalid(
                    "Poisson source",
                    format!("source {source} maps to parameter set {raw} of {num_unique}"),
                ));
            }
            *index = raw;
        }

        debug!(num_sources, num_unique, "Poisson sources loaded");
        Ok(Self {
            rng: MarsKiss64::new(seed),
            time_to_spike,
            parameters,
            parameter_index,
        })
    }

    pub fn num_sources(&self) -> usize {
        self.time_to_spike.len()
    }

    pub fn time_to_spike(&self, source: usize) -> Option<S1615> {
        self.time_to_spike.get(source).copied()
    }

    /// Advance every source by one tick, calling `emit(source, count)` for each that spikes
    pub fn update(&mut self, tick: u32, mut emit: impl FnMut(usize, u32)) {
        for source in 0..self.time_to_spike.len() {
            let params = self.parameters[self.parameter_index[source] as usize];
            if !params.is_active(tick) {
                continue;
            }
            if params.is_slow {
                let countdown = &mut self.time_to_spike[source];
                if *countdown <= 0 {
                    emit(source, 1);
                    let interval = mul_s1615(params.mean_isi(), exponential(&mut self.rng));
                    *countdown = countdown.saturating_add(interval);
                }
                *countdown = countdown.saturating_sub(S1615_ONE);
            } else {
                let count = poisson(&mut self.rng, params.data);
                if count > 0 {
                    emit(source, count);
                }
            }
        }
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Spike Source
//!
//! Emits spikes from local generators: independent Poisson processes, or a fixed raster when
//! the image carries an ArraySource region. A source spiking `k` times on a tick sends `k`
//! packets with key `spikeKey | n`.
//!
//! ## System app words
//! `[numSources, spikeKey, flushKey]`

use super::{Role, TickCounter};
use crate::error::Result;
use neurocore_hal::{Application, Dtcm, ExitCode, Platform, Sdram};
use neurocore_npu_runtime::{
    define_statistics, ArraySource, ConfigImage, FlushState, ImageLocation, PoissonSource,
    Profiler, ProfilerTag, SpikeRecorder, SpikeSourceRegion, Statistics, SystemRegion,
};
use std::any::Any;
use tracing::{error, info, trace};

const ROLE: &str = "spike_source";
const APP_WORDS: usize = 3;

define_statistics! {
    /// Counters of the spike source
    SpikeSourceStatistic {
        Spikes = 0,
        Flushes = 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpikeSourceConfig {
    pub num_sources: u32,
    pub spike_key: u32,
    pub flush_key: u32,
}

impl SpikeSourceConfig {
    pub fn from_app_words(words: &[u32]) -> Self {
        Self {
            num_sources: words.first().copied().unwrap_or(0),
            spike_key: words.get(1).copied().unwrap_or(0),
            flush_key: words.get(2).copied().unwrap_or(0),
        }
    }

    pub fn to_app_words(&self) -> Vec<u32> {
        vec![self.num_sources, self.spike_key, self.flush_key]
    }
}

#[derive(Debug)]
enum Generator {
    Poisson(PoissonSource),
    Array(ArraySource),
}

impl Generator {
    fn name(&self) -> &'static str {
        match self {
            Self::Poisson(_) => "poisson",
            Self::Array(_) => "array",
        }
    }
}

pub struct SpikeSource {
    system: SystemRegion,
    config: SpikeSourceConfig,
    generator: Generator,
    /// Spikes per source this tick
    counts: Vec<u32>,
    flush: FlushState,
    spike_recorder: SpikeRecorder,
    tick: TickCounter,
    statistics: Statistics<SpikeSourceStatistic>,
    profiler: Profiler,
}

impl SpikeSource {
    pub fn config(&self) -> SpikeSourceConfig {
        self.config
    }

    pub fn statistics(&self) -> &Statistics<SpikeSourceStatistic> {
        &self.statistics
    }

    /// Poisson generator state, if this source is Poisson driven
    pub fn poisson(&self) -> Option<&PoissonSource> {
        match &self.generator {
            Generator::Poisson(p) => Some(p),
            Generator::Array(_) => None,
        }
    }

    pub fn tick(&self) -> u32 {
        self.tick.current()
    }

    fn finalise(&mut self, platform: &mut dyn Platform) {
        if let Err(e) = self.statistics.finalise(ROLE) {
            error!(error = %e, "Statistics write failed");
        }
        if let Err(e) = self.profiler.finalise() {
            error!(error = %e, "Profiler write failed");
        }
        info!(
            tick = self.tick.current(),
            spikes = self.statistics.get(SpikeSourceStatistic::Spikes),
            "Spike source finished"
        );
        platform.exit(ExitCode::SUCCESS);
    }
}

impl Role for SpikeSource {
    fn boot(sdram: &Sdram, location: ImageLocation, dtcm: &mut Dtcm) -> Result<Self> {
        let image = ConfigImage::<SpikeSourceRegion>::parse(sdram, location)?;
        let system = SystemRegion::parse(image.require(SpikeSourceRegion::System)?, APP_WORDS)?;
        let config = SpikeSourceConfig::from_app_words(&system.app_words);
        let n = config.num_sources as usize;

        let generator = match image.region(SpikeSourceRegion::ArraySource) {
            Some(region) => Generator::Array(ArraySource::read(region, n)?),
            None => Generator::Poisson(PoissonSource::read(
                image.require(SpikeSourceRegion::SpikeSource)?,
                n,
                dtcm,
            )?),
        };
        let counts = dtcm.alloc(n, 0u32)?;
        let flush = FlushState::read(image.region(SpikeSourceRegion::Flush), n, dtcm)?;
        let spike_recorder =
            SpikeRecorder::read(image.region(SpikeSourceRegion::SpikeRecording), dtcm)?;

        info!(
            generator = generator.name(),
            num_sources = n,
            spike_key = format_args!("0x{:08x}", config.spike_key),
            simulation_ticks = system.simulation_ticks,
            "Spike source configured"
        );

        Ok(Self {
            system,
            config,
            generator,
            counts,
            flush,
            spike_recorder,
            tick: TickCounter::default(),
            statistics: Statistics::new(image.region(SpikeSourceRegion::Statistics)),
            profiler: Profiler::read(image.region(SpikeSourceRegion::Profiler))?,
        })
    }
}

impl Application for SpikeSource {
    fn name(&self) -> &'static str {
        ROLE
    }

    fn on_start(&mut self, platform: &mut dyn Platform) {
        platform.set_timer_tick(self.system.timer_period_us);
    }

    fn on_timer(&mut self, platform: &mut dyn Platform) {
        let tick = self.tick.advance();
        if self.system.is_finished(tick) {
            self.finalise(platform);
            return;
        }
        let _profile = self.profiler.scope(ProfilerTag::GenerateSpikes, &*platform);
        let irq = platform.interrupts();

        self.counts.fill(0);
        let counts = &mut self.counts;
        let mut record = |source: usize, count: u32| {
            if let Some(c) = counts.get_mut(source) {
                *c += count;
            }
        };
        match &mut self.generator {
            Generator::Poisson(p) => p.update(tick, &mut record),
            Generator::Array(a) => {
                if let Err(e) = a.update(tick, &mut record) {
                    error!(tick, error = %e, "Array source read failed");
                }
            }
        }

        let mut spikes = 0;
        for (n, &count) in self.counts.iter().enumerate() {
            let spiked = count > 0;
            self.spike_recorder.record(n, spiked);
            if spiked {
                for _ in 0..count {
                    platform.multicast_send_blocking(self.config.spike_key | n as u32, None);
                }
                spikes += count;
            }
            if self.flush.should_flush(n, spiked) {
                platform.multicast_send_blocking(self.config.flush_key | n as u32, None);
                self.statistics
                    .increment(SpikeSourceStatistic::Flushes, &irq);
            }
        }
        if spikes > 0 {
            self.statistics
                .add(SpikeSourceStatistic::Spikes, spikes, &irq);
        }
        self.spike_recorder.end_tick();
        trace!(tick, spikes, "Spikes generated");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

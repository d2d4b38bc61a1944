// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Current Input
//!
//! Poisson-driven current injection. Each tick every source's spike count times its output
//! weight is written to output slab `tick % 2`, which a neuron processor gathers like any
//! synapse processor's slab.
//!
//! ## System app words
//! `[numNeurons]`

use super::{Role, TickCounter};
use crate::error::Result;
use neurocore_hal::{Application, DmaDirection, DmaTag, Dtcm, ExitCode, Platform, Sdram};
use neurocore_npu_runtime::config::ensure_len;
use neurocore_npu_runtime::{
    ConfigImage, CurrentInputRegion, ImageLocation, PoissonSource, Profiler, ProfilerTag,
    SlabPair, SpikeRecorder, SystemRegion,
};
use std::any::Any;
use tracing::{error, info, trace};

const ROLE: &str = "current_input";
const APP_WORDS: usize = 1;

pub const TAG_OUTPUT: DmaTag = 0;

pub struct CurrentInput {
    system: SystemRegion,
    num_neurons: usize,
    source: PoissonSource,
    output: SlabPair,
    weights: Vec<i32>,
    /// `None` while the slab transfer is in flight
    output_buffer: Option<Vec<u32>>,
    spike_recorder: SpikeRecorder,
    tick: TickCounter,
    profiler: Profiler,
}

impl CurrentInput {
    pub fn num_neurons(&self) -> usize {
        self.num_neurons
    }

    pub fn output_slabs(&self) -> SlabPair {
        self.output
    }

    pub fn tick(&self) -> u32 {
        self.tick.current()
    }
}

impl Role for CurrentInput {
    fn boot(sdram: &Sdram, location: ImageLocation, dtcm: &mut Dtcm) -> Result<Self> {
        let image = ConfigImage::<CurrentInputRegion>::parse(sdram, location)?;
        let system = SystemRegion::parse(image.require(CurrentInputRegion::System)?, APP_WORDS)?;
        let num_neurons = system.app_words.first().copied().unwrap_or(0) as usize;

        let source = PoissonSource::read(
            image.require(CurrentInputRegion::PoissonSource)?,
            num_neurons,
            dtcm,
        )?;
        let output = SlabPair::read(&mut image.require(CurrentInputRegion::OutputBuffer)?.cursor())?;

        let weight_region = image.require(CurrentInputRegion::OutputWeight)?;
        ensure_len(weight_region, "OutputWeight", num_neurons as u32)?;
        let mut weights = dtcm.alloc(num_neurons, 0i32)?;
        for (i, w) in weights.iter_mut().enumerate() {
            *w = weight_region.read_i32(i as u32)?;
        }

        let output_buffer = dtcm.alloc(num_neurons, 0u32)?;
        let spike_recorder =
            SpikeRecorder::read(image.region(CurrentInputRegion::SpikeRecording), dtcm)?;

        info!(num_neurons, simulation_ticks = system.simulation_ticks, "Current input configured");

        Ok(Self {
            system,
            num_neurons,
            source,
            output,
            weights,
            output_buffer: Some(output_buffer),
            spike_recorder,
            tick: TickCounter::default(),
            profiler: Profiler::read(image.region(CurrentInputRegion::Profiler))?,
        })
    }
}

impl Application for CurrentInput {
    fn name(&self) -> &'static str {
        ROLE
    }

    fn on_start(&mut self, platform: &mut dyn Platform) {
        platform.set_timer_tick(self.system.timer_period_us);
    }

    fn on_timer(&mut self, platform: &mut dyn Platform) {
        let tick = self.tick.advance();
        if self.system.is_finished(tick) {
            if let Err(e) = self.profiler.finalise() {
                error!(error = %e, "Profiler write failed");
            }
            info!(tick, "Current input finished");
            platform.exit(ExitCode::SUCCESS);
            return;
        }

        let Some(mut buffer) = self.output_buffer.take() else {
            error!(tick, "Output slab transfer still in flight");
            return;
        };
        let _profile = self.profiler.scope(ProfilerTag::GenerateSpikes, &*platform);

        buffer.clear();
        buffer.resize(self.num_neurons, 0);
        let weights = &self.weights;
        self.source.update(tick, |n, count| {
            if let (Some(out), Some(&w)) = (buffer.get_mut(n), weights.get(n)) {
                *out = (w.wrapping_mul(count as i32)) as u32;
            }
        });

        let mut spikes = 0u32;
        for (n, &value) in buffer.iter().enumerate() {
            let spiked = value != 0;
            spikes += spiked as u32;
            self.spike_recorder.record(n, spiked);
        }
        self.spike_recorder.end_tick();
        trace!(tick, spikes, "Current injected");

        platform.dma_transfer(TAG_OUTPUT, self.output.write_slab(tick), buffer, DmaDirection::Write);
    }

    fn on_dma_done(&mut self, tag: DmaTag, buffer: Vec<u32>, _platform: &mut dyn Platform) {
        match tag {
            TAG_OUTPUT => self.output_buffer = Some(buffer),
            _ => error!(tag, "Unknown DMA tag"),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

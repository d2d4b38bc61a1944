// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synapse Processor
//!
//! Turns incoming spikes into delayed input for one neuron processor.
//!
//! ```text
//!    Idle ── spike arrives ──▶ Pending (user event raised)
//!    Pending ── user event ──▶ Fetching (row DMA issued)
//!    Fetching ── DMA done ──▶ Processing (row applied, written back, next row fetched)
//!    Processing ── no spikes and no due delay rows ──▶ Idle
//! ```
//!
//! Each tick:
//! 1. rows left over from the previous tick are counted as not processed and its delay slot is
//!    cleared;
//! 2. the ring-buffer slot of this tick is DMA'd to output slab `tick % 2`;
//! 3. once that completes, the slot is cleared and every back-propagation source is fetched,
//!    recording its spikes against `tick - 1`;
//! 4. only then are rows fetched: spikes first (FIFO), then the delay rows due on this tick.
//!
//! ## System app words
//! `[weightFractionalBits, flushMask, signedWeights]`

use super::{Role, TickCounter};
use crate::error::{Result, RoleError};
use neurocore_hal::{
    Application, DmaDirection, DmaTag, Dtcm, ExitCode, MemoryRegion, Platform, Sdram,
};
use neurocore_npu_neural::WeightFormat;
use neurocore_npu_plasticity::{
    read_rules, AdditiveWeight, MultiplicativeWeight, NearestPairTiming, PairTiming, RowProcessor,
    StaticRowProcessor, StdpRowProcessor, SynapticWordFormat, TimingDependence, TimingRule,
    TimingRuleId, Vogels2011Timing, WeightDependence, WeightRule, WeightRuleId,
};
use neurocore_npu_runtime::{
    define_statistics, BackPropagationInputs, CircularBuffer, ConfigImage, DelayBuffer, DelayRow,
    ImageLocation, KeyLookup, Profiler, ProfilerTag, RingBuffer, SlabPair, SpikeInputBuffer,
    Statistics, SynapseRegion, SystemRegion, MAX_ROW_SYNAPSES,
};
use std::any::Any;
use tracing::{debug, error, info, trace, warn};

const ROLE: &str = "synapse_processor";
const APP_WORDS: usize = 3;

/// Spikes that can wait for a row fetch
pub const SPIKE_INPUT_CAPACITY: usize = 256;
/// Row buffers: one being fetched while the other is processed or written back
const ROW_BUFFERS: usize = 2;
/// Delay rows queued per tick when no delay buffer is configured
const DEFAULT_DELAY_ROW_QUEUE: usize = 64;

pub const TAG_ROW_READ: DmaTag = 0;
pub const TAG_ROW_WRITE: DmaTag = 1;
pub const TAG_OUTPUT: DmaTag = 2;
pub const TAG_DELAY_ROWS: DmaTag = 3;
pub const TAG_BACK_PROPAGATION: DmaTag = 4;

define_statistics! {
    /// Counters of the synapse processor
    SynapseStatistic {
        RowsRequested = 0,
        DelayRowsRequested = 1,
        InputBufferOverflows = 2,
        KeyLookupFail = 3,
        DelayBuffersNotProcessed = 4,
    }
}

/// Role-specific words of the System region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynapseConfig {
    pub weight_fractional_bits: u32,
    /// Keys with any of these bits set are flush events
    pub flush_mask: u32,
    pub signed_weights: bool,
}

impl SynapseConfig {
    pub fn from_app_words(words: &[u32]) -> Self {
        Self {
            weight_fractional_bits: words.first().copied().unwrap_or(0),
            flush_mask: words.get(1).copied().unwrap_or(0),
            signed_weights: words.get(2).is_some_and(|&w| w != 0),
        }
    }

    pub fn to_app_words(&self) -> Vec<u32> {
        vec![
            self.weight_fractional_bits,
            self.flush_mask,
            self.signed_weights as u32,
        ]
    }

    pub fn word_format(&self) -> SynapticWordFormat {
        SynapticWordFormat {
            signed_weights: self.signed_weights,
            ..Default::default()
        }
    }

    pub fn weight_format(&self) -> WeightFormat {
        WeightFormat::new(self.weight_fractional_bits)
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlightRow {
    address: u32,
    flush: bool,
}

pub struct SynapseProcessor<P: RowProcessor> {
    system: SystemRegion,
    config: SynapseConfig,
    key_lookup: KeyLookup,
    matrix_base: u32,
    processor: P,
    ring: RingBuffer,
    output: SlabPair,
    output_buffer: Option<Vec<u32>>,
    delay_buffer: Option<DelayBuffer>,
    delay_rows: CircularBuffer<DelayRow>,
    delay_rows_fetched: bool,
    back_propagation: BackPropagationInputs,
    back_propagation_buffer: Option<Vec<u32>>,
    back_propagation_next: usize,
    spikes: SpikeInputBuffer,
    row_buffers: Vec<Vec<u32>>,
    row_in_flight: Option<InFlightRow>,
    /// Back propagation for this tick has been applied
    rows_enabled: bool,
    tick: TickCounter,
    statistics: Statistics<SynapseStatistic>,
    profiler: Profiler,
}

impl<P: RowProcessor> SynapseProcessor<P> {
    /// Start from a parsed image with an already constructed row processor
    pub fn from_image(
        image: &ConfigImage<SynapseRegion>,
        system: SystemRegion,
        processor: P,
        dtcm: &mut Dtcm,
    ) -> Result<Self> {
        let config = SynapseConfig::from_app_words(&system.app_words);
        let key_lookup = KeyLookup::read(image.require(SynapseRegion::KeyLookup)?, dtcm)?;
        let matrix_base = image.require(SynapseRegion::SynapticMatrix)?.base();
        let output = SlabPair::read(&mut image.require(SynapseRegion::OutputBuffer)?.cursor())?;
        let ring = RingBuffer::allocate(
            config.word_format().delay_bits,
            config.word_format().index_bits,
            dtcm,
        )?;
        let output_buffer = dtcm.alloc(ring.slice_len(), 0u32)?;

        let delay_buffer = image
            .region(SynapseRegion::DelayBuffer)
            .map(|r| DelayBuffer::read(r, dtcm))
            .transpose()?;
        let delay_queue = delay_buffer
            .as_ref()
            .map_or(DEFAULT_DELAY_ROW_QUEUE, |d| d.buffer_size() as usize);
        let delay_rows = CircularBuffer::allocate(delay_queue, dtcm)?;

        let back_propagation =
            BackPropagationInputs::read(image.region(SynapseRegion::BackPropagationInput))?;
        let back_propagation_buffer = dtcm.alloc(back_propagation.max_words(), 0u32)?;

        let max_row_words = processor.row_words(MAX_ROW_SYNAPSES - 1) as usize;
        let row_buffers = (0..ROW_BUFFERS)
            .map(|_| dtcm.alloc(max_row_words, 0u32))
            .collect::<core::result::Result<Vec<_>, _>>()?;

        let spikes = SpikeInputBuffer::allocate(SPIKE_INPUT_CAPACITY, dtcm)?;
        let statistics = Statistics::new(image.region(SynapseRegion::Statistics));
        let profiler = Profiler::read(image.region(SynapseRegion::Profiler))?;

        info!(
            rows = processor.name(),
            key_lookup_entries = key_lookup.len(),
            delay_slots = delay_buffer.as_ref().map_or(0, |d| d.num_slots()),
            back_propagation_inputs = back_propagation.len(),
            simulation_ticks = system.simulation_ticks,
            dtcm_used = dtcm.used(),
            "Synapse processor configured"
        );

        Ok(Self {
            system,
            config,
            key_lookup,
            matrix_base,
            processor,
            ring,
            output,
            output_buffer: Some(output_buffer),
            delay_buffer,
            delay_rows,
            delay_rows_fetched: false,
            back_propagation,
            back_propagation_buffer: Some(back_propagation_buffer),
            back_propagation_next: 0,
            spikes,
            row_buffers,
            row_in_flight: None,
            rows_enabled: false,
            tick: TickCounter::default(),
            statistics,
            profiler,
        })
    }

    pub fn row_processor(&self) -> &P {
        &self.processor
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn output_slabs(&self) -> SlabPair {
        self.output
    }

    pub fn config(&self) -> SynapseConfig {
        self.config
    }

    pub fn statistics(&self) -> &Statistics<SynapseStatistic> {
        &self.statistics
    }

    pub fn tick(&self) -> u32 {
        self.tick.current()
    }

    /// Spikes waiting for their rows
    pub fn pending_spikes(&self) -> usize {
        self.spikes.len()
    }

    fn finalise(&mut self, platform: &mut dyn Platform) {
        if let Err(e) = self.statistics.finalise(ROLE) {
            error!(error = %e, "Statistics write failed");
        }
        if let Err(e) = self.profiler.finalise() {
            error!(error = %e, "Profiler write failed");
        }
        info!(tick = self.tick.current(), "Synapse processor finished");
        platform.exit(ExitCode::SUCCESS);
    }

    fn fetch_back_propagation(&mut self, platform: &mut dyn Platform) {
        let tick = self.tick.current();
        let Some(input) = self.back_propagation.get(self.back_propagation_next) else {
            self.back_propagation_applied(platform);
            return;
        };
        match self.back_propagation_buffer.take() {
            Some(buffer) => input.fetch(tick, TAG_BACK_PROPAGATION, buffer, platform),
            None => {
                error!(tick, "Back propagation fetch while a fetch is in flight");
                self.back_propagation_applied(platform);
            }
        }
    }

    fn apply_back_propagation(&mut self, bits: Vec<u32>, platform: &mut dyn Platform) {
        {
            let _profile = self
                .profiler
                .scope(ProfilerTag::ProcessBackPropagation, &*platform);
            let spike_tick = self.tick.current().wrapping_sub(1);
            if let Some(input) = self.back_propagation.get(self.back_propagation_next) {
                for neuron in input.spiking_neurons(&bits) {
                    self.processor.add_post_synaptic_spike(spike_tick, neuron);
                }
            }
        }
        self.back_propagation_buffer = Some(bits);
        self.back_propagation_next += 1;
        self.fetch_back_propagation(platform);
    }

    fn back_propagation_applied(&mut self, platform: &mut dyn Platform) {
        let tick = self.tick.current();
        let fetching = self
            .delay_buffer
            .as_mut()
            .is_some_and(|d| d.fetch(tick, TAG_DELAY_ROWS, platform));
        self.delay_rows_fetched = !fetching;
        self.rows_enabled = true;
        trace!(tick, fetching_delay_rows = fetching, "Row processing enabled");
        self.process_rows(platform);
    }

    /// Issue the next row fetch if the pipeline is free
    fn process_rows(&mut self, platform: &mut dyn Platform) {
        if !self.rows_enabled || self.row_in_flight.is_some() {
            return;
        }
        let Some(buffer) = self.row_buffers.pop() else {
            return;
        };
        let irq = platform.interrupts();

        while let Some(key) = self.spikes.next_spike() {
            let flush = key & self.config.flush_mask != 0;
            let key = key & !self.config.flush_mask;
            let processor = &self.processor;
            match self
                .key_lookup
                .lookup_row(key, self.matrix_base, |n| processor.row_words(n))
            {
                Some(location) => {
                    self.statistics
                        .increment(SynapseStatistic::RowsRequested, &irq);
                    self.fetch_row(location.address, location.words, flush, buffer, platform);
                    return;
                }
                None => {
                    self.statistics
                        .increment(SynapseStatistic::KeyLookupFail, &irq);
                    debug!(key = format_args!("0x{key:08x}"), "No row for key");
                }
            }
        }

        if self.delay_rows_fetched {
            if let Some(delay) = self.delay_rows.pop() {
                let words = self.processor.row_words(delay.row.num_synapses());
                let address = self.matrix_base + 4 * delay.row.word_offset();
                self.statistics
                    .increment(SynapseStatistic::DelayRowsRequested, &irq);
                self.fetch_row(address, words, delay.flush, buffer, platform);
                return;
            }
        }

        self.row_buffers.push(buffer);
    }

    fn fetch_row(
        &mut self,
        address: u32,
        words: u32,
        flush: bool,
        mut buffer: Vec<u32>,
        platform: &mut dyn Platform,
    ) {
        buffer.resize(words as usize, 0);
        self.row_in_flight = Some(InFlightRow { address, flush });
        platform.dma_transfer(TAG_ROW_READ, address, buffer, DmaDirection::Read);
    }

    fn row_fetched(&mut self, mut row: Vec<u32>, platform: &mut dyn Platform) {
        let Some(fetched) = self.row_in_flight.take() else {
            error!("Row DMA completed with no row in flight");
            self.row_buffers.push(row);
            return;
        };
        let tick = self.tick.current();
        let irq = platform.interrupts();

        let outcome = {
            let _profile = self.profiler.scope(ProfilerTag::ProcessRow, &*platform);
            self.processor
                .process_row(tick, &mut row, fetched.flush, &mut self.ring)
        };

        match outcome {
            Ok(outcome) => {
                if let Some(ext) = outcome.delay_extension {
                    match &mut self.delay_buffer {
                        Some(delay) => {
                            // A full slot is counted when the slot is serviced
                            delay.add_row(ext.tick, ext.row, ext.flush);
                        }
                        None => {
                            warn!(tick, "Delay extension with no delay buffer");
                            self.statistics
                                .increment(SynapseStatistic::DelayBuffersNotProcessed, &irq);
                        }
                    }
                }
                if let Some(from) = outcome.write_back_from.filter(|&f| f < row.len()) {
                    row.drain(..from);
                    platform.dma_transfer(
                        TAG_ROW_WRITE,
                        fetched.address + 4 * from as u32,
                        row,
                        DmaDirection::Write,
                    );
                    self.process_rows(platform);
                    return;
                }
            }
            Err(e) => error!(
                error = %e,
                address = format_args!("0x{:08x}", fetched.address),
                "Row processing failed"
            ),
        }

        self.row_buffers.push(row);
        self.process_rows(platform);
    }
}

impl<P: RowProcessor + Send + 'static> Application for SynapseProcessor<P> {
    fn name(&self) -> &'static str {
        ROLE
    }

    fn on_start(&mut self, platform: &mut dyn Platform) {
        platform.set_timer_tick(self.system.timer_period_us);
    }

    fn on_timer(&mut self, platform: &mut dyn Platform) {
        let tick = self.tick.advance();
        let irq = platform.interrupts();

        let leftover = self.delay_rows.clear() as u32;
        let lost = self
            .delay_buffer
            .as_mut()
            .map_or(0, |d| d.clear_slot(tick.wrapping_sub(1)));
        if leftover + lost > 0 {
            self.statistics.add(
                SynapseStatistic::DelayBuffersNotProcessed,
                leftover + lost,
                &irq,
            );
        }
        self.delay_rows_fetched = false;
        self.rows_enabled = false;
        self.back_propagation_next = 0;

        if self.system.is_finished(tick) {
            self.finalise(platform);
            return;
        }

        let _profile = self.profiler.scope(ProfilerTag::TimerTick, &*platform);
        match self.output_buffer.take() {
            Some(mut buffer) => {
                self.ring.copy_output(tick, &mut buffer);
                platform.dma_transfer(
                    TAG_OUTPUT,
                    self.output.write_slab(tick),
                    buffer,
                    DmaDirection::Write,
                );
            }
            None => error!(tick, "Output slab transfer still in flight"),
        }
    }

    fn on_multicast(&mut self, key: u32, _payload: Option<u32>, platform: &mut dyn Platform) {
        if self.spikes.add_spike(key) {
            platform.trigger_user_event();
        } else {
            self.statistics
                .increment(SynapseStatistic::InputBufferOverflows, &platform.interrupts());
        }
    }

    fn on_dma_done(&mut self, tag: DmaTag, buffer: Vec<u32>, platform: &mut dyn Platform) {
        match tag {
            TAG_OUTPUT => {
                self.ring.clear_output(self.tick.current());
                self.output_buffer = Some(buffer);
                self.fetch_back_propagation(platform);
            }
            TAG_BACK_PROPAGATION => self.apply_back_propagation(buffer, platform),
            TAG_DELAY_ROWS => {
                let tick = self.tick.current();
                if let Some(delay) = &mut self.delay_buffer {
                    let queued = delay.process_dma_buffer(tick, buffer, &mut self.delay_rows);
                    trace!(tick, queued, "Delay rows fetched");
                }
                self.delay_rows_fetched = true;
                self.process_rows(platform);
            }
            TAG_ROW_READ => self.row_fetched(buffer, platform),
            TAG_ROW_WRITE => {
                self.row_buffers.push(buffer);
                self.process_rows(platform);
            }
            _ => error!(tag, "Unknown DMA tag"),
        }
    }

    fn on_user_event(&mut self, platform: &mut dyn Platform) {
        self.process_rows(platform);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Role for SynapseProcessor<StaticRowProcessor> {
    fn boot(sdram: &Sdram, location: ImageLocation, dtcm: &mut Dtcm) -> Result<Self> {
        let image = ConfigImage::<SynapseRegion>::parse(sdram, location)?;
        let system = SystemRegion::parse(image.require(SynapseRegion::System)?, APP_WORDS)?;
        let config = SynapseConfig::from_app_words(&system.app_words);
        let processor = StaticRowProcessor::new(config.word_format());
        Self::from_image(&image, system, processor, dtcm)
    }
}

impl<T, W> Role for SynapseProcessor<StdpRowProcessor<T, W>>
where
    T: TimingDependence + TimingRuleId + Send + 'static,
    T::PostTrace: Send,
    W: WeightDependence + WeightRuleId + Send + 'static,
{
    fn boot(sdram: &Sdram, location: ImageLocation, dtcm: &mut Dtcm) -> Result<Self> {
        let image = ConfigImage::<SynapseRegion>::parse(sdram, location)?;
        let system = SystemRegion::parse(image.require(SynapseRegion::System)?, APP_WORDS)?;
        let plasticity = image.require(SynapseRegion::Plasticity)?;
        stdp_processor(&image, system, plasticity, dtcm)
    }
}

fn stdp_processor<T, W>(
    image: &ConfigImage<SynapseRegion>,
    system: SystemRegion,
    plasticity: &MemoryRegion,
    dtcm: &mut Dtcm,
) -> Result<SynapseProcessor<StdpRowProcessor<T, W>>>
where
    T: TimingDependence + TimingRuleId,
    W: WeightDependence + WeightRuleId,
{
    let config = SynapseConfig::from_app_words(&system.app_words);
    let processor =
        StdpRowProcessor::read(plasticity, config.word_format(), config.weight_format(), dtcm)?;
    SynapseProcessor::from_image(image, system, processor, dtcm)
}

fn boxed<T, W>(
    image: &ConfigImage<SynapseRegion>,
    system: SystemRegion,
    plasticity: &MemoryRegion,
    dtcm: &mut Dtcm,
) -> Result<Box<dyn Application + Send>>
where
    T: TimingDependence + TimingRuleId + Send + 'static,
    T::PostTrace: Send,
    W: WeightDependence + WeightRuleId + Send + 'static,
{
    Ok(Box::new(stdp_processor::<T, W>(image, system, plasticity, dtcm)?))
}

/// Start a synapse processor with the row format its image asks for
///
/// No (or an empty) Plasticity region means static rows; otherwise the region's rule ids pick
/// the timing and weight dependence.
pub fn boot_synapse_processor(
    sdram: &Sdram,
    location: ImageLocation,
    dtcm: &mut Dtcm,
) -> Result<Box<dyn Application + Send>> {
    let image = ConfigImage::<SynapseRegion>::parse(sdram, location)?;
    let system = SystemRegion::parse(image.require(SynapseRegion::System)?, APP_WORDS)?;
    let Some(plasticity) = image
        .region(SynapseRegion::Plasticity)
        .filter(|r| !r.is_empty())
    else {
        let config = SynapseConfig::from_app_words(&system.app_words);
        let processor = StaticRowProcessor::new(config.word_format());
        return Ok(Box::new(SynapseProcessor::from_image(
            &image, system, processor, dtcm,
        )?));
    };

    let (timing, weight) = read_rules(plasticity).map_err(RoleError::from)?;
    debug!(?timing, ?weight, "Plastic synapse processor");
    match (timing, weight) {
        (TimingRule::Pair, WeightRule::Additive) => {
            boxed::<PairTiming, AdditiveWeight>(&image, system, plasticity, dtcm)
        }
        (TimingRule::Pair, WeightRule::Multiplicative) => {
            boxed::<PairTiming, MultiplicativeWeight>(&image, system, plasticity, dtcm)
        }
        (TimingRule::NearestPair, WeightRule::Additive) => {
            boxed::<NearestPairTiming, AdditiveWeight>(&image, system, plasticity, dtcm)
        }
        (TimingRule::NearestPair, WeightRule::Multiplicative) => {
            boxed::<NearestPairTiming, MultiplicativeWeight>(&image, system, plasticity, dtcm)
        }
        (TimingRule::Vogels2011, WeightRule::Additive) => {
            boxed::<Vogels2011Timing, AdditiveWeight>(&image, system, plasticity, dtcm)
        }
        (TimingRule::Vogels2011, WeightRule::Multiplicative) => {
            boxed::<Vogels2011Timing, MultiplicativeWeight>(&image, system, plasticity, dtcm)
        }
    }
}

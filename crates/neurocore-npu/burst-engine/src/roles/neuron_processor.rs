// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neuron Processor
//!
//! Integrates a population of point neurons once per tick.
//!
//! Each tick:
//! 1. every synapse state is shaped (decayed);
//! 2. the input slabs written by the synapse processors on the previous tick are gathered by
//!    DMA, two buffers deep, and applied to the receptor each slab feeds;
//! 3. every neuron is updated, recorded and, if it spiked or is due a flush, a multicast packet
//!    with key `(spiked ? spikeKey : flushKey) | n` is sent;
//! 4. this tick's back-propagation bit-vector is DMA'd to slab `tick % 2`.
//!
//! ## System app words
//! `[numNeurons, spikeKey, flushKey]`

use super::{ModelBlocks, Role, TickCounter};
use crate::error::{Result, RoleError};
use neurocore_hal::{Application, DmaDirection, DmaTag, Dtcm, ExitCode, MemoryRegion, Platform, Sdram};
use neurocore_npu_neural::{
    ExpSynapse, IfCond, IfCurr, IntrinsicPlasticity, ModelParameters, NeuronModel,
    NoIntrinsicPlasticity, Recordable, SynapseModel, S1615,
};
use neurocore_npu_runtime::{
    define_statistics, AnalogueRecorder, BackPropagationOutput, ConfigImage, FlushState,
    ImageLocation, InputBuffers, NeuronRegion, Profiler, ProfilerTag, SpikeRecorder, Statistics,
    SystemRegion,
};
use std::any::Any;
use tracing::{debug, error, info, trace};

const ROLE: &str = "neuron_processor";
const APP_WORDS: usize = 3;

pub const TAG_BACK_PROPAGATION: DmaTag = 0;
/// Input gather uses this tag and the next, one per DMA buffer
pub const TAG_INPUT_BASE: DmaTag = 1;

define_statistics! {
    /// Counters of the neuron processor
    NeuronStatistic {
        Spikes = 0,
        Flushes = 1,
        SendRetries = 2,
    }
}

/// Role-specific words of the System region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronConfig {
    pub num_neurons: u32,
    pub spike_key: u32,
    pub flush_key: u32,
}

impl NeuronConfig {
    pub fn from_app_words(words: &[u32]) -> Self {
        Self {
            num_neurons: words.first().copied().unwrap_or(0),
            spike_key: words.get(1).copied().unwrap_or(0),
            flush_key: words.get(2).copied().unwrap_or(0),
        }
    }

    pub fn to_app_words(&self) -> Vec<u32> {
        vec![self.num_neurons, self.spike_key, self.flush_key]
    }
}

/// Neuron dynamics a neuron processor image can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeuronKind {
    /// Current-based leaky integrate-and-fire with exponential synapses
    IfCurrExp,
    /// Conductance-based leaky integrate-and-fire with exponential synapses
    IfCondExp,
}

pub type IfCurrExpProcessor = NeuronProcessor<IfCurr, ExpSynapse, NoIntrinsicPlasticity>;
pub type IfCondExpProcessor = NeuronProcessor<IfCond, ExpSynapse, NoIntrinsicPlasticity>;

pub struct NeuronProcessor<N, S, IP>
where
    N: NeuronModel,
    S: SynapseModel,
{
    system: SystemRegion,
    config: NeuronConfig,
    neuron: N,
    synapse: S,
    intrinsic: IP,
    neuron_region: MemoryRegion,
    synapse_region: MemoryRegion,
    neuron_state: Vec<N::State>,
    neuron_params: Vec<N::Params>,
    synapse_state: Vec<S::State>,
    synapse_params: Vec<S::Params>,
    inputs: InputBuffers,
    input_buffers: [Option<Vec<u32>>; 2],
    /// Descriptor whose slab is the oldest outstanding DMA
    input_next: usize,
    back_propagation: Option<BackPropagationOutput>,
    flush: FlushState,
    spike_recorder: SpikeRecorder,
    analogue: heapless::Vec<AnalogueRecorder, { Recordable::COUNT }>,
    tick: TickCounter,
    statistics: Statistics<NeuronStatistic>,
    profiler: Profiler,
}

impl<N, S, IP> NeuronProcessor<N, S, IP>
where
    N: NeuronModel,
    S: SynapseModel,
    IP: IntrinsicPlasticity,
{
    pub fn from_image(
        image: &ConfigImage<NeuronRegion>,
        system: SystemRegion,
        neuron: N,
        synapse: S,
        intrinsic: IP,
        dtcm: &mut Dtcm,
    ) -> Result<Self> {
        let config = NeuronConfig::from_app_words(&system.app_words);
        let n = config.num_neurons as usize;

        let neuron_region = image.require(NeuronRegion::Neuron)?.clone();
        let neurons = ModelBlocks::<N::State, N::Params>::read(&neuron_region, "Neuron", n, dtcm)?;
        for params in &neurons.params {
            params.validate()?;
        }
        let synapse_region = image.require(NeuronRegion::Synapse)?.clone();
        let synapses =
            ModelBlocks::<S::State, S::Params>::read(&synapse_region, "Synapse", n, dtcm)?;
        for params in &synapses.params {
            params.validate()?;
        }

        let inputs = InputBuffers::read(image.require(NeuronRegion::InputBuffer)?, n, dtcm)?;
        let slab_words = inputs.max_neurons();
        let input_buffers = [
            Some(dtcm.alloc(slab_words, 0u32)?),
            Some(dtcm.alloc(slab_words, 0u32)?),
        ];

        let back_propagation =
            BackPropagationOutput::read(image.region(NeuronRegion::BackPropagationOutput), n, dtcm)?;
        let flush = FlushState::read(image.region(NeuronRegion::Flush), n, dtcm)?;
        let spike_recorder = SpikeRecorder::read(image.region(NeuronRegion::SpikeRecording), dtcm)?;
        let mut analogue = heapless::Vec::new();
        for channel in Recordable::ALL {
            let recorder =
                AnalogueRecorder::read(image.region(NeuronRegion::analogue(channel)), n, dtcm)?;
            if analogue.push(recorder).is_err() {
                return Err(RoleError::unsupported(ROLE, "too many analogue channels"));
            }
        }
        if image
            .region(NeuronRegion::IntrinsicPlasticity)
            .is_some_and(|r| !r.is_empty())
        {
            debug!("IntrinsicPlasticity region present but not used by this model");
        }

        let statistics = Statistics::new(image.region(NeuronRegion::Statistics));
        let profiler = Profiler::read(image.region(NeuronRegion::Profiler))?;

        info!(
            neuron_model = neuron.model_name(),
            synapse_model = synapse.model_name(),
            num_neurons = n,
            input_buffers = inputs.len(),
            back_propagation = back_propagation.is_some(),
            flush_time = flush.flush_time(),
            spike_key = format_args!("0x{:08x}", config.spike_key),
            dtcm_used = dtcm.used(),
            "Neuron processor configured"
        );

        Ok(Self {
            system,
            config,
            neuron,
            synapse,
            intrinsic,
            neuron_region,
            synapse_region,
            neuron_state: neurons.state,
            neuron_params: neurons.params,
            synapse_state: synapses.state,
            synapse_params: synapses.params,
            inputs,
            input_buffers,
            input_next: 0,
            back_propagation,
            flush,
            spike_recorder,
            analogue,
            tick: TickCounter::default(),
            statistics,
            profiler,
        })
    }

    pub fn config(&self) -> NeuronConfig {
        self.config
    }

    pub fn neuron_state(&self, neuron: usize) -> Option<&N::State> {
        self.neuron_state.get(neuron)
    }

    pub fn synapse_state(&self, neuron: usize) -> Option<&S::State> {
        self.synapse_state.get(neuron)
    }

    pub fn statistics(&self) -> &Statistics<NeuronStatistic> {
        &self.statistics
    }

    pub fn tick(&self) -> u32 {
        self.tick.current()
    }

    fn finalise(&mut self, platform: &mut dyn Platform) {
        let written = ModelBlocks::<N::State, N::Params>::write_state(
            &self.neuron_region,
            &self.neuron_state,
        )
        .and_then(|()| {
            ModelBlocks::<S::State, S::Params>::write_state(
                &self.synapse_region,
                &self.synapse_state,
            )
        });
        if let Err(e) = written {
            error!(error = %e, "Neuron state write-back failed");
        }
        if let Err(e) = self.statistics.finalise(ROLE) {
            error!(error = %e, "Statistics write failed");
        }
        if let Err(e) = self.profiler.finalise() {
            error!(error = %e, "Profiler write failed");
        }
        info!(
            tick = self.tick.current(),
            spikes = self.statistics.get(NeuronStatistic::Spikes),
            "Neuron processor finished"
        );
        platform.exit(ExitCode::SUCCESS);
    }

    fn fetch_input(&mut self, index: usize, platform: &mut dyn Platform) {
        let Some(descriptor) = self.inputs.get(index) else {
            return;
        };
        let slot = index % 2;
        let Some(mut buffer) = self.input_buffers[slot].take() else {
            error!(index, "Input buffer DMA while the buffer is in flight");
            return;
        };
        buffer.resize(descriptor.num_neurons as usize, 0);
        platform.dma_transfer(
            TAG_INPUT_BASE + slot as u32,
            descriptor.slabs.read_slab(self.tick.current()),
            buffer,
            DmaDirection::Read,
        );
    }

    fn input_fetched(&mut self, slot: usize, buffer: Vec<u32>, platform: &mut dyn Platform) {
        let index = self.input_next;
        self.input_next += 1;
        // The other buffer is free again; overlap its fetch with this application
        self.fetch_input(index + 1, platform);

        if let Some(descriptor) = self.inputs.get(index) {
            let _profile = self.profiler.scope(ProfilerTag::ApplyInput, &*platform);
            for (i, &raw) in buffer.iter().enumerate() {
                if raw == 0 {
                    continue;
                }
                let n = descriptor.neuron(i);
                if let (Some(state), Some(params)) =
                    (self.synapse_state.get_mut(n), self.synapse_params.get(n))
                {
                    self.synapse
                        .apply_input(state, params, descriptor.to_s1615(raw), descriptor.receptor);
                }
            }
        }
        self.input_buffers[slot] = Some(buffer);

        if self.input_next >= self.inputs.len() {
            self.update_neurons(platform);
        }
    }

    fn update_neurons(&mut self, platform: &mut dyn Platform) {
        let tick = self.tick.current();
        let irq = platform.interrupts();
        let _profile = self.profiler.scope(ProfilerTag::UpdateNeurons, &*platform);
        let mut spikes = 0u32;

        for n in 0..self.neuron_state.len() {
            let (Some(s_state), Some(s_params)) =
                (self.synapse_state.get(n), self.synapse_params.get(n))
            else {
                break;
            };
            let exc: S1615 = self.synapse.exc_input(s_state, s_params);
            let inh: S1615 = self.synapse.inh_input(s_state, s_params);
            let ext: S1615 = self.intrinsic.intrinsic_current(n);

            let spiked = self.neuron.update(
                &mut self.neuron_state[n],
                &self.neuron_params[n],
                exc,
                inh,
                ext,
            );

            self.spike_recorder.record(n, spiked);
            self.intrinsic.apply_spike(n, spiked);
            if spiked {
                if let Some(bp) = &mut self.back_propagation {
                    bp.record_spike(n);
                }
            }

            let flush = self.flush.should_flush(n, spiked);
            if spiked || flush {
                let base = if spiked {
                    self.config.spike_key
                } else {
                    self.config.flush_key
                };
                let retries = platform.multicast_send_blocking(base | n as u32, None);
                if spiked {
                    spikes += 1;
                    self.statistics.increment(NeuronStatistic::Spikes, &irq);
                } else {
                    self.statistics.increment(NeuronStatistic::Flushes, &irq);
                }
                if retries > 0 {
                    self.statistics
                        .add(NeuronStatistic::SendRetries, retries, &irq);
                }
            }

            let v = self.neuron.membrane_voltage(&self.neuron_state[n]);
            for (channel, recorder) in Recordable::ALL.iter().zip(self.analogue.iter_mut()) {
                let value = match channel {
                    Recordable::MembraneVoltage => v,
                    Recordable::ExcInput => exc,
                    Recordable::InhInput => inh,
                    Recordable::ExtCurrent => ext,
                };
                recorder.record(n, value);
            }
        }

        self.spike_recorder.end_tick();
        if let Some(bp) = &mut self.back_propagation {
            bp.transfer(tick, TAG_BACK_PROPAGATION, platform);
        }
        for recorder in self.analogue.iter_mut() {
            recorder.end_tick();
        }
        trace!(tick, spikes, "Neurons updated");
    }
}

impl<N, S, IP> Application for NeuronProcessor<N, S, IP>
where
    N: NeuronModel + Send + 'static,
    N::State: Send,
    N::Params: Send,
    S: SynapseModel + Send + 'static,
    S::State: Send,
    S::Params: Send,
    IP: IntrinsicPlasticity + Send + 'static,
{
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

        {
            let _profile = self.profiler.scope(ProfilerTag::TimerTick, &*platform);
            for (state, params) in self.synapse_state.iter_mut().zip(&self.synapse_params) {
                self.synapse.shape(state, params);
            }
        }

        self.input_next = 0;
        if self.inputs.is_empty() {
            self.update_neurons(platform);
        } else {
            self.fetch_input(0, platform);
        }
    }

    fn on_dma_done(&mut self, tag: DmaTag, buffer: Vec<u32>, platform: &mut dyn Platform) {
        match tag {
            TAG_BACK_PROPAGATION => {
                if let Some(bp) = &mut self.back_propagation {
                    bp.transfer_done(buffer);
                }
            }
            t if t == TAG_INPUT_BASE || t == TAG_INPUT_BASE + 1 => {
                self.input_fetched((t - TAG_INPUT_BASE) as usize, buffer, platform)
            }
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

fn parse(
    sdram: &Sdram,
    location: ImageLocation,
) -> Result<(ConfigImage<NeuronRegion>, SystemRegion)> {
    let image = ConfigImage::<NeuronRegion>::parse(sdram, location)?;
    let system = SystemRegion::parse(image.require(NeuronRegion::System)?, APP_WORDS)?;
    Ok((image, system))
}

impl<N, S> Role for NeuronProcessor<N, S, NoIntrinsicPlasticity>
where
    N: NeuronModel + Default + Send + 'static,
    N::State: Send,
    N::Params: Send,
    S: SynapseModel + Default + Send + 'static,
    S::State: Send,
    S::Params: Send,
{
    fn boot(sdram: &Sdram, location: ImageLocation, dtcm: &mut Dtcm) -> Result<Self> {
        let (image, system) = parse(sdram, location)?;
        Self::from_image(
            &image,
            system,
            N::default(),
            S::default(),
            NoIntrinsicPlasticity,
            dtcm,
        )
    }
}

/// Start a neuron processor of the given kind
pub fn boot_neuron_processor(
    kind: NeuronKind,
    sdram: &Sdram,
    location: ImageLocation,
    dtcm: &mut Dtcm,
) -> Result<Box<dyn Application + Send>> {
    Ok(match kind {
        NeuronKind::IfCurrExp => Box::new(IfCurrExpProcessor::boot(sdram, location, dtcm)?),
        NeuronKind::IfCondExp => Box::new(IfCondExpProcessor::boot(sdram, location, dtcm)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_words_round_trip() {
        let config = NeuronConfig {
            num_neurons: 64,
            spike_key: 0x0001_0000,
            flush_key: 0x8001_0000,
        };
        assert_eq!(NeuronConfig::from_app_words(&config.to_app_words()), config);
    }
}

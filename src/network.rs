// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Demo Network
//!
//! A three-core feed-forward network built from a [`SimulationConfig`]:
//!
//! ```text
//! core 0  SpikeSource (Poisson)   key 0x0001_0000 | source
//!   │ multicast
//! core 1  SynapseProcessor<StaticRowProcessor>
//!   │ shared input slabs
//! core 2  IfCurrExpProcessor      key 0x0002_0000 | neuron, every neuron recorded
//! ```
//!
//! Connectivity is drawn once from the configured seed, so a given configuration always
//! produces the same matrix and, with it, the same spike raster.

use neurocore_config::SimulationConfig;
use neurocore_hal::{CoreId, Sdram};
use neurocore_npu_burst_engine::{
    IfCurrExpProcessor, Machine, MachineError, NeuronConfig, NeuronStatistic, SpikeSource,
    SpikeSourceConfig, SpikeSourceStatistic, SynapseConfig, SynapseProcessor, SynapseStatistic,
};
use neurocore_npu_neural::models::{
    ConstantThresholdParams, ExpSynapseParams, ExpSynapseState, IfCurrParams, IfState,
};
use neurocore_npu_neural::random::uniform_below;
use neurocore_npu_neural::{BitField, MarsKiss64, WordState, S1615, S1615_ONE};
use neurocore_npu_plasticity::{StaticRowProcessor, Synapse, SynapticWordFormat};
use neurocore_npu_runtime::{
    decode_spike_recording, BackPropagationOutput, ConfigImage, ImageBuilder, ImageLocation,
    InputBufferDescriptor, InputBuffers, KeyLookup, KeyLookupEntry, NeuronRegion,
    PoissonParameters, PoissonSourceLayout, RowOffsetLength, RuntimeError, SlabPair,
    SpikeRecorder, SpikeSourceRegion, SynapseRegion,
};
use tracing::{debug, info};

pub const SOURCE_CORE: CoreId = 0;
pub const SYNAPSE_CORE: CoreId = 1;
pub const NEURON_CORE: CoreId = 2;

const SOURCE_KEY: u32 = 0x0001_0000;
const NEURON_KEY: u32 = 0x0002_0000;
const FLUSH_BIT: u32 = 0x8000_0000;

/// Ring buffer output slab of the default synaptic word format
const OUTPUT_SLAB_WORDS: u32 = 1024;

/// Fractional bits of a configured weight; shifted up to S1615 by the neuron's input buffer
pub const WEIGHT_FRACTIONAL_BITS: u32 = 11;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("invalid network: {0}")]
    Invalid(String),
}

impl From<neurocore_hal::HalError> for NetworkError {
    fn from(e: neurocore_hal::HalError) -> Self {
        Self::Runtime(e.into())
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Activity counters gathered from the three cores after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkSummary {
    pub source_spikes: u32,
    pub rows_requested: u32,
    pub key_lookup_failures: u32,
    pub neuron_spikes: u32,
}

/// Handle on a loaded demo network
#[derive(Debug, Clone)]
pub struct DemoNetwork {
    num_sources: u32,
    num_neurons: u32,
    connections: usize,
    ticks: u32,
}

fn s1615(value: i32) -> S1615 {
    value * S1615_ONE
}

/// Leaky integrate-and-fire with tau_m = 20 ms, R = 20 MΩ at a 1 ms tick
fn neuron_params() -> IfCurrParams<ConstantThresholdParams> {
    IfCurrParams {
        v_reset: s1615(-70),
        v_rest: s1615(-65),
        // exp(-1 / 20)
        exp_tc: 0x79BC,
        r_membrane: s1615(20),
        i_offset: 0,
        t_refractory: 2,
        threshold: ConstantThresholdParams {
            v_threshold: s1615(-50),
        },
    }
}

/// Exponential synapse with tau = 5 ms
fn synapse_params() -> ExpSynapseParams {
    ExpSynapseParams {
        // exp(-1 / 5)
        exp_tau_exc: 0x68C9,
        // tau * (1 - exp(-1 / tau))
        init_exc: 0x7400,
        exp_tau_inh: 0x68C9,
        init_inh: 0x7400,
    }
}

/// One row per source, each padded to an even word count so it can be addressed by a
/// row-offset-length descriptor
fn build_matrix(
    sim: &SimulationConfig,
    format: &SynapticWordFormat,
) -> NetworkResult<(Vec<u32>, Vec<KeyLookupEntry>, usize)> {
    let mut rng = MarsKiss64::new(sim.seed);
    let mut matrix = Vec::new();
    let mut entries = Vec::with_capacity(sim.num_sources as usize);
    let mut connections = 0;

    for source in 0..sim.num_sources {
        let mut synapses: Vec<Synapse> = (0..sim.num_neurons)
            .filter(|_| uniform_below(&mut rng, 100) < sim.connection_percent)
            .map(|neuron| Synapse {
                index: neuron,
                delay: sim.delay,
                weight: sim.weight as i32,
            })
            .collect();
        // Every source reaches at least one neuron
        if synapses.is_empty() {
            synapses.push(Synapse {
                index: source % sim.num_neurons,
                delay: sim.delay,
                weight: sim.weight as i32,
            });
        }
        connections += synapses.len();

        let offset = matrix.len() as u32 / 2;
        matrix.extend(StaticRowProcessor::encode_row(format, &synapses, None));
        if matrix.len() % 2 == 1 {
            matrix.push(0);
        }
        entries.push(KeyLookupEntry {
            key: SOURCE_KEY | source,
            mask: u32::MAX,
            row: RowOffsetLength::new(offset, synapses.len() as u32),
        });
    }
    Ok((matrix, entries, connections))
}

fn system_words(sim: &SimulationConfig, app: Vec<u32>) -> Vec<u32> {
    let mut words = vec![sim.timer_period_us, sim.ticks];
    words.extend(app);
    words
}

fn source_image(sdram: &Sdram, sim: &SimulationConfig) -> NetworkResult<ImageLocation> {
    let config = SpikeSourceConfig {
        num_sources: sim.num_sources,
        spike_key: SOURCE_KEY,
        flush_key: SOURCE_KEY | FLUSH_BIT,
    };
    let parameters = PoissonParameters::from_rate(sim.rate_hz, sim.timer_period_us, 0, u32::MAX);
    let layout = PoissonSourceLayout::uniform(sim.seed, sim.num_sources as usize, parameters);
    Ok(ImageBuilder::<SpikeSourceRegion>::new()
        .region(SpikeSourceRegion::System, system_words(sim, config.to_app_words()))
        .region(SpikeSourceRegion::SpikeSource, layout.to_words())
        .write(sdram)?)
}

fn synapse_image(
    sdram: &Sdram,
    sim: &SimulationConfig,
    matrix: Vec<u32>,
    entries: Vec<KeyLookupEntry>,
    output: SlabPair,
) -> NetworkResult<ImageLocation> {
    let config = SynapseConfig {
        weight_fractional_bits: WEIGHT_FRACTIONAL_BITS,
        flush_mask: FLUSH_BIT,
        signed_weights: false,
    };
    Ok(ImageBuilder::<SynapseRegion>::new()
        .region(SynapseRegion::System, system_words(sim, config.to_app_words()))
        .region(SynapseRegion::KeyLookup, KeyLookup::new(entries).to_words())
        .region(SynapseRegion::SynapticMatrix, matrix)
        .region(SynapseRegion::OutputBuffer, output.to_words().to_vec())
        .write(sdram)?)
}

fn neuron_image(
    sdram: &Sdram,
    sim: &SimulationConfig,
    input: SlabPair,
) -> NetworkResult<ImageLocation> {
    let n = sim.num_neurons as usize;
    let config = NeuronConfig {
        num_neurons: sim.num_neurons,
        spike_key: NEURON_KEY,
        flush_key: NEURON_KEY | FLUSH_BIT,
    };

    let mut neuron_words = Vec::new();
    for _ in 0..n {
        IfState {
            v: s1615(-65),
            refractory_timer: 0,
        }
        .write_words(&mut neuron_words);
    }
    for _ in 0..n {
        neuron_params().write_words(&mut neuron_words);
    }

    let mut synapse_words = Vec::new();
    for _ in 0..n {
        ExpSynapseState { i_exc: 0, i_inh: 0 }.write_words(&mut synapse_words);
    }
    for _ in 0..n {
        synapse_params().write_words(&mut synapse_words);
    }

    let descriptors = [InputBufferDescriptor {
        slabs: input,
        start_neuron: 0,
        num_neurons: sim.num_neurons,
        receptor: 0,
        left_shift_to_s1615: 15 - WEIGHT_FRACTIONAL_BITS as i32,
    }];

    let mut recorded = BitField::new(n);
    for neuron in 0..n {
        recorded.set(neuron);
    }
    let stream_words = (sim.ticks as usize + 1) * recorded.words().len();

    Ok(ImageBuilder::<NeuronRegion>::new()
        .region(NeuronRegion::System, system_words(sim, config.to_app_words()))
        .region(NeuronRegion::Neuron, neuron_words)
        .region(NeuronRegion::Synapse, synapse_words)
        .region(NeuronRegion::InputBuffer, InputBuffers::to_words(&descriptors))
        .region(
            NeuronRegion::BackPropagationOutput,
            BackPropagationOutput::layout(None),
        )
        .region(
            NeuronRegion::SpikeRecording,
            SpikeRecorder::layout(&recorded, stream_words as u32),
        )
        .write(sdram)?)
}

impl DemoNetwork {
    /// Write the three images into the machine's SDRAM, load the cores and route the sources
    pub fn build(machine: &mut Machine, sim: &SimulationConfig) -> NetworkResult<Self> {
        if sim.num_neurons == 0 || sim.num_neurons > OUTPUT_SLAB_WORDS {
            return Err(NetworkError::Invalid(format!(
                "{} neurons do not fit one core",
                sim.num_neurons
            )));
        }
        if sim.num_sources == 0 || sim.num_sources > 0xFFFF {
            return Err(NetworkError::Invalid(format!(
                "{} sources do not fit the key space",
                sim.num_sources
            )));
        }

        let format = SynapticWordFormat::default();
        let (matrix, entries, connections) = build_matrix(sim, &format)?;
        debug!(rows = entries.len(), words = matrix.len(), connections, "Synaptic matrix built");

        let sdram = machine.sdram();
        let slabs = SlabPair::allocate(sdram, OUTPUT_SLAB_WORDS)?;
        let source = source_image(sdram, sim)?;
        let synapse = synapse_image(sdram, sim, matrix, entries, slabs)?;
        let neuron = neuron_image(sdram, sim, slabs)?;

        machine.load::<SpikeSource>(SOURCE_CORE, source)?;
        machine.load::<SynapseProcessor<StaticRowProcessor>>(SYNAPSE_CORE, synapse)?;
        machine.load::<IfCurrExpProcessor>(NEURON_CORE, neuron)?;
        machine.add_route(SOURCE_KEY, 0xFFFF_0000, [SYNAPSE_CORE]);

        info!(
            sources = sim.num_sources,
            neurons = sim.num_neurons,
            connections,
            rate_hz = sim.rate_hz,
            "Demo network loaded"
        );
        Ok(Self {
            num_sources: sim.num_sources,
            num_neurons: sim.num_neurons,
            connections,
            ticks: sim.ticks,
        })
    }

    pub fn num_sources(&self) -> u32 {
        self.num_sources
    }

    pub fn num_neurons(&self) -> u32 {
        self.num_neurons
    }

    /// Synapses in the matrix
    pub fn connections(&self) -> usize {
        self.connections
    }

    /// Ticks the cores were configured for
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Neurons that spiked in each of the first `ticks` ticks
    pub fn spike_raster(&self, machine: &Machine, ticks: usize) -> NetworkResult<Vec<Vec<usize>>> {
        let location = machine
            .core_image(NEURON_CORE)
            .ok_or(MachineError::UnknownCore(NEURON_CORE))?;
        let image = ConfigImage::<NeuronRegion>::parse(machine.sdram(), location)?;
        let words = image.require(NeuronRegion::SpikeRecording)?.to_vec()?;
        Ok(decode_spike_recording(&words, ticks))
    }

    pub fn summary(&self, machine: &Machine) -> NetworkSummary {
        let mut summary = NetworkSummary::default();
        if let Some(source) = machine.role::<SpikeSource>(SOURCE_CORE) {
            summary.source_spikes = source.statistics().get(SpikeSourceStatistic::Spikes);
        }
        if let Some(synapse) = machine.role::<SynapseProcessor<StaticRowProcessor>>(SYNAPSE_CORE) {
            let stats = synapse.statistics();
            summary.rows_requested = stats.get(SynapseStatistic::RowsRequested);
            summary.key_lookup_failures = stats.get(SynapseStatistic::KeyLookupFail);
        }
        if let Some(neuron) = machine.role::<IfCurrExpProcessor>(NEURON_CORE) {
            summary.neuron_spikes = neuron.statistics().get(NeuronStatistic::Spikes);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> SimulationConfig {
        SimulationConfig {
            num_sources: 8,
            num_neurons: 4,
            connection_percent: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_matrix_rows_are_even_and_addressable() {
        let format = SynapticWordFormat::default();
        let (matrix, entries, connections) = build_matrix(&sim(), &format).unwrap();
        assert_eq!(matrix.len() % 2, 0);
        assert_eq!(entries.len(), 8);

        let mut total = 0;
        for entry in &entries {
            let n = entry.row.num_synapses() as usize;
            let offset = entry.row.word_offset() as usize;
            assert_eq!(matrix[offset] as usize, n);
            total += n;
        }
        assert_eq!(total, connections);
    }

    #[test]
    fn test_matrix_depends_only_on_seed() {
        let format = SynapticWordFormat::default();
        let first = build_matrix(&sim(), &format).unwrap().0;
        let second = build_matrix(&sim(), &format).unwrap().0;
        assert_eq!(first, second);

        let mut other = sim();
        other.seed = [1, 2, 3, 4];
        assert_ne!(first, build_matrix(&other, &format).unwrap().0);
    }

    #[test]
    fn test_zero_percent_still_connects_each_source() {
        let mut config = sim();
        config.connection_percent = 0;
        let (_, entries, connections) =
            build_matrix(&config, &SynapticWordFormat::default()).unwrap();
        assert_eq!(connections, 8);
        assert!(entries.iter().all(|e| e.row.num_synapses() == 1));
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end pipeline tests
//!
//! Roles are loaded onto a host [`Machine`] from images built in its SDRAM and driven tick by
//! tick: spike source → synapse processor → neuron processor, with back propagation closing
//! the loop.

use neurocore_hal::Sdram;
use neurocore_npu_burst_engine::{
    IfCurrExpProcessor, Machine, MachineConfig, NeuronConfig, SpikeSource, SpikeSourceConfig,
    SpikeSourceStatistic, SynapseConfig, SynapseProcessor, SynapseStatistic,
};
use neurocore_npu_neural::models::{
    ConstantThresholdParams, ExpSynapseParams, ExpSynapseState, IfCurrParams, IfState,
};
use neurocore_npu_neural::{BitField, WordState, S1615, S1615_ONE};
use neurocore_npu_plasticity::{
    AdditiveWeight, NearestPairTiming, PlasticSynapse, RowProcessor, StaticRowProcessor,
    StdpRowProcessor, Synapse, SynapticWordFormat,
};
use neurocore_npu_runtime::{
    decode_spike_recording, ArraySource, BackPropagationInput, BackPropagationInputs,
    BackPropagationOutput, BackPropagationSlabs, ConfigImage, DelayBufferLayout, ImageBuilder,
    ImageLocation, InputBufferDescriptor, InputBuffers, KeyLookup, KeyLookupEntry, NeuronRegion,
    PoissonParameters, PoissonSourceLayout, RowOffsetLength, SlabPair, SpikeRecorder,
    SpikeSourceRegion, SynapseRegion,
};

type NearestAdditive = StdpRowProcessor<NearestPairTiming, AdditiveWeight>;
type PlasticSynapseProcessor = SynapseProcessor<NearestAdditive>;

const TIMESTEP_US: u32 = 1000;
const RUN_TICKS: u32 = 1000;
/// Output slab length of a synapse processor with the default synaptic word
const SLAB_WORDS: u32 = 1024;
/// 2048.0 in S1615: enough to drive a resting neuron over threshold in one tick
const DRIVE: u32 = 0x0400_0000;

fn s1615(value: i32) -> S1615 {
    value * S1615_ONE
}

fn machine() -> Machine {
    Machine::new(MachineConfig {
        sdram_bytes: 1 << 20,
        ..Default::default()
    })
}

fn system_words(ticks: u32, app: Vec<u32>) -> Vec<u32> {
    let mut words = vec![TIMESTEP_US, ticks];
    words.extend(app);
    words
}

fn read_slab(sdram: &Sdram, address: u32) -> Vec<u32> {
    let mut words = vec![0; SLAB_WORDS as usize];
    sdram.read_words(address, &mut words).unwrap();
    words
}

fn synapse_config() -> SynapseConfig {
    SynapseConfig {
        weight_fractional_bits: 0,
        flush_mask: 0x8000_0000,
        signed_weights: false,
    }
}

/// Static synapse image with one key lookup entry covering `key`
fn static_synapse_image(
    sdram: &Sdram,
    key: u32,
    matrix: Vec<u32>,
    first_row: RowOffsetLength,
    delay_buffer: Option<DelayBufferLayout>,
) -> (ImageLocation, SlabPair) {
    let output = SlabPair::allocate(sdram, SLAB_WORDS).unwrap();
    let lookup = KeyLookup::new(vec![KeyLookupEntry {
        key,
        mask: 0xFFFF_0000,
        row: first_row,
    }]);
    let mut builder = ImageBuilder::<SynapseRegion>::new()
        .region(
            SynapseRegion::System,
            system_words(RUN_TICKS, synapse_config().to_app_words()),
        )
        .region(SynapseRegion::KeyLookup, lookup.to_words())
        .region(SynapseRegion::SynapticMatrix, matrix)
        .region(SynapseRegion::OutputBuffer, output.to_words().to_vec());
    if let Some(layout) = delay_buffer {
        builder.set_region(SynapseRegion::DelayBuffer, layout.to_words());
    }
    (builder.write(sdram).unwrap(), output)
}

fn if_curr_params(t_refractory: i32) -> IfCurrParams<ConstantThresholdParams> {
    IfCurrParams {
        v_reset: s1615(-70),
        v_rest: s1615(-65),
        exp_tc: 0x7F9B,
        r_membrane: s1615(5),
        i_offset: 0,
        t_refractory,
        threshold: ConstantThresholdParams {
            v_threshold: s1615(-50),
        },
    }
}

/// Current-based neuron image fed by one input slab pair the test writes directly
fn neuron_image(
    sdram: &Sdram,
    num_neurons: usize,
    t_refractory: i32,
    back_propagation: Option<&BackPropagationSlabs>,
) -> (ImageLocation, SlabPair) {
    let config = NeuronConfig {
        num_neurons: num_neurons as u32,
        spike_key: 0x0005_0000,
        flush_key: 0x8005_0000,
    };

    let mut neuron_words = Vec::new();
    for _ in 0..num_neurons {
        IfState {
            v: s1615(-65),
            refractory_timer: 0,
        }
        .write_words(&mut neuron_words);
    }
    for _ in 0..num_neurons {
        if_curr_params(t_refractory).write_words(&mut neuron_words);
    }

    // Input lasts exactly one tick
    let mut synapse_words = Vec::new();
    for _ in 0..num_neurons {
        ExpSynapseState { i_exc: 0, i_inh: 0 }.write_words(&mut synapse_words);
    }
    for _ in 0..num_neurons {
        ExpSynapseParams {
            exp_tau_exc: 0,
            init_exc: S1615_ONE,
            exp_tau_inh: 0,
            init_inh: S1615_ONE,
        }
        .write_words(&mut synapse_words);
    }

    let input = SlabPair::allocate(sdram, num_neurons as u32).unwrap();
    let descriptors = [InputBufferDescriptor {
        slabs: input,
        start_neuron: 0,
        num_neurons: num_neurons as u32,
        receptor: 0,
        left_shift_to_s1615: 0,
    }];

    let mut recorded = BitField::new(num_neurons);
    for n in 0..num_neurons {
        recorded.set(n);
    }

    let location = ImageBuilder::<NeuronRegion>::new()
        .region(
            NeuronRegion::System,
            system_words(RUN_TICKS, config.to_app_words()),
        )
        .region(NeuronRegion::Neuron, neuron_words)
        .region(NeuronRegion::Synapse, synapse_words)
        .region(NeuronRegion::InputBuffer, InputBuffers::to_words(&descriptors))
        .region(
            NeuronRegion::BackPropagationOutput,
            BackPropagationOutput::layout(back_propagation),
        )
        .region(NeuronRegion::SpikeRecording, SpikeRecorder::layout(&recorded, 256))
        .write(sdram)
        .unwrap();
    (location, input)
}

/// Write `value` for `neuron` into the slab the neuron processor reads during `tick`
fn drive_neuron(sdram: &Sdram, input: SlabPair, tick: u32, neuron: u32, value: u32) {
    sdram
        .write_word(input.read_slab(tick) + 4 * neuron, value)
        .unwrap();
}

fn recorded_spikes(machine: &Machine, core: u32, ticks: usize) -> Vec<Vec<usize>> {
    let location = machine.core_image(core).unwrap();
    let image = ConfigImage::<NeuronRegion>::parse(machine.sdram(), location).unwrap();
    let words = image
        .region(NeuronRegion::SpikeRecording)
        .unwrap()
        .to_vec()
        .unwrap();
    decode_spike_recording(&words, ticks)
}

#[test]
fn test_spike_reaches_output_slab_after_delay() {
    let mut machine = machine();
    let format = SynapticWordFormat::default();

    let source = SpikeSourceConfig {
        num_sources: 1,
        spike_key: 0x0001_0000,
        flush_key: 0x8001_0000,
    };
    let mut raster = vec![Vec::new(); 6];
    raster[5] = vec![0];
    let source_image = ImageBuilder::<SpikeSourceRegion>::new()
        .region(
            SpikeSourceRegion::System,
            system_words(RUN_TICKS, source.to_app_words()),
        )
        .region(SpikeSourceRegion::ArraySource, ArraySource::encode(1, &raster))
        .write(machine.sdram())
        .unwrap();

    let row = StaticRowProcessor::encode_row(
        &format,
        &[Synapse {
            index: 3,
            delay: 2,
            weight: 0x400,
        }],
        None,
    );
    let (synapse_image, output) = static_synapse_image(
        machine.sdram(),
        0x0001_0000,
        row,
        RowOffsetLength::new(0, 1),
        None,
    );

    machine.load::<SpikeSource>(0, source_image).unwrap();
    machine
        .load::<SynapseProcessor<StaticRowProcessor>>(1, synapse_image)
        .unwrap();
    machine.add_route(0x0001_0000, 0xFFFF_0000, [1]);

    let report = machine.run(8);
    assert_eq!(report.ticks, 8);
    assert_eq!(report.packets_dropped, 0);

    let slab = read_slab(machine.sdram(), output.write_slab(7));
    assert_eq!(slab[3], 0x400);
    assert_eq!(slab.iter().filter(|&&w| w != 0).count(), 1);

    let synapse = machine
        .role::<SynapseProcessor<StaticRowProcessor>>(1)
        .unwrap();
    assert_eq!(synapse.statistics().get(SynapseStatistic::RowsRequested), 1);
    assert_eq!(synapse.statistics().get(SynapseStatistic::KeyLookupFail), 0);
    assert_eq!(
        machine
            .role::<SpikeSource>(0)
            .unwrap()
            .statistics()
            .get(SpikeSourceStatistic::Spikes),
        1
    );
}

#[test]
fn test_refractory_neuron_ignores_drive() {
    let mut machine = machine();
    let (image, input) = neuron_image(machine.sdram(), 1, 3, None);
    machine.load::<IfCurrExpProcessor>(0, image).unwrap();

    for tick in 0..6 {
        drive_neuron(machine.sdram(), input, tick, 0, DRIVE);
        machine.step();
    }

    let spikes = recorded_spikes(&machine, 0, 6);
    let spiking_ticks: Vec<usize> = spikes
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_empty())
        .map(|(t, _)| t)
        .collect();
    // Ticks 1 to 3 are refractory despite the same drive
    assert_eq!(spiking_ticks, vec![0, 4]);

    let neuron = machine.role::<IfCurrExpProcessor>(0).unwrap();
    assert_eq!(neuron.neuron_state(0).unwrap().refractory_timer, 2);
}

#[test]
fn test_undriven_neuron_stays_at_rest() {
    let mut machine = machine();
    let (image, _) = neuron_image(machine.sdram(), 4, 3, None);
    machine.load::<IfCurrExpProcessor>(0, image).unwrap();
    machine.run(20);

    assert!(recorded_spikes(&machine, 0, 20).iter().all(Vec::is_empty));
    let neuron = machine.role::<IfCurrExpProcessor>(0).unwrap();
    assert_eq!(neuron.neuron_state(3).unwrap().v, s1615(-65));
}

/// Total spikes and the recorded raster of one fast Poisson source over 100 ticks
fn poisson_spike_train(seed: [u32; 4]) -> (u32, Vec<Vec<usize>>) {
    let mut machine = machine();
    let config = SpikeSourceConfig {
        num_sources: 1,
        spike_key: 0x0007_0000,
        flush_key: 0x8007_0000,
    };
    // exp(-lambda) = 0.9
    let layout = PoissonSourceLayout::uniform(seed, 1, PoissonParameters::fast(0, 100, 3_865_470_566));
    let mut recorded = BitField::new(1);
    recorded.set(0);
    let image = ImageBuilder::<SpikeSourceRegion>::new()
        .region(SpikeSourceRegion::System, system_words(100, config.to_app_words()))
        .region(SpikeSourceRegion::SpikeSource, layout.to_words())
        .region(SpikeSourceRegion::SpikeRecording, SpikeRecorder::layout(&recorded, 100))
        .write(machine.sdram())
        .unwrap();
    machine.load::<SpikeSource>(0, image).unwrap();

    let report = machine.run(200);
    assert!(report.all_succeeded());
    assert_eq!(report.ticks, 101);
    let total = machine
        .role::<SpikeSource>(0)
        .unwrap()
        .statistics()
        .get(SpikeSourceStatistic::Spikes);

    let location = machine.core_image(0).unwrap();
    let parsed = ConfigImage::<SpikeSourceRegion>::parse(machine.sdram(), location).unwrap();
    let words = parsed
        .region(SpikeSourceRegion::SpikeRecording)
        .unwrap()
        .to_vec()
        .unwrap();
    (total, decode_spike_recording(&words, 100))
}

#[test]
fn test_poisson_source_matches_reference_stream() {
    let (total, raster) = poisson_spike_train([123, 456, 789, 1011]);
    // One spike on each of these ticks and none elsewhere
    let expected = [24, 30, 57, 64, 77, 81, 82, 95, 97, 99];
    assert_eq!(total, 10);
    let spiking: Vec<usize> = (0..100).filter(|&t| raster[t] == [0]).collect();
    assert_eq!(spiking, expected);
    assert!(raster.iter().all(|t| t.is_empty() || t == &[0]));

    assert_eq!(poisson_spike_train([123, 456, 789, 1011]), (total, raster));
}

#[test]
fn test_back_propagation_reaches_plastic_synapses() {
    let mut machine = machine();
    let slabs = BackPropagationSlabs::allocate(machine.sdram(), 32).unwrap();

    let timing = NearestPairTiming::new(s1615(20), s1615(20));
    let weight = AdditiveWeight::new(0, 0x4_0000, 0x0100_0000, 0x0100_0000);
    let output = SlabPair::allocate(machine.sdram(), SLAB_WORDS).unwrap();
    let synapse_image = ImageBuilder::<SynapseRegion>::new()
        .region(
            SynapseRegion::System,
            system_words(RUN_TICKS, synapse_config().to_app_words()),
        )
        .region(SynapseRegion::KeyLookup, KeyLookup::new(Vec::new()).to_words())
        .region(SynapseRegion::SynapticMatrix, vec![0; 8])
        .region(
            SynapseRegion::Plasticity,
            NearestAdditive::region_words(&timing, &weight, 32),
        )
        .region(SynapseRegion::OutputBuffer, output.to_words().to_vec())
        .region(
            SynapseRegion::BackPropagationInput,
            BackPropagationInputs::to_words(&[BackPropagationInput {
                slabs,
                start_neuron: 0,
            }]),
        )
        .write(machine.sdram())
        .unwrap();
    let (neuron_image, input) = neuron_image(machine.sdram(), 32, 0, Some(&slabs));

    machine.load::<PlasticSynapseProcessor>(0, synapse_image).unwrap();
    machine.load::<IfCurrExpProcessor>(1, neuron_image).unwrap();

    machine.run(40);
    drive_neuron(machine.sdram(), input, 40, 17, DRIVE);
    machine.step();
    drive_neuron(machine.sdram(), input, 40, 17, 0);

    let spikes = recorded_spikes(&machine, 1, 41);
    assert_eq!(spikes[40], vec![17]);
    assert!(spikes[..40].iter().all(Vec::is_empty));

    // Tick 41 fetches the bit-vector written during tick 40
    machine.step();
    let synapse = machine.role::<PlasticSynapseProcessor>(0).unwrap();
    let history = synapse.row_processor().history(17).unwrap();
    assert_eq!(history.times(), &[40]);
    assert!(synapse.row_processor().history(16).unwrap().is_empty());
}

#[test]
fn test_plastic_row_written_back_after_pre_spike() {
    let mut machine = machine();
    let format = SynapticWordFormat::default();
    let timing = NearestPairTiming::new(s1615(20), s1615(20));
    let weight = AdditiveWeight::new(0, 0x4_0000, 0x0100_0000, 0x0100_0000);

    let row = NearestAdditive::encode_row(
        &format,
        &[PlasticSynapse {
            index: 4,
            delay: 1,
            weight: 0x2000,
        }],
        None,
    );
    let row_words = row.len();
    let output = SlabPair::allocate(machine.sdram(), SLAB_WORDS).unwrap();
    let image = ImageBuilder::<SynapseRegion>::new()
        .region(
            SynapseRegion::System,
            system_words(RUN_TICKS, synapse_config().to_app_words()),
        )
        .region(
            SynapseRegion::KeyLookup,
            KeyLookup::new(vec![KeyLookupEntry {
                key: 0x0003_0000,
                mask: 0xFFFF_0000,
                row: RowOffsetLength::new(0, 1),
            }])
            .to_words(),
        )
        .region(SynapseRegion::SynapticMatrix, row)
        .region(
            SynapseRegion::Plasticity,
            NearestAdditive::region_words(&timing, &weight, 8),
        )
        .region(SynapseRegion::OutputBuffer, output.to_words().to_vec())
        .write(machine.sdram())
        .unwrap();
    machine.load::<PlasticSynapseProcessor>(0, image).unwrap();
    machine.add_route(0x0003_0000, 0xFFFF_0000, [0]);

    machine.run(3);
    machine.inject_multicast(0x0003_0000, None);
    machine.step();

    let matrix_base = ConfigImage::<SynapseRegion>::parse(machine.sdram(), image)
        .unwrap()
        .require(SynapseRegion::SynapticMatrix)
        .unwrap()
        .base();
    let synapse = machine.role::<PlasticSynapseProcessor>(0).unwrap();
    assert_eq!(synapse.row_processor().row_words(1) as usize, row_words);

    let mut stored = vec![0; row_words];
    machine.sdram().read_words(matrix_base, &mut stored).unwrap();
    assert_eq!(NearestAdditive::last_pre_tick(&stored), 3);
    assert_eq!(NearestAdditive::last_update_tick(&stored), 3);
    assert_eq!(synapse.ring().output_slice(4)[4], 0x2000);
    assert_eq!(synapse.statistics().get(SynapseStatistic::RowsRequested), 1);
}

#[test]
fn test_repeated_key_reads_written_back_row() {
    let mut machine = machine();
    let format = SynapticWordFormat::default();
    let timing = NearestPairTiming::new(s1615(20), s1615(20));
    let weight = AdditiveWeight::new(0, 0x4_0000, 0x0100_0000, 0x0100_0000);
    let row = NearestAdditive::encode_row(
        &format,
        &[PlasticSynapse {
            index: 2,
            delay: 1,
            weight: 0x1800,
        }],
        None,
    );
    let output = SlabPair::allocate(machine.sdram(), SLAB_WORDS).unwrap();
    let image = ImageBuilder::<SynapseRegion>::new()
        .region(
            SynapseRegion::System,
            system_words(RUN_TICKS, synapse_config().to_app_words()),
        )
        .region(
            SynapseRegion::KeyLookup,
            KeyLookup::new(vec![KeyLookupEntry {
                key: 0x0005_0000,
                mask: 0xFFFF_0000,
                row: RowOffsetLength::new(0, 1),
            }])
            .to_words(),
        )
        .region(SynapseRegion::SynapticMatrix, row)
        .region(
            SynapseRegion::Plasticity,
            NearestAdditive::region_words(&timing, &weight, 8),
        )
        .region(SynapseRegion::OutputBuffer, output.to_words().to_vec())
        .write(machine.sdram())
        .unwrap();
    machine.load::<PlasticSynapseProcessor>(0, image).unwrap();
    machine.add_route(0x0005_0000, 0xFFFF_0000, [0]);

    // One row in flight at a time: the second fetch follows the first write-back
    machine.run(6);
    machine.inject_multicast(0x0005_0000, None);
    machine.inject_multicast(0x0005_0000, None);
    machine.step();

    let synapse = machine.role::<PlasticSynapseProcessor>(0).unwrap();
    assert_eq!(synapse.statistics().get(SynapseStatistic::RowsRequested), 2);
    assert_eq!(synapse.ring().output_slice(7)[2], 2 * 0x1800);

    let matrix_base = ConfigImage::<SynapseRegion>::parse(machine.sdram(), image)
        .unwrap()
        .require(SynapseRegion::SynapticMatrix)
        .unwrap()
        .base();
    let mut stored = vec![0; synapse.row_processor().row_words(1) as usize];
    machine.sdram().read_words(matrix_base, &mut stored).unwrap();
    assert_eq!(NearestAdditive::last_pre_tick(&stored), 6);
    assert_eq!(NearestAdditive::last_update_tick(&stored), 6);
}

#[test]
fn test_delay_extension_row_processed_when_due() {
    let mut machine = machine();
    let format = SynapticWordFormat::default();

    // Row at word 4 is chained from the row at word 0, three ticks later
    let mut matrix = StaticRowProcessor::encode_row(
        &format,
        &[Synapse {
            index: 1,
            delay: 1,
            weight: 5,
        }],
        Some((3, RowOffsetLength::new(2, 1))),
    );
    matrix.extend(StaticRowProcessor::encode_row(
        &format,
        &[Synapse {
            index: 2,
            delay: 1,
            weight: 7,
        }],
        None,
    ));
    let delay = DelayBufferLayout::allocate(machine.sdram(), 8, 4).unwrap();
    let (image, output) = static_synapse_image(
        machine.sdram(),
        0x0002_0000,
        matrix,
        RowOffsetLength::new(0, 1),
        Some(delay),
    );
    machine
        .load::<SynapseProcessor<StaticRowProcessor>>(0, image)
        .unwrap();
    machine.add_route(0x0002_0000, 0xFFFF_0000, [0]);

    machine.run(5);
    machine.inject_multicast(0x0002_0000, None);
    machine.run(2);
    assert_eq!(read_slab(machine.sdram(), output.write_slab(6))[1], 5);

    machine.run(3);
    assert_eq!(machine.ticks(), 10);
    let slab = read_slab(machine.sdram(), output.write_slab(9));
    assert_eq!(slab[2], 7);
    assert_eq!(slab[1], 0);

    let synapse = machine
        .role::<SynapseProcessor<StaticRowProcessor>>(0)
        .unwrap();
    assert_eq!(synapse.statistics().get(SynapseStatistic::RowsRequested), 1);
    assert_eq!(synapse.statistics().get(SynapseStatistic::DelayRowsRequested), 1);
    assert_eq!(
        synapse
            .statistics()
            .get(SynapseStatistic::DelayBuffersNotProcessed),
        0
    );
}

#[test]
fn test_unknown_key_counted_not_fetched() {
    let mut machine = machine();
    let format = SynapticWordFormat::default();
    let row = StaticRowProcessor::encode_row(
        &format,
        &[Synapse {
            index: 0,
            delay: 1,
            weight: 1,
        }],
        None,
    );
    let (image, _) =
        static_synapse_image(machine.sdram(), 0x0001_0000, row, RowOffsetLength::new(0, 1), None);
    machine
        .load::<SynapseProcessor<StaticRowProcessor>>(0, image)
        .unwrap();
    machine.add_route(0, 0, [0]);

    machine.step();
    machine.inject_multicast(0x0009_0001, None);
    machine.step();

    let synapse = machine
        .role::<SynapseProcessor<StaticRowProcessor>>(0)
        .unwrap();
    assert_eq!(synapse.statistics().get(SynapseStatistic::KeyLookupFail), 1);
    assert_eq!(synapse.statistics().get(SynapseStatistic::RowsRequested), 0);
    assert_eq!(synapse.pending_spikes(), 0);
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Images written by the host and read back the way a booting role reads them

use neurocore_hal::{Dtcm, Sdram};
use neurocore_npu_neural::BitField;
use neurocore_npu_runtime::{
    decode_spike_recording, ConfigImage, ImageBuilder, KeyLookup, KeyLookupEntry, NeuronRegion,
    RowOffsetLength, RuntimeError, SpikeRecorder, SynapseRegion, SystemRegion, IMAGE_MAGIC,
};

fn lookup() -> KeyLookup {
    KeyLookup::new(vec![
        KeyLookupEntry {
            key: 0x0004_0000,
            mask: 0xFFFF_FF00,
            row: RowOffsetLength::new(8, 2),
        },
        KeyLookupEntry {
            key: 0x0001_0000,
            mask: 0xFFFF_FFF0,
            row: RowOffsetLength::new(0, 1),
        },
    ])
}

#[test]
fn test_key_resolves_to_row_inside_matrix() {
    let sdram = Sdram::new(64 * 1024);
    let matrix: Vec<u32> = (0..64).collect();
    let location = ImageBuilder::<SynapseRegion>::new()
        .region(SynapseRegion::System, vec![1000, 10, 0, 0, 0])
        .region(SynapseRegion::KeyLookup, lookup().to_words())
        .region(SynapseRegion::SynapticMatrix, matrix)
        .write(&sdram)
        .unwrap();

    let image = ConfigImage::<SynapseRegion>::parse(&sdram, location).unwrap();
    assert_eq!(image.present(), 3);
    let system = SystemRegion::parse(image.require(SynapseRegion::System).unwrap(), 3).unwrap();
    assert_eq!(system.timer_period_us, 1000);
    assert_eq!(system.simulation_ticks, 10);

    let mut dtcm = Dtcm::default();
    let table = KeyLookup::read(image.require(SynapseRegion::KeyLookup).unwrap(), &mut dtcm)
        .unwrap();
    assert_eq!(table.len(), 2);

    let matrix_region = image.require(SynapseRegion::SynapticMatrix).unwrap();
    // Neuron 3 of the second population, rows of 3 + 2 words from word 16
    let row = table
        .lookup_row(0x0004_0003, matrix_region.base(), |n| 3 + n)
        .unwrap();
    assert_eq!(row.words, 5);
    assert_eq!(row.address, matrix_region.base() + 4 * (3 * 5 + 16));

    let mut first = [0u32; 1];
    sdram.read_words(row.address, &mut first).unwrap();
    assert_eq!(first[0], 31);

    assert!(table.lookup_row(0x0009_0000, matrix_region.base(), |n| 3 + n).is_none());
}

#[test]
fn test_corrupt_magic_rejected() {
    let sdram = Sdram::new(4096);
    let location = ImageBuilder::<NeuronRegion>::new()
        .region(NeuronRegion::System, vec![1000, 1, 0, 0, 0])
        .write(&sdram)
        .unwrap();
    sdram.write_word(location.base, IMAGE_MAGIC ^ 1).unwrap();

    assert!(matches!(
        ConfigImage::<NeuronRegion>::parse(&sdram, location),
        Err(RuntimeError::ConfigHeaderInvalid { .. })
    ));
}

#[test]
fn test_spike_recording_survives_sdram() {
    let sdram = Sdram::new(4096);
    let mut recorded = BitField::new(40);
    for n in [1, 5, 39] {
        recorded.set(n);
    }
    let location = ImageBuilder::<NeuronRegion>::new()
        .region(NeuronRegion::SpikeRecording, SpikeRecorder::layout(&recorded, 4))
        .write(&sdram)
        .unwrap();
    let image = ConfigImage::<NeuronRegion>::parse(&sdram, location).unwrap();
    let region = image.require(NeuronRegion::SpikeRecording).unwrap();

    let mut recorder = SpikeRecorder::read(Some(region), &mut Dtcm::default()).unwrap();
    assert!(recorder.is_enabled());
    let spikes_per_tick: [&[usize]; 3] = [&[5], &[], &[1, 39]];
    for spikes in spikes_per_tick {
        for n in 0..40 {
            recorder.record(n, spikes.contains(&n));
        }
        recorder.end_tick();
    }
    assert_eq!(recorder.words_written(), 3);

    let words = region.to_vec().unwrap();
    assert_eq!(
        decode_spike_recording(&words, 3),
        vec![vec![5], vec![], vec![1, 39]]
    );
}

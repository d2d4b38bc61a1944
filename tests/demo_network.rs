// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the demo network, from configuration file to spike raster

use neurocore::config::{load_config, NeurocoreConfig, SimulationConfig};
use neurocore::prelude::*;
use proptest::prelude::*;
use std::io::Write;

fn simulation(ticks: u32) -> SimulationConfig {
    SimulationConfig {
        ticks,
        ..Default::default()
    }
}

fn run(sim: &SimulationConfig) -> (MachineReport, NetworkSummary, Vec<Vec<usize>>) {
    let mut machine = Machine::new(neurocore::machine_config(
        &NeurocoreConfig::default().machine,
    ));
    let network = DemoNetwork::build(&mut machine, sim).unwrap();
    let report = machine.run(sim.ticks + 1);
    let raster = network.spike_raster(&machine, sim.ticks as usize).unwrap();
    (report, network.summary(&machine), raster)
}

#[test]
fn test_network_runs_to_completion_and_fires() {
    let sim = simulation(200);
    let (report, summary, raster) = run(&sim);

    assert!(report.all_succeeded(), "{:?}", report.exit_codes);
    assert_eq!(report.ticks, 201);
    assert!(summary.source_spikes > 0);
    assert_eq!(summary.key_lookup_failures, 0);
    assert!(summary.rows_requested > 0);
    assert!(summary.neuron_spikes > 0);

    let recorded: usize = raster.iter().map(Vec::len).sum();
    assert_eq!(recorded as u32, summary.neuron_spikes);
    assert!(raster.iter().flatten().all(|&n| n < sim.num_neurons as usize));
}

#[test]
fn test_same_seed_same_raster() {
    let sim = simulation(100);
    let (_, first_summary, first) = run(&sim);
    let (_, second_summary, second) = run(&sim);
    assert_eq!(first, second);
    assert_eq!(first_summary, second_summary);
}

#[test]
fn test_silent_sources_leave_neurons_at_rest() {
    let sim = SimulationConfig {
        rate_hz: 0,
        ..simulation(100)
    };
    let (report, summary, raster) = run(&sim);
    assert!(report.all_succeeded());
    assert_eq!(summary.source_spikes, 0);
    assert_eq!(summary.rows_requested, 0);
    assert!(raster.iter().all(Vec::is_empty));
}

#[test]
fn test_config_file_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("neurocore.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[machine]").unwrap();
    writeln!(file, "sdram_bytes = 1048576").unwrap();
    writeln!(file, "[simulation]").unwrap();
    writeln!(file, "ticks = 50").unwrap();
    writeln!(file, "num_sources = 4").unwrap();
    writeln!(file, "num_neurons = 8").unwrap();
    drop(file);

    let config = load_config(Some(&path), None).unwrap();
    let mut machine = Machine::new(neurocore::machine_config(&config.machine));
    let network = DemoNetwork::build(&mut machine, &config.simulation).unwrap();
    assert_eq!(network.num_sources(), 4);
    assert!(network.connections() >= 4);

    let report = machine.run(config.simulation.ticks + 1);
    assert!(report.all_succeeded());
    assert_eq!(report.ticks, 51);
}

#[test]
fn test_oversized_population_rejected() {
    let sim = SimulationConfig {
        num_neurons: 4096,
        ..simulation(10)
    };
    let mut machine = Machine::new(neurocore::machine_config(
        &NeurocoreConfig::default().machine,
    ));
    assert!(matches!(
        DemoNetwork::build(&mut machine, &sim),
        Err(NetworkError::Invalid(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_any_seed_connects_every_source(
        seed in prop::array::uniform4(1u32..u32::MAX),
        percent in 0u32..=100,
    ) {
        let sim = SimulationConfig {
            seed,
            connection_percent: percent,
            num_sources: 6,
            num_neurons: 5,
            ..simulation(20)
        };
        let mut machine = Machine::new(neurocore::machine_config(
            &NeurocoreConfig::default().machine,
        ));
        let network = DemoNetwork::build(&mut machine, &sim).unwrap();
        prop_assert!(network.connections() >= 6);
        prop_assert!(network.connections() <= 30);

        let report = machine.run(sim.ticks + 1);
        prop_assert!(report.all_succeeded());
        prop_assert_eq!(network.summary(&machine).key_lookup_failures, 0);
    }
}

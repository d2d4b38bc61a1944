// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
neurocore Demo

Runs a Poisson source → synapse processor → neuron processor network on the host kernel and
prints what happened.

Usage:
  cargo run --bin neurocore-demo -- [--ticks N] [--seed a,b,c,d] [--rate-hz R] [--config FILE]
  cargo run --bin neurocore-demo -- --debug-neurocore-npu-burst-engine
*/

use anyhow::{bail, Context, Result};
use clap::Parser;
use neurocore::config::load_config_or_default;
use neurocore::observability::{debug_flags_help, init_logging, parse_debug_flags};
use neurocore::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Ticks per progress report
const CHUNK_TICKS: u32 = 250;

#[derive(Debug, Parser)]
#[command(name = "neurocore-demo", version, about = "Run the neurocore demo network")]
#[command(after_help = debug_flags_help())]
struct Args {
    /// Configuration file; searched for when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ticks to simulate
    #[arg(short, long)]
    ticks: Option<u32>,

    /// Generator seed as four comma separated words
    #[arg(long)]
    seed: Option<String>,

    /// Poisson rate of every source
    #[arg(long)]
    rate_hz: Option<u32>,

    #[arg(long)]
    num_sources: Option<u32>,

    #[arg(long)]
    num_neurons: Option<u32>,

    /// Pace ticks to wall-clock time
    #[arg(long)]
    real_time: bool,

    /// JSON log lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn overrides(&self) -> HashMap<String, String> {
        let mut cli = HashMap::new();
        let numbers = [
            ("ticks", self.ticks),
            ("rate_hz", self.rate_hz),
            ("num_sources", self.num_sources),
            ("num_neurons", self.num_neurons),
        ];
        for (key, value) in numbers {
            if let Some(v) = value {
                cli.insert(key.to_string(), v.to_string());
            }
        }
        if let Some(seed) = &self.seed {
            cli.insert("seed".to_string(), seed.clone());
        }
        if self.real_time {
            cli.insert("real_time".to_string(), "true".to_string());
        }
        if self.json_logs {
            cli.insert("log_format".to_string(), "json".to_string());
        }
        cli
    }
}

fn main() -> Result<()> {
    // --debug-* flags are read by parse_debug_flags
    let args = Args::parse_from(std::env::args().filter(|a| !a.starts_with("--debug-")));
    let config = load_config_or_default(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;

    let mut debug_flags = parse_debug_flags();
    for crate_name in &config.logging.debug_crates {
        debug_flags.enable(crate_name);
    }
    let options = neurocore::logging_options(&config.logging)?;
    let _guard = init_logging(&debug_flags, &options)?;

    info!(version = neurocore::VERSION, "neurocore demo");
    let sim = &config.simulation;

    let mut machine = Machine::new(neurocore::machine_config(&config.machine));
    let network = DemoNetwork::build(&mut machine, sim).context("Failed to build network")?;

    // Cores exit on the tick after their last one
    let handle = MachineHandle::spawn(machine)?;
    let mut remaining = sim.ticks + 1;
    let mut report = None;
    while remaining > 0 {
        let chunk = remaining.min(CHUNK_TICKS);
        let r = handle.run_blocking(chunk)?;
        info!(tick = r.ticks, packets = r.packets_sent, "Progress");
        remaining -= chunk;
        let done = r.all_exited();
        report = Some(r);
        if done {
            break;
        }
    }
    let machine = handle.shutdown()?;
    let Some(report) = report else {
        bail!("No ticks were run");
    };

    if !report.all_succeeded() {
        bail!("Cores failed: {:?}", report.exit_codes);
    }

    let summary = network.summary(&machine);
    let raster = network.spike_raster(&machine, sim.ticks as usize)?;
    let active = raster.iter().filter(|t| !t.is_empty()).count();
    let mean_rate = summary.neuron_spikes as f64 * 1_000_000.0
        / (sim.ticks.max(1) as f64 * sim.timer_period_us as f64 * network.num_neurons() as f64);

    info!(
        ticks = report.ticks,
        connections = network.connections(),
        source_spikes = summary.source_spikes,
        rows = summary.rows_requested,
        lookup_failures = summary.key_lookup_failures,
        neuron_spikes = summary.neuron_spikes,
        ticks_with_spikes = active,
        mean_rate_hz = mean_rate,
        dropped = report.packets_dropped,
        "Run finished"
    );
    Ok(())
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Machine Thread
//!
//! Runs a [`Machine`] on a dedicated thread. Commands arrive over a crossbeam channel and each
//! `Run` answers with a [`MachineReport`]; an atomic flag cuts a long run short.

use crate::error::MachineError;
use crate::machine::{Machine, MachineReport};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineCommand {
    /// Advance up to this many ticks, then report
    Run(u32),
    /// Leave the thread loop and hand the machine back
    Stop,
}

pub struct MachineHandle {
    commands: Sender<MachineCommand>,
    reports: Receiver<MachineReport>,
    /// Set to abandon the run in progress at the next tick boundary
    interrupt: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<Machine>>,
}

impl MachineHandle {
    /// Move `machine` onto its own thread
    pub fn spawn(mut machine: Machine) -> Result<Self, MachineError> {
        let (command_tx, command_rx) = channel::unbounded::<MachineCommand>();
        let (report_tx, report_rx) = channel::unbounded::<MachineReport>();
        let interrupt = Arc::new(AtomicBool::new(false));
        let interrupt_flag = interrupt.clone();

        let thread_handle = thread::Builder::new()
            .name("neurocore-machine".to_string())
            .spawn(move || {
                info!("Machine thread started");
                while let Ok(command) = command_rx.recv() {
                    match command {
                        MachineCommand::Run(ticks) => {
                            interrupt_flag.store(false, Ordering::Release);
                            for _ in 0..ticks {
                                if interrupt_flag.load(Ordering::Acquire) {
                                    debug!(tick = machine.ticks(), "Run interrupted");
                                    break;
                                }
                                if machine.running_cores() == 0 {
                                    break;
                                }
                                machine.step();
                            }
                            if report_tx.send(machine.report()).is_err() {
                                warn!("Report receiver dropped");
                                break;
                            }
                        }
                        MachineCommand::Stop => break,
                    }
                }
                info!(ticks = machine.ticks(), "Machine thread stopped");
                machine
            })
            .map_err(|e| MachineError::Spawn(e.to_string()))?;

        Ok(Self {
            commands: command_tx,
            reports: report_rx,
            interrupt,
            thread_handle: Some(thread_handle),
        })
    }

    /// Start a run without waiting for it
    pub fn run(&self, ticks: u32) -> Result<(), MachineError> {
        self.commands
            .send(MachineCommand::Run(ticks))
            .map_err(|_| MachineError::Disconnected)
    }

    /// Wait for the report of the oldest outstanding run
    pub fn wait_report(&self) -> Result<MachineReport, MachineError> {
        self.reports.recv().map_err(|_| MachineError::Disconnected)
    }

    pub fn wait_report_timeout(&self, timeout: Duration) -> Option<MachineReport> {
        self.reports.recv_timeout(timeout).ok()
    }

    /// Run `ticks` and wait for the report
    pub fn run_blocking(&self, ticks: u32) -> Result<MachineReport, MachineError> {
        self.run(ticks)?;
        self.wait_report()
    }

    /// Cut the current run short; its report is still sent
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    /// Stop the thread and take the machine back
    pub fn shutdown(mut self) -> Result<Machine, MachineError> {
        self.interrupt();
        let _ = self.commands.send(MachineCommand::Stop);
        match self.thread_handle.take() {
            Some(handle) => handle.join().map_err(|_| MachineError::Disconnected),
            None => Err(MachineError::Disconnected),
        }
    }
}

impl Drop for MachineHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            self.interrupt.store(true, Ordering::Release);
            let _ = self.commands.send(MachineCommand::Stop);
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineConfig;
    use neurocore_hal::{Application, ExitCode, Platform};
    use neurocore_npu_runtime::ImageLocation;
    use std::any::Any;

    struct Countdown(u32);

    impl Application for Countdown {
        fn name(&self) -> &'static str {
            "countdown"
        }

        fn on_timer(&mut self, platform: &mut dyn Platform) {
            if self.0 == 0 {
                platform.exit(ExitCode::SUCCESS);
            } else {
                self.0 -= 1;
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn machine(ticks: u32) -> Machine {
        let mut machine = Machine::new(MachineConfig {
            sdram_bytes: 4096,
            ..Default::default()
        });
        machine
            .load_with(0, ImageLocation { base: 0, len_bytes: 0 }, move |_, _, _| {
                Ok(Box::new(Countdown(ticks)))
            })
            .unwrap();
        machine
    }

    #[test]
    fn test_runs_report_and_machine_comes_back() {
        let handle = MachineHandle::spawn(machine(100)).unwrap();
        let first = handle.run_blocking(10).unwrap();
        assert_eq!(first.ticks, 10);
        assert!(!first.all_exited());

        let second = handle.run_blocking(1000).unwrap();
        assert_eq!(second.ticks, 101);
        assert!(second.all_succeeded());

        let machine = handle.shutdown().unwrap();
        assert_eq!(machine.ticks(), 101);
    }
}

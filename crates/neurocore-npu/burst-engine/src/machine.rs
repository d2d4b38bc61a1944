// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Host Stub Kernel
//!
//! Runs role applications in lock-step ticks on the host, standing in for the per-core event
//! kernel of the chip.
//!
//! ## Design
//! - One prioritised mailbox per core: multicast packet > DMA completion > user event. The
//!   timer is the lowest priority source and is only delivered at the start of a tick, when every
//!   mailbox has drained.
//! - A handler's side effects (DMA requests, packets, user events, exit) are buffered in a
//!   [`CorePlatform`] and applied after it returns, so a handler is never re-entered.
//! - DMA is performed against the shared [`Sdram`] when applied and completes with a DMA-done
//!   event carrying the buffer back to its owner.
//! - Packets are routed by `(key, mask)` entries to every matching core; a packet matching no
//!   route is dropped and counted.
//! - The multicast link accepts a bounded number of packets per handler before `multicast_send`
//!   reports it full; `delay_us` drains it.

use crate::error::MachineError;
use crate::roles::Role;
use neurocore_hal::{
    Application, CoreId, CycleCounter, DmaDirection, DmaTag, Dtcm, ExitCode, InterruptControl,
    Platform, Sdram,
};
use neurocore_npu_runtime::ImageLocation;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Events delivered within one tick before the machine assumes a role is looping
const MAX_EVENTS_PER_TICK: usize = 1 << 22;

/// Host kernel parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub sdram_bytes: u32,
    pub dtcm_bytes: usize,
    /// Packets a handler may send before the link reports full
    pub link_capacity: usize,
    /// Cycle counter rate used by `delay_us`
    pub cycles_per_us: u32,
    /// Sleep so that each tick lasts the shortest configured timer period
    pub real_time: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            sdram_bytes: neurocore_hal::sdram::DEFAULT_SDRAM_BYTES,
            dtcm_bytes: neurocore_hal::dtcm::DEFAULT_DTCM_BYTES,
            link_capacity: 64,
            cycles_per_us: 200,
            real_time: false,
        }
    }
}

#[derive(Debug)]
enum Event {
    Start,
    Multicast { key: u32, payload: Option<u32> },
    DmaDone { tag: DmaTag, buffer: Vec<u32> },
    User,
    Timer,
}

#[derive(Debug, Default)]
struct Mailbox {
    multicast: VecDeque<(u32, Option<u32>)>,
    dma: VecDeque<(DmaTag, Vec<u32>)>,
    user: bool,
}

impl Mailbox {
    fn pop(&mut self) -> Option<Event> {
        if let Some((key, payload)) = self.multicast.pop_front() {
            return Some(Event::Multicast { key, payload });
        }
        if let Some((tag, buffer)) = self.dma.pop_front() {
            return Some(Event::DmaDone { tag, buffer });
        }
        if std::mem::take(&mut self.user) {
            return Some(Event::User);
        }
        None
    }

    fn clear(&mut self) {
        self.multicast.clear();
        self.dma.clear();
        self.user = false;
    }
}

#[derive(Debug)]
struct DmaRequest {
    tag: DmaTag,
    address: u32,
    buffer: Vec<u32>,
    direction: DmaDirection,
}

/// Side effects of one handler, applied when it returns
#[derive(Debug, Default)]
struct Effects {
    dma: Vec<DmaRequest>,
    packets: Vec<(u32, Option<u32>)>,
    user_event: bool,
    timer_period_us: Option<u32>,
    exit: Option<ExitCode>,
}

/// [`Platform`] handed to a role for the duration of one handler
pub struct CorePlatform<'a> {
    core: CoreId,
    sdram: &'a Sdram,
    clock: CycleCounter,
    interrupts: Arc<InterruptControl>,
    link_capacity: usize,
    link_in_flight: usize,
    cycles_per_us: u32,
    user_event_pending: bool,
    effects: Effects,
}

impl<'a> CorePlatform<'a> {
    fn new(machine: &'a Machine, slot: &CoreSlot) -> Self {
        Self {
            core: slot.id,
            sdram: &machine.sdram,
            clock: machine.clock.clone(),
            interrupts: slot.interrupts.clone(),
            link_capacity: machine.config.link_capacity,
            link_in_flight: 0,
            cycles_per_us: machine.config.cycles_per_us,
            user_event_pending: slot.mailbox.user,
            effects: Effects::default(),
        }
    }
}

impl Platform for CorePlatform<'_> {
    fn core_id(&self) -> CoreId {
        self.core
    }

    fn sdram(&self) -> &Sdram {
        self.sdram
    }

    fn dma_transfer(
        &mut self,
        tag: DmaTag,
        sdram_address: u32,
        buffer: Vec<u32>,
        direction: DmaDirection,
    ) {
        self.effects.dma.push(DmaRequest {
            tag,
            address: sdram_address,
            buffer,
            direction,
        });
    }

    fn multicast_send(&mut self, key: u32, payload: Option<u32>) -> bool {
        if self.link_in_flight >= self.link_capacity {
            return false;
        }
        self.link_in_flight += 1;
        self.effects.packets.push((key, payload));
        true
    }

    fn trigger_user_event(&mut self) -> bool {
        if self.user_event_pending {
            return false;
        }
        self.user_event_pending = true;
        self.effects.user_event = true;
        true
    }

    fn set_timer_tick(&mut self, micros: u32) {
        self.effects.timer_period_us = Some(micros);
    }

    fn delay_us(&mut self, micros: u32) {
        self.link_in_flight = 0;
        self.clock.advance(micros.saturating_mul(self.cycles_per_us));
    }

    fn clock(&self) -> CycleCounter {
        self.clock.clone()
    }

    fn interrupts(&self) -> Arc<InterruptControl> {
        self.interrupts.clone()
    }

    fn exit(&mut self, code: ExitCode) {
        self.effects.exit.get_or_insert(code);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// Loaded, `on_start` not yet delivered
    Loaded,
    Running,
    Exited(ExitCode),
}

struct CoreSlot {
    id: CoreId,
    app: Option<Box<dyn Application + Send>>,
    state: CoreState,
    mailbox: Mailbox,
    interrupts: Arc<InterruptControl>,
    timer_period_us: u32,
    image: Option<ImageLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    key: u32,
    mask: u32,
    targets: Vec<CoreId>,
}

/// Outcome of [`Machine::run`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MachineReport {
    /// Ticks completed by the machine since it was created
    pub ticks: u32,
    /// Exit code per core, `None` while the core is still running
    pub exit_codes: BTreeMap<CoreId, Option<ExitCode>>,
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub dma_transfers: u64,
    pub dma_errors: u64,
}

impl MachineReport {
    pub fn all_exited(&self) -> bool {
        self.exit_codes.values().all(Option::is_some)
    }

    /// Every core exited with code 0
    pub fn all_succeeded(&self) -> bool {
        self.exit_codes
            .values()
            .all(|c| c.is_some_and(ExitCode::is_success))
    }

    pub fn exit_code(&self, core: CoreId) -> Option<ExitCode> {
        self.exit_codes.get(&core).copied().flatten()
    }
}

pub struct Machine {
    config: MachineConfig,
    sdram: Sdram,
    clock: CycleCounter,
    cores: BTreeMap<CoreId, CoreSlot>,
    routes: Vec<Route>,
    tags: HashMap<(CoreId, u32), ImageLocation>,
    ticks: u32,
    packets_sent: u64,
    packets_dropped: u64,
    dma_transfers: u64,
    dma_errors: u64,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        info!(
            sdram_bytes = config.sdram_bytes,
            dtcm_bytes = config.dtcm_bytes,
            link_capacity = config.link_capacity,
            real_time = config.real_time,
            "Machine created"
        );
        Self {
            sdram: Sdram::new(config.sdram_bytes),
            config,
            clock: CycleCounter::new(),
            cores: BTreeMap::new(),
            routes: Vec::new(),
            tags: HashMap::new(),
            ticks: 0,
            packets_sent: 0,
            packets_dropped: 0,
            dma_transfers: 0,
            dma_errors: 0,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn sdram(&self) -> &Sdram {
        &self.sdram
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Reserve `size_bytes` of SDRAM under `(core, tag)`, returning its base address
    pub fn alloc_tag(&mut self, core: CoreId, tag: u32, size_bytes: u32) -> Result<u32, MachineError> {
        if self.tags.contains_key(&(core, tag)) {
            return Err(MachineError::TagInUse { core, tag });
        }
        let base = self.sdram.allocate(size_bytes)?;
        self.tags.insert(
            (core, tag),
            ImageLocation {
                base,
                len_bytes: size_bytes,
            },
        );
        debug!(core, tag, base = format_args!("0x{base:08x}"), size_bytes, "Tag allocated");
        Ok(base)
    }

    /// Region registered under `(core, tag)`
    pub fn tag(&self, core: CoreId, tag: u32) -> Option<ImageLocation> {
        self.tags.get(&(core, tag)).copied()
    }

    /// Deliver packets matching `key` under `mask` to `targets`
    pub fn add_route(&mut self, key: u32, mask: u32, targets: impl IntoIterator<Item = CoreId>) {
        let targets: Vec<CoreId> = targets.into_iter().collect();
        debug!(
            key = format_args!("0x{key:08x}"),
            mask = format_args!("0x{mask:08x}"),
            ?targets,
            "Route added"
        );
        self.routes.push(Route {
            key: key & mask,
            mask,
            targets,
        });
    }

    /// Start role `R` on `core` from the image at `location`
    ///
    /// A role that fails to start occupies the core as exited with the failure's exit code, as
    /// it would on the chip.
    pub fn load<R: Role + 'static>(&mut self, core: CoreId, location: ImageLocation) -> Result<(), MachineError> {
        self.load_with(core, location, |sdram, location, dtcm| {
            R::boot(sdram, location, dtcm).map(|r| Box::new(r) as Box<dyn Application + Send>)
        })
    }

    /// Start whatever `boot` builds on `core`
    pub fn load_with<F>(&mut self, core: CoreId, location: ImageLocation, boot: F) -> Result<(), MachineError>
    where
        F: FnOnce(&Sdram, ImageLocation, &mut Dtcm) -> crate::error::Result<Box<dyn Application + Send>>,
    {
        if self.cores.contains_key(&core) {
            return Err(MachineError::CoreInUse(core));
        }
        let mut dtcm = Dtcm::new(self.config.dtcm_bytes);
        let (app, state) = match boot(&self.sdram, location, &mut dtcm) {
            Ok(app) => {
                info!(core, role = app.name(), dtcm_used = dtcm.used(), "Core loaded");
                (Some(app), CoreState::Loaded)
            }
            Err(e) => {
                let code = e.exit_code();
                error!(core, error = %e, exit_code = code.0, "Core failed to start");
                (None, CoreState::Exited(code))
            }
        };
        // Tag 0 of a core is its image
        self.tags.insert((core, 0), location);
        self.cores.insert(
            core,
            CoreSlot {
                id: core,
                app,
                state,
                mailbox: Mailbox::default(),
                interrupts: Arc::new(InterruptControl::new()),
                timer_period_us: 0,
                image: Some(location),
            },
        );
        Ok(())
    }

    pub fn core_state(&self, core: CoreId) -> Option<CoreState> {
        self.cores.get(&core).map(|s| s.state)
    }

    /// Image a core was loaded from
    pub fn core_image(&self, core: CoreId) -> Option<ImageLocation> {
        self.cores.get(&core).and_then(|s| s.image)
    }

    /// Concrete role running on `core`
    pub fn role<T: 'static>(&self, core: CoreId) -> Option<&T> {
        self.cores
            .get(&core)?
            .app
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn role_mut<T: 'static>(&mut self, core: CoreId) -> Option<&mut T> {
        self.cores
            .get_mut(&core)?
            .app
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Queue a packet as if it arrived from the network
    pub fn inject_multicast(&mut self, key: u32, payload: Option<u32>) {
        self.route(key, payload);
    }

    pub fn running_cores(&self) -> usize {
        self.cores
            .values()
            .filter(|s| !matches!(s.state, CoreState::Exited(_)))
            .count()
    }

    pub fn report(&self) -> MachineReport {
        MachineReport {
            ticks: self.ticks,
            exit_codes: self
                .cores
                .iter()
                .map(|(&id, s)| {
                    let code = match s.state {
                        CoreState::Exited(code) => Some(code),
                        _ => None,
                    };
                    (id, code)
                })
                .collect(),
            packets_sent: self.packets_sent,
            packets_dropped: self.packets_dropped,
            dma_transfers: self.dma_transfers,
            dma_errors: self.dma_errors,
        }
    }

    /// Run one tick: start new cores, deliver the timer to every running core in core order,
    /// then pump mailboxes round-robin until all are empty
    pub fn step(&mut self) {
        let started = Instant::now();
        let ids: Vec<CoreId> = self.cores.keys().copied().collect();

        for &id in &ids {
            if self.cores.get(&id).is_some_and(|s| s.state == CoreState::Loaded) {
                if let Some(slot) = self.cores.get_mut(&id) {
                    slot.state = CoreState::Running;
                }
                self.dispatch(id, Event::Start);
            }
        }
        for &id in &ids {
            self.dispatch(id, Event::Timer);
        }

        let mut delivered = 0usize;
        loop {
            let mut any = false;
            for &id in &ids {
                let event = match self.cores.get_mut(&id) {
                    Some(slot) if slot.state == CoreState::Running => slot.mailbox.pop(),
                    _ => None,
                };
                if let Some(event) = event {
                    any = true;
                    delivered += 1;
                    self.dispatch(id, event);
                }
            }
            if !any {
                break;
            }
            if delivered >= MAX_EVENTS_PER_TICK {
                warn!(tick = self.ticks, delivered, "Event limit reached, abandoning tick");
                break;
            }
        }

        trace!(tick = self.ticks, events = delivered, "Tick complete");
        self.ticks += 1;

        if self.config.real_time {
            let period = self
                .cores
                .values()
                .filter(|s| s.state == CoreState::Running && s.timer_period_us > 0)
                .map(|s| s.timer_period_us)
                .min()
                .unwrap_or(1000);
            let budget = Duration::from_micros(period as u64);
            if let Some(remaining) = budget.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Run up to `ticks` ticks, stopping early once every core has exited
    pub fn run(&mut self, ticks: u32) -> MachineReport {
        for _ in 0..ticks {
            if self.running_cores() == 0 {
                break;
            }
            self.step();
        }
        let report = self.report();
        info!(
            ticks = report.ticks,
            running = self.running_cores(),
            packets = report.packets_sent,
            dropped = report.packets_dropped,
            "Run complete"
        );
        report
    }

    /// Deliver `event` to `core` and apply its effects
    fn dispatch(&mut self, core: CoreId, event: Event) {
        let Some(slot) = self.cores.get_mut(&core) else {
            return;
        };
        if slot.state != CoreState::Running {
            return;
        }
        let Some(mut app) = slot.app.take() else {
            return;
        };

        let effects = {
            let slot = &self.cores[&core];
            let mut platform = CorePlatform::new(self, slot);
            match event {
                Event::Start => app.on_start(&mut platform),
                Event::Timer => app.on_timer(&mut platform),
                Event::Multicast { key, payload } => app.on_multicast(key, payload, &mut platform),
                Event::DmaDone { tag, buffer } => app.on_dma_done(tag, buffer, &mut platform),
                Event::User => app.on_user_event(&mut platform),
            }
            platform.effects
        };

        if let Some(slot) = self.cores.get_mut(&core) {
            slot.app = Some(app);
        }
        self.apply(core, effects);
    }

    fn apply(&mut self, core: CoreId, effects: Effects) {
        for request in effects.dma {
            self.perform_dma(core, request);
        }
        for (key, payload) in effects.packets {
            self.route(key, payload);
        }
        let Some(slot) = self.cores.get_mut(&core) else {
            return;
        };
        if effects.user_event {
            slot.mailbox.user = true;
        }
        if let Some(period) = effects.timer_period_us {
            slot.timer_period_us = period;
        }
        if let Some(code) = effects.exit {
            slot.state = CoreState::Exited(code);
            slot.mailbox.clear();
            info!(core, exit_code = code.0, tick = self.ticks, "Core exited");
        }
    }

    fn perform_dma(&mut self, core: CoreId, mut request: DmaRequest) {
        let result = match request.direction {
            DmaDirection::Read => self.sdram.read_words(request.address, &mut request.buffer),
            DmaDirection::Write => self.sdram.write_words(request.address, &request.buffer),
        };
        self.dma_transfers += 1;
        if let Err(e) = result {
            self.dma_errors += 1;
            error!(
                core,
                tag = request.tag,
                address = format_args!("0x{:08x}", request.address),
                error = %e,
                "DMA failed"
            );
        }
        if let Some(slot) = self.cores.get_mut(&core) {
            slot.mailbox.dma.push_back((request.tag, request.buffer));
        }
    }

    fn route(&mut self, key: u32, payload: Option<u32>) {
        self.packets_sent += 1;
        let mut delivered = false;
        for route in self.routes.iter().filter(|r| key & r.mask == r.key) {
            for target in &route.targets {
                if let Some(slot) = self.cores.get_mut(target) {
                    if slot.state == CoreState::Running || slot.state == CoreState::Loaded {
                        slot.mailbox.multicast.push_back((key, payload));
                        delivered = true;
                    }
                }
            }
        }
        if !delivered {
            self.packets_dropped += 1;
            trace!(key = format_args!("0x{key:08x}"), "Packet dropped");
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    /// Echoes every packet back with the key incremented and DMAs the tick number to SDRAM
    struct Probe {
        address: u32,
        tick: u32,
        received: Vec<u32>,
        user_events: u32,
        dma_done: Vec<Vec<u32>>,
        exit_at: u32,
    }

    impl Application for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn on_start(&mut self, platform: &mut dyn Platform) {
            platform.set_timer_tick(1000);
        }

        fn on_timer(&mut self, platform: &mut dyn Platform) {
            if self.tick == self.exit_at {
                platform.exit(ExitCode::SUCCESS);
                return;
            }
            platform.dma_transfer(1, self.address, vec![self.tick], DmaDirection::Write);
            platform.multicast_send(0x100 | platform.core_id(), None);
            self.tick += 1;
        }

        fn on_multicast(&mut self, key: u32, _payload: Option<u32>, platform: &mut dyn Platform) {
            self.received.push(key);
            platform.trigger_user_event();
        }

        fn on_dma_done(&mut self, _tag: DmaTag, buffer: Vec<u32>, _platform: &mut dyn Platform) {
            self.dma_done.push(buffer);
        }

        fn on_user_event(&mut self, _platform: &mut dyn Platform) {
            self.user_events += 1;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn machine_with_probes(n: u32, exit_at: u32) -> Machine {
        let mut machine = Machine::new(MachineConfig {
            sdram_bytes: 1 << 16,
            ..Default::default()
        });
        for core in 0..n {
            let address = machine.alloc_tag(core, 1, 4).unwrap();
            machine
                .load_with(core, ImageLocation { base: address, len_bytes: 4 }, move |_, _, _| {
                    Ok(Box::new(Probe {
                        address,
                        tick: 0,
                        received: Vec::new(),
                        user_events: 0,
                        dma_done: Vec::new(),
                        exit_at,
                    }))
                })
                .unwrap();
        }
        machine
    }

    #[test]
    fn test_packets_follow_routes() {
        let mut machine = machine_with_probes(2, 100);
        machine.add_route(0x100, 0xFFFF_FFFF, [1]);
        machine.step();
        let probe1 = machine.role::<Probe>(1).unwrap();
        assert_eq!(probe1.received, vec![0x100]);
        assert_eq!(probe1.user_events, 1);
        assert!(machine.role::<Probe>(0).unwrap().received.is_empty());
        // Core 1's packet has no route
        assert_eq!(machine.report().packets_dropped, 1);
    }

    #[test]
    fn test_dma_write_completes_with_buffer() {
        let mut machine = machine_with_probes(1, 100);
        machine.step();
        machine.step();
        let probe = machine.role::<Probe>(0).unwrap();
        assert_eq!(probe.dma_done, vec![vec![0], vec![1]]);
        let address = machine.tag(0, 1).unwrap().base;
        assert_eq!(machine.sdram().read_word(address).unwrap(), 1);
    }

    #[test]
    fn test_exit_stops_delivery_and_run_ends_early() {
        let mut machine = machine_with_probes(2, 3);
        let report = machine.run(10);
        assert!(report.all_exited());
        assert!(report.all_succeeded());
        assert_eq!(report.ticks, 4);
        assert_eq!(machine.role::<Probe>(0).unwrap().tick, 3);
    }

    #[test]
    fn test_core_and_tag_reuse_rejected() {
        let mut machine = machine_with_probes(1, 3);
        assert_eq!(machine.alloc_tag(0, 1, 4), Err(MachineError::TagInUse { core: 0, tag: 1 }));
        let err = machine
            .load_with(0, ImageLocation { base: 0, len_bytes: 0 }, |_, _, _| {
                Err(crate::error::RoleError::unsupported("probe", "unused"))
            })
            .unwrap_err();
        assert_eq!(err, MachineError::CoreInUse(0));
    }

    #[test]
    fn test_boot_failure_marks_core_exited() {
        let mut machine = Machine::default();
        machine
            .load_with(3, ImageLocation { base: 0, len_bytes: 0 }, |_, _, _| {
                Err(crate::error::RoleError::unsupported("probe", "no image"))
            })
            .unwrap();
        assert_eq!(machine.core_state(3), Some(CoreState::Exited(ExitCode::CONFIG_INVALID)));
        assert_eq!(machine.run(5).ticks, 0);
    }

    #[test]
    fn test_link_fills_until_delay() {
        let slot = CoreSlot {
            id: 0,
            app: None,
            state: CoreState::Running,
            mailbox: Mailbox::default(),
            interrupts: Arc::new(InterruptControl::new()),
            timer_period_us: 0,
            image: None,
        };
        let machine = Machine::new(MachineConfig {
            sdram_bytes: 1024,
            link_capacity: 2,
            ..Default::default()
        });
        let mut platform = CorePlatform::new(&machine, &slot);
        assert!(platform.multicast_send(1, None));
        assert!(platform.multicast_send(2, None));
        assert!(!platform.multicast_send(3, None));
        let before = platform.cycle_counter();
        assert_eq!(platform.multicast_send_blocking(3, None), 1);
        assert_eq!(platform.cycle_counter() - before, 200);
        assert_eq!(platform.effects.packets.len(), 3);
    }
}

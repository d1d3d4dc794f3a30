//! The MSX motherboard: device registry, bus arbitration, interrupt line
//! and run loop.
//!
//! The motherboard owns every device and is the only writer of the slot
//! and port tables. A CPU access is routed to at most one device; nobody
//! answering is not an error (the bus floats to the fill value).
//!
//! The run loop is scheduled like any device: [`Motherboard::run_until`]
//! registers a point owned by [`DeviceId::MACHINE`] and lets the CPU run
//! slice by slice up to the next pending point until that one fires.

use emu_core::{
    Cpu, CpuBus, Device, DeviceContext, DeviceId, DeviceRequest, EmuTime, IrqLine, Observable,
    Scheduler, SyncTag, Value,
};
use tracing::{debug, error, trace, warn};

use crate::config::MachineConfig;
use crate::error::ConfigError;
use crate::io::IoMap;
use crate::monitor::{CoreMonitor, CoreStatus};
use crate::slots::{NUM_PAGES, NUM_SLOTS, SlotMap, SlotRegisters};

/// Tag of the point that ends [`Motherboard::run_until`].
const RUN_LIMIT: SyncTag = SyncTag(0);

/// Address of the secondary slot register in an expanded slot.
const SUBSLOT_REGISTER: u16 = 0xFFFF;

pub struct Motherboard {
    pub(crate) devices: Vec<Option<Box<dyn Device>>>,
    /// Names survive removal so diagnostics can still refer to the device.
    pub(crate) names: Vec<String>,
    pub(crate) scheduler: Scheduler,
    pub(crate) irq: IrqLine,
    pub(crate) slots: SlotMap,
    io: IoMap,
    fill_value: u8,
    requests: Vec<DeviceRequest>,
    stop_requested: bool,
    monitor: CoreMonitor,
}

fn apply_requests(requests: &mut Vec<DeviceRequest>, slots: &mut SlotMap, stop: &mut bool) {
    for request in requests.drain(..) {
        match request {
            DeviceRequest::WritePrimarySlots(value) => slots.write_primary_register(value),
            DeviceRequest::StopEmulation => *stop = true,
        }
    }
}

impl Motherboard {
    /// An empty board. Use [`crate::MachineBuilder`] to assemble a machine.
    #[must_use]
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            devices: Vec::new(),
            names: Vec::new(),
            scheduler: Scheduler::new(),
            irq: IrqLine::new(),
            slots: SlotMap::new(config.expanded_slots),
            io: IoMap::new(),
            fill_value: config.fill_value,
            requests: Vec::new(),
            stop_requested: false,
            monitor: CoreMonitor::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------

    /// Take ownership of a device. Handles are assigned in registration
    /// order, which is also the order of lifecycle broadcasts.
    pub fn add_device(&mut self, device: Box<dyn Device>) -> DeviceId {
        let id = DeviceId::new(self.devices.len() as u32);
        debug!(?id, name = device.name(), "add device");
        self.names.push(device.name().to_string());
        self.devices.push(Some(device));
        id
    }

    /// Number of registry entries, removed devices included.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.get(id.index()).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn device_name(&self, id: DeviceId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    fn name_of(&self, id: DeviceId) -> String {
        self.device_name(id).unwrap_or("<machine>").to_string()
    }

    fn device_mut(&mut self, id: DeviceId) -> Result<&mut dyn Device, ConfigError> {
        match self.devices.get_mut(id.index()) {
            Some(Some(device)) => Ok(device.as_mut()),
            _ => Err(ConfigError::UnknownDevice(id)),
        }
    }

    /// Map a device into one (primary, secondary, page) cell.
    pub fn register_memory_device(
        &mut self,
        id: DeviceId,
        primary: u8,
        secondary: u8,
        page: u8,
    ) -> Result<(), ConfigError> {
        if primary >= NUM_SLOTS || secondary >= NUM_SLOTS {
            return Err(ConfigError::SlotOutOfRange { primary, secondary });
        }
        if page >= NUM_PAGES {
            return Err(ConfigError::PageOutOfRange(page));
        }
        if secondary != 0 && !self.slots.is_expanded(primary) {
            return Err(ConfigError::SlotNotExpanded(primary));
        }
        if self.device_mut(id)?.as_memory().is_none() {
            return Err(ConfigError::MissingCapability {
                device: self.name_of(id),
                capability: "memory",
            });
        }
        self.slots
            .register(id, primary, secondary, page)
            .map_err(|occupied| ConfigError::SlotConflict {
                primary,
                secondary,
                page,
                existing: self.name_of(occupied.0),
                device: self.name_of(id),
            })?;
        debug!(device = self.name_of(id), primary, secondary, page, "map memory");
        Ok(())
    }

    pub fn register_io_in(&mut self, port: u8, id: DeviceId) -> Result<(), ConfigError> {
        self.require_io(id)?;
        self.io
            .register_in(port, id)
            .map_err(|occupied| ConfigError::IoInConflict {
                port,
                existing: self.name_of(occupied.0),
                device: self.name_of(id),
            })?;
        debug!(device = self.name_of(id), port, "map input port");
        Ok(())
    }

    pub fn register_io_out(&mut self, port: u8, id: DeviceId) -> Result<(), ConfigError> {
        self.require_io(id)?;
        self.io
            .register_out(port, id)
            .map_err(|occupied| ConfigError::IoOutConflict {
                port,
                existing: self.name_of(occupied.0),
                device: self.name_of(id),
            })?;
        debug!(device = self.name_of(id), port, "map output port");
        Ok(())
    }

    fn require_io(&mut self, id: DeviceId) -> Result<(), ConfigError> {
        if self.device_mut(id)?.as_io().is_none() {
            return Err(ConfigError::MissingCapability {
                device: self.name_of(id),
                capability: "I/O",
            });
        }
        Ok(())
    }

    /// Take a device out of the machine (cartridge pulled).
    ///
    /// Its `destroy` hook runs first; it must cancel its own points. Slot
    /// and port mappings and any IRQ it still asserts are dropped.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<Box<dyn Device>, ConfigError> {
        self.device_mut(id)?;
        let now = self.scheduler.current_time();
        self.call_device(id, now, |device, ctx| device.destroy(ctx));
        let device = self.devices[id.index()]
            .take()
            .ok_or(ConfigError::UnknownDevice(id))?;
        self.forget(id);
        debug!(?id, name = device.name(), "remove device");
        Ok(device)
    }

    /// Drop every trace of `id` from the tables, the scheduler and the
    /// interrupt line.
    fn forget(&mut self, id: DeviceId) {
        self.slots.unregister(id);
        self.io.unregister(id);
        let pending = self.scheduler.pending_for(id);
        if pending > 0 {
            debug_assert!(
                false,
                "device \"{}\" destroyed with {pending} pending sync points",
                self.name_of(id)
            );
            error!(device = self.name_of(id), pending, "destroyed device left sync points");
            self.scheduler.cancel_points(id, None);
        }
        if self.irq.release(id) {
            warn!(device = self.name_of(id), "destroyed device still asserted IRQ");
        }
    }

    // ---------------------------------------------------------------------
    // Device calls
    // ---------------------------------------------------------------------

    /// Run `f` on a live device with a context scoped to it, then apply
    /// whatever the device requested.
    fn call_device<R>(
        &mut self,
        id: DeviceId,
        now: EmuTime,
        f: impl FnOnce(&mut dyn Device, &mut DeviceContext<'_>) -> R,
    ) -> Option<R> {
        let device = self.devices.get_mut(id.index())?.as_deref_mut()?;
        let mut ctx = DeviceContext::new(
            id,
            now,
            &mut self.scheduler,
            &mut self.irq,
            &mut self.requests,
        );
        let result = f(device, &mut ctx);
        apply_requests(&mut self.requests, &mut self.slots, &mut self.stop_requested);
        Some(result)
    }

    fn broadcast(
        &mut self,
        hook: &'static str,
        now: EmuTime,
        mut f: impl FnMut(&mut dyn Device, &mut DeviceContext<'_>),
    ) {
        debug!(hook, devices = self.devices.len(), %now, "lifecycle broadcast");
        for index in 0..self.devices.len() {
            self.call_device(DeviceId::new(index as u32), now, |device, ctx| f(device, ctx));
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn init_all(&mut self) {
        let now = self.scheduler.current_time();
        self.broadcast("init", now, |device, ctx| device.init(ctx));
    }

    /// Reset every device. Their pending points are cancelled and both
    /// slot-select registers return to 0 before any hook runs, so no stale
    /// timeout fires after the reset.
    pub fn reset_all(&mut self, time: EmuTime) {
        for index in 0..self.devices.len() {
            self.scheduler.cancel_points(DeviceId::new(index as u32), None);
        }
        self.slots.restore_registers(SlotRegisters::default());
        self.broadcast("reset", time, |device, ctx| device.reset(time, ctx));
        self.publish();
    }

    pub fn start_all(&mut self) {
        let now = self.scheduler.current_time();
        self.broadcast("start", now, |device, ctx| device.start(ctx));
    }

    pub fn stop_all(&mut self) {
        let now = self.scheduler.current_time();
        self.broadcast("stop", now, |device, ctx| device.stop(ctx));
    }

    /// Destroy every device and empty the registry.
    pub fn destroy_all(&mut self) {
        let now = self.scheduler.current_time();
        self.broadcast("destroy", now, |device, ctx| device.destroy(ctx));
        for index in 0..self.devices.len() {
            let id = DeviceId::new(index as u32);
            if self.devices[index].take().is_some() {
                self.forget(id);
            }
        }
        self.publish();
    }

    // ---------------------------------------------------------------------
    // Slot selection (privileged)
    // ---------------------------------------------------------------------

    /// Show `primary` in `page`. Nothing changes on an invalid index.
    pub fn set_primary_slot_selection(&mut self, page: u8, primary: u8) -> Result<(), ConfigError> {
        if page >= NUM_PAGES {
            return Err(ConfigError::PageOutOfRange(page));
        }
        if primary >= NUM_SLOTS {
            return Err(ConfigError::SlotOutOfRange {
                primary,
                secondary: 0,
            });
        }
        trace!(page, primary, "select primary slot");
        self.slots.set_primary(page, primary);
        Ok(())
    }

    /// Show `secondary` in every page of `primary`. Nothing changes on an
    /// invalid index.
    pub fn set_secondary_slot_selection(
        &mut self,
        primary: u8,
        secondary: u8,
    ) -> Result<(), ConfigError> {
        if primary >= NUM_SLOTS || secondary >= NUM_SLOTS {
            return Err(ConfigError::SlotOutOfRange { primary, secondary });
        }
        trace!(primary, secondary, "select secondary slot");
        self.slots.set_secondary(primary, secondary);
        Ok(())
    }

    pub fn write_primary_slot_register(&mut self, value: u8) {
        self.slots.write_primary_register(value);
    }

    pub fn write_secondary_slot_register(&mut self, primary: u8, value: u8) {
        self.slots.write_secondary_register(primary, value);
    }

    #[must_use]
    pub fn slot_registers(&self) -> SlotRegisters {
        self.slots.registers()
    }

    /// Expanded slot whose secondary register sits at `address`, if any.
    fn subslot_register_at(&self, address: u16) -> Option<u8> {
        if address != SUBSLOT_REGISTER {
            return None;
        }
        let primary = self.slots.primary_for_page(3);
        self.slots.is_expanded(primary).then_some(primary)
    }

    // ---------------------------------------------------------------------
    // Interrupts and scheduling (exposed to the machine)
    // ---------------------------------------------------------------------

    pub fn raise_irq(&mut self, id: DeviceId) {
        self.irq.raise(id);
    }

    pub fn lower_irq(&mut self, id: DeviceId) {
        self.irq.lower(id);
    }

    #[must_use]
    pub fn irq_count(&self) -> usize {
        self.irq.count()
    }

    /// Register a wake-up for `id`. Only the run loop and live devices with
    /// the schedulable capability can own points; anything else is a bug
    /// and the point is dropped.
    pub fn register_point(&mut self, time: EmuTime, id: DeviceId, tag: SyncTag) {
        if !self.accepts_points(id) {
            debug_assert!(false, "{:?} ({}) cannot receive sync points", id, self.name_of(id));
            error!(
                device = ?id,
                name = self.name_of(id),
                %time,
                "sync point dropped, device cannot receive it"
            );
            return;
        }
        self.scheduler.register_point(time, id, tag);
    }

    pub(crate) fn accepts_points(&mut self, id: DeviceId) -> bool {
        id == DeviceId::MACHINE
            || self
                .devices
                .get_mut(id.index())
                .and_then(|slot| slot.as_deref_mut())
                .is_some_and(|device| device.as_schedulable().is_some())
    }

    pub fn cancel_points(&mut self, id: DeviceId, tag: Option<SyncTag>) -> usize {
        self.scheduler.cancel_points(id, tag)
    }

    #[must_use]
    pub fn next_instant(&self) -> EmuTime {
        self.scheduler.next_instant()
    }

    #[must_use]
    pub fn current_time(&self) -> EmuTime {
        self.scheduler.current_time()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // ---------------------------------------------------------------------
    // Time
    // ---------------------------------------------------------------------

    /// Handle for threads that need to read the core's time.
    #[must_use]
    pub fn monitor(&self) -> CoreMonitor {
        self.monitor.clone()
    }

    fn status(&self) -> CoreStatus {
        CoreStatus {
            time: self.scheduler.current_time(),
            irq_pending: self.irq.is_pending(),
            pending_points: self.scheduler.len(),
        }
    }

    pub(crate) fn publish(&mut self) {
        let status = self.status();
        *self.monitor.lock() = status;
    }

    /// Dispatch every point due at `now`, holding the monitor lock.
    pub fn dispatch_due(&mut self, now: EmuTime) -> usize {
        let monitor = self.monitor.clone();
        let mut status = monitor.lock();
        let delivered = self.dispatch_due_locked(now);
        *status = self.status();
        delivered
    }

    fn dispatch_due_locked(&mut self, now: EmuTime) -> usize {
        let Self {
            devices,
            names,
            scheduler,
            irq,
            slots,
            requests,
            stop_requested,
            ..
        } = self;
        scheduler.dispatch_due(now, |scheduler, point| {
            if point.device == DeviceId::MACHINE {
                *stop_requested = true;
                return;
            }
            let target = devices
                .get_mut(point.device.index())
                .and_then(|slot| slot.as_deref_mut())
                .and_then(|device| device.as_schedulable());
            let Some(target) = target else {
                let name = names.get(point.device.index()).map(String::as_str);
                debug_assert!(false, "sync point for missing device {:?} ({name:?})", point.device);
                error!(device = ?point.device, ?name, "sync point for missing device dropped");
                return;
            };
            let mut ctx = DeviceContext::new(point.device, point.time, scheduler, irq, requests);
            target.on_sync_point(point.time, point.tag, &mut ctx);
            apply_requests(requests, slots, stop_requested);
        })
    }

    /// Run `cpu` until `end` or until a device asks to stop. Returns the
    /// CPU's time on exit.
    ///
    /// The monitor lock is held for each slice (CPU execution plus the
    /// dispatch that follows) and released between slices.
    pub fn run_until<C: Cpu>(&mut self, cpu: &mut C, end: EmuTime) -> EmuTime {
        let monitor = self.monitor.clone();
        self.scheduler.register_point(end, DeviceId::MACHINE, RUN_LIMIT);
        self.stop_requested = false;
        while !self.stop_requested {
            let mut status = monitor.lock();
            let limit = self.scheduler.next_instant();
            let reached = cpu.execute(self, limit);
            let now = reached.max(self.scheduler.current_time());
            self.dispatch_due_locked(now);
            *status = self.status();
        }
        self.scheduler.cancel_points(DeviceId::MACHINE, None);
        self.publish();
        cpu.time()
    }

    // ---------------------------------------------------------------------
    // Debugger access
    // ---------------------------------------------------------------------

    /// Read memory without side effects.
    pub fn peek_mem(&mut self, address: u16) -> u8 {
        if let Some(primary) = self.subslot_register_at(address) {
            return !self.slots.registers().secondary[usize::from(primary)];
        }
        let fill = self.fill_value;
        self.slots
            .resolve(address)
            .and_then(|id| self.device_mut(id).ok())
            .and_then(|device| device.as_memory())
            .map_or(fill, |memory| memory.peek_mem(address))
    }

    /// Read an I/O port without side effects.
    pub fn peek_io(&mut self, port: u16) -> u8 {
        let fill = self.fill_value;
        self.io
            .reader(port)
            .and_then(|id| self.device_mut(id).ok())
            .and_then(|device| device.as_io())
            .map_or(fill, |io| io.peek_io(port))
    }
}

impl CpuBus for Motherboard {
    fn read_mem(&mut self, address: u16, time: EmuTime) -> u8 {
        if let Some(primary) = self.subslot_register_at(address) {
            return !self.slots.registers().secondary[usize::from(primary)];
        }
        let Some(id) = self.slots.resolve(address) else {
            trace!(address, "unmapped read");
            return self.fill_value;
        };
        self.call_device(id, time, |device, ctx| {
            device
                .as_memory()
                .map(|memory| memory.read_mem(address, time, ctx))
        })
        .flatten()
        .unwrap_or(self.fill_value)
    }

    fn write_mem(&mut self, address: u16, value: u8, time: EmuTime) {
        if let Some(primary) = self.subslot_register_at(address) {
            self.slots.write_secondary_register(primary, value);
            return;
        }
        let Some(id) = self.slots.resolve(address) else {
            trace!(address, value, "unmapped write");
            return;
        };
        self.call_device(id, time, |device, ctx| {
            if let Some(memory) = device.as_memory() {
                memory.write_mem(address, value, time, ctx);
            }
        });
    }

    fn read_io(&mut self, port: u16, time: EmuTime) -> u8 {
        let Some(id) = self.io.reader(port) else {
            trace!(port, "unmapped port read");
            return self.fill_value;
        };
        self.call_device(id, time, |device, ctx| {
            device.as_io().map(|io| io.read_io(port, time, ctx))
        })
        .flatten()
        .unwrap_or(self.fill_value)
    }

    fn write_io(&mut self, port: u16, value: u8, time: EmuTime) {
        let Some(id) = self.io.writer(port) else {
            trace!(port, value, "unmapped port write");
            return;
        };
        self.call_device(id, time, |device, ctx| {
            if let Some(io) = device.as_io() {
                io.write_io(port, value, time, ctx);
            }
        });
    }

    fn irq_pending(&self) -> bool {
        self.irq.is_pending()
    }

    fn next_sync_time(&self) -> EmuTime {
        if self.stop_requested {
            self.scheduler.current_time()
        } else {
            self.scheduler.next_instant()
        }
    }
}

const QUERY_PATHS: &[&str] = &[
    "time",
    "devices",
    "irq.pending",
    "irq.count",
    "slots.primary",
    "slots.secondary",
    "slots.visible",
    "scheduler.pending",
    "scheduler.next",
];

impl Observable for Motherboard {
    fn query(&self, path: &str) -> Option<Value> {
        let name_or_dash = |id: Option<DeviceId>| {
            Value::from(id.and_then(|id| self.device_name(id)).unwrap_or("-"))
        };
        let value = match path {
            "time" => Value::from(self.scheduler.current_time()),
            "devices" => Value::Array(self.names.iter().map(|n| Value::from(n.as_str())).collect()),
            "irq.pending" => Value::from(self.irq.is_pending()),
            "irq.count" => Value::from(self.irq.count()),
            "slots.primary" => Value::from(self.slots.registers().primary),
            "slots.secondary" => Value::Array(
                self.slots
                    .registers()
                    .secondary
                    .iter()
                    .map(|&r| Value::from(r))
                    .collect(),
            ),
            "slots.visible" => {
                Value::Array(self.slots.visible().iter().map(|&id| name_or_dash(id)).collect())
            }
            "scheduler.pending" => Value::from(self.scheduler.len()),
            "scheduler.next" => Value::from(self.scheduler.next_instant()),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

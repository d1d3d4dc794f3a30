//! Device capability traits and the per-call device context.
//!
//! A device is polymorphic over independent capabilities: it may answer
//! memory accesses ([`MemoryDevice`]), I/O port accesses ([`IoDevice`]),
//! wake-ups from the scheduler ([`Schedulable`]), and it may drive the shared
//! interrupt line through its [`DeviceContext`]. A concrete peripheral
//! implements only what it needs and advertises it through the `as_*`
//! accessors on [`Device`].
//!
//! Devices never hold a reference to the machine. Every call into a device
//! carries a [`DeviceContext`] scoped to that device, which is the only way
//! to reach the scheduler and the interrupt line.

use crate::irq::IrqLine;
use crate::scheduler::Scheduler;
use crate::time::{EmuDuration, EmuTime};

/// Value returned by reads nobody answers, and the default for peeks.
pub const OPEN_BUS: u8 = 0xFF;

/// Stable handle of a device in the machine's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(u32);

impl DeviceId {
    /// Reserved for points owned by the machine itself (the run loop).
    pub const MACHINE: Self = Self(u32::MAX);

    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Distinguishes independent wake-ups of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncTag(pub u32);

impl SyncTag {
    pub const DEFAULT: Self = Self(0);
}

/// Something a device asks the machine to do once its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Load the primary slot-select register (the PPI port A path).
    WritePrimarySlots(u8),
    /// Leave the run loop after the current dispatch.
    StopEmulation,
}

/// A component registered with the machine.
///
/// Lifecycle hooks default to doing nothing; capability accessors default
/// to `None`.
pub trait Device {
    /// Name used in logs and snapshots.
    fn name(&self) -> &str;

    /// Called once after the machine has been assembled.
    fn init(&mut self, _ctx: &mut DeviceContext<'_>) {}

    /// Return to power-on state. Pending points of this device have already
    /// been cancelled when this runs.
    fn reset(&mut self, _time: EmuTime, _ctx: &mut DeviceContext<'_>) {}

    fn start(&mut self, _ctx: &mut DeviceContext<'_>) {}

    fn stop(&mut self, _ctx: &mut DeviceContext<'_>) {}

    /// Release resources. The device must not own pending points afterwards.
    fn destroy(&mut self, _ctx: &mut DeviceContext<'_>) {}

    fn as_memory(&mut self) -> Option<&mut dyn MemoryDevice> {
        None
    }

    fn as_io(&mut self) -> Option<&mut dyn IoDevice> {
        None
    }

    fn as_schedulable(&mut self) -> Option<&mut dyn Schedulable> {
        None
    }
}

/// Answers CPU memory accesses for the pages it is mapped into.
pub trait MemoryDevice {
    fn read_mem(&mut self, address: u16, time: EmuTime, ctx: &mut DeviceContext<'_>) -> u8;

    /// Read without side effects, for debuggers.
    fn peek_mem(&self, _address: u16) -> u8 {
        OPEN_BUS
    }

    /// Writes are ignored unless overridden (ROM).
    fn write_mem(&mut self, _address: u16, _value: u8, _time: EmuTime, _ctx: &mut DeviceContext<'_>) {}
}

/// Answers CPU I/O port accesses for the ports it is registered on.
///
/// The full 16-bit port is passed through; only the low byte selects the
/// device.
pub trait IoDevice {
    fn read_io(&mut self, port: u16, time: EmuTime, ctx: &mut DeviceContext<'_>) -> u8;

    fn peek_io(&self, _port: u16) -> u8 {
        OPEN_BUS
    }

    fn write_io(&mut self, port: u16, value: u8, time: EmuTime, ctx: &mut DeviceContext<'_>);
}

/// Receives the synchronization points it registered.
pub trait Schedulable {
    /// Called exactly once per registered point, at or after `time`.
    fn on_sync_point(&mut self, time: EmuTime, tag: SyncTag, ctx: &mut DeviceContext<'_>);
}

/// Handle through which a device reaches the scheduler and the interrupt
/// line during one call. Everything it does is scoped to that device.
pub struct DeviceContext<'a> {
    id: DeviceId,
    now: EmuTime,
    scheduler: &'a mut Scheduler,
    irq: &'a mut IrqLine,
    requests: &'a mut Vec<DeviceRequest>,
}

impl<'a> DeviceContext<'a> {
    pub fn new(
        id: DeviceId,
        now: EmuTime,
        scheduler: &'a mut Scheduler,
        irq: &'a mut IrqLine,
        requests: &'a mut Vec<DeviceRequest>,
    ) -> Self {
        Self {
            id,
            now,
            scheduler,
            irq,
            requests,
        }
    }

    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Instant of the access or dispatch being handled.
    #[must_use]
    pub fn now(&self) -> EmuTime {
        self.now
    }

    pub fn register_point(&mut self, time: EmuTime, tag: SyncTag) {
        self.scheduler.register_point(time, self.id, tag);
    }

    /// Register a point `delay` after [`Self::now`].
    pub fn register_point_after(&mut self, delay: EmuDuration, tag: SyncTag) {
        let time = self.now + delay;
        self.scheduler.register_point(time, self.id, tag);
    }

    pub fn cancel_points(&mut self, tag: Option<SyncTag>) -> usize {
        self.scheduler.cancel_points(self.id, tag)
    }

    #[must_use]
    pub fn has_point(&self, tag: Option<SyncTag>) -> bool {
        self.scheduler.has_point(self.id, tag)
    }

    pub fn raise_irq(&mut self) {
        self.irq.raise(self.id);
    }

    pub fn lower_irq(&mut self) {
        self.irq.lower(self.id);
    }

    /// Whether this device currently asserts the interrupt line.
    #[must_use]
    pub fn irq_asserted(&self) -> bool {
        self.irq.is_asserted(self.id)
    }

    /// Whether any device asserts the interrupt line.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.irq.is_pending()
    }

    pub fn write_primary_slots(&mut self, value: u8) {
        self.requests.push(DeviceRequest::WritePrimarySlots(value));
    }

    pub fn stop_emulation(&mut self) {
        self.requests.push(DeviceRequest::StopEmulation);
    }
}

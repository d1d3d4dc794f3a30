//! Shared interrupt line.
//!
//! Any number of devices may assert the one maskable interrupt line. The
//! line stays asserted while at least one device holds it. Each device holds
//! it at most once: raising twice or lowering without a raise is a contract
//! violation (panics in debug builds, ignored with a warning otherwise).

use std::collections::BTreeSet;

use tracing::warn;

use crate::device::DeviceId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrqLine {
    asserted: BTreeSet<DeviceId>,
}

impl IrqLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, device: DeviceId) {
        if !self.asserted.insert(device) {
            debug_assert!(false, "{device:?} raised the IRQ line twice");
            warn!(?device, "IRQ raised twice, ignored");
        }
    }

    pub fn lower(&mut self, device: DeviceId) {
        if !self.asserted.remove(&device) {
            debug_assert!(false, "{device:?} lowered the IRQ line without raising it");
            warn!(?device, "unmatched IRQ lower, clamped");
        }
    }

    /// Drop the device's assertion if it has one, without complaint.
    pub fn release(&mut self, device: DeviceId) -> bool {
        self.asserted.remove(&device)
    }

    #[must_use]
    pub fn is_asserted(&self, device: DeviceId) -> bool {
        self.asserted.contains(&device)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.asserted.is_empty()
    }

    /// Number of devices currently asserting the line.
    #[must_use]
    pub fn count(&self) -> usize {
        self.asserted.len()
    }

    pub fn asserting(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.asserted.iter().copied()
    }

    pub fn clear(&mut self) {
        self.asserted.clear();
    }
}

//! Save state for the machine core.
//!
//! Captures what the core itself owns:
//! - current virtual time
//! - both slot-select registers
//! - which devices assert the interrupt line
//! - every pending sync point, in dispatch order
//!
//! Device-internal state is the devices' own business. Points owned by the
//! run loop are not saved; `run_until` removes them before it returns.

use std::collections::BTreeSet;

use emu_core::{DeviceId, EmuTime, SyncPoint, SyncTag};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SnapshotError;
use crate::motherboard::Motherboard;
use crate::slots::SlotRegisters;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointState {
    pub device: DeviceId,
    /// Name at capture time, checked on restore.
    pub device_name: String,
    pub time: EmuTime,
    pub tag: SyncTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub version: u32,
    pub time: EmuTime,
    pub primary_slots: u8,
    pub secondary_slots: [u8; 4],
    pub irq_asserted: Vec<DeviceId>,
    /// In dispatch order.
    pub points: Vec<PointState>,
}

impl MachineSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode a snapshot, rejecting other format versions.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(text)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }
}

impl Motherboard {
    /// Capture the core state.
    #[must_use]
    pub fn save_state(&self) -> MachineSnapshot {
        let points = self
            .scheduler
            .points()
            .filter(|point| point.device != DeviceId::MACHINE)
            .map(|point| PointState {
                device: point.device,
                device_name: self.device_name(point.device).unwrap_or_default().to_string(),
                time: point.time,
                tag: point.tag,
            })
            .collect();
        let registers = self.slots.registers();
        MachineSnapshot {
            version: SNAPSHOT_VERSION,
            time: self.scheduler.current_time(),
            primary_slots: registers.primary,
            secondary_slots: registers.secondary,
            irq_asserted: self.irq.asserting().collect(),
            points,
        }
    }

    /// Replace the core state with `snapshot`.
    ///
    /// Every device the snapshot names must be present under the same name,
    /// and every scheduled one must accept sync points. All pending points
    /// are replaced. Nothing changes if validation fails.
    pub fn restore_state(&mut self, snapshot: &MachineSnapshot) -> Result<(), SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        for point in &snapshot.points {
            self.check_device(point.device, Some(&point.device_name))?;
            if !self.accepts_points(point.device) {
                return Err(SnapshotError::NotSchedulable {
                    id: point.device,
                    name: point.device_name.clone(),
                });
            }
        }
        let mut asserted = BTreeSet::new();
        for &id in &snapshot.irq_asserted {
            self.check_device(id, None)?;
            if !asserted.insert(id) {
                return Err(SnapshotError::DuplicateIrq(id));
            }
        }

        let restored = snapshot.points.iter().map(|point| SyncPoint {
            time: point.time,
            device: point.device,
            tag: point.tag,
        });
        self.scheduler.restore(snapshot.time, restored);
        self.slots.restore_registers(SlotRegisters {
            primary: snapshot.primary_slots,
            secondary: snapshot.secondary_slots,
        });
        self.irq.clear();
        for &id in &snapshot.irq_asserted {
            self.irq.raise(id);
        }
        self.publish();
        debug!(time = %snapshot.time, points = snapshot.points.len(), "state restored");
        Ok(())
    }

    fn check_device(&self, id: DeviceId, name: Option<&str>) -> Result<(), SnapshotError> {
        if !self.contains(id) {
            return Err(SnapshotError::UnknownDevice(id));
        }
        let found = self.device_name(id).unwrap_or_default();
        match name {
            Some(expected) if expected != found => Err(SnapshotError::DeviceMismatch {
                id,
                expected: expected.to_string(),
                found: found.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

//! Machine assembly and snapshot errors.

use emu_core::DeviceId;

/// The machine description is inconsistent. Raised while assembling the
/// machine; nothing is left running when it occurs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "slot {primary}-{secondary} page {page} is taken by \"{existing}\", cannot map \"{device}\""
    )]
    SlotConflict {
        primary: u8,
        secondary: u8,
        page: u8,
        existing: String,
        device: String,
    },
    #[error("input port {port:#04X} is taken by \"{existing}\", cannot map \"{device}\"")]
    IoInConflict {
        port: u8,
        existing: String,
        device: String,
    },
    #[error("output port {port:#04X} is taken by \"{existing}\", cannot map \"{device}\"")]
    IoOutConflict {
        port: u8,
        existing: String,
        device: String,
    },
    #[error("slot {primary}-{secondary} does not exist")]
    SlotOutOfRange { primary: u8, secondary: u8 },
    #[error("page {0} does not exist")]
    PageOutOfRange(u8),
    #[error("primary slot {0} is not expanded")]
    SlotNotExpanded(u8),
    #[error("no device with id {0:?}")]
    UnknownDevice(DeviceId),
    #[error("device \"{device}\" has no {capability} capability")]
    MissingCapability {
        device: String,
        capability: &'static str,
    },
}

/// A snapshot cannot be decoded or does not fit this machine.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("snapshot refers to device {0:?}, which this machine does not have")]
    UnknownDevice(DeviceId),
    #[error("snapshot device {id:?} is \"{expected}\" but this machine has \"{found}\"")]
    DeviceMismatch {
        id: DeviceId,
        expected: String,
        found: String,
    },
    #[error("snapshot schedules device {id:?} (\"{name}\"), which cannot receive sync points")]
    NotSchedulable { id: DeviceId, name: String },
    #[error("snapshot asserts the IRQ line twice for device {0:?}")]
    DuplicateIrq(DeviceId),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}

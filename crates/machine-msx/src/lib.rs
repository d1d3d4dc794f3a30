//! MSX machine core.
//!
//! The motherboard owns every device, decides which one answers each CPU
//! access through the slot and I/O port tables, aggregates the shared
//! interrupt line and drives the CPU between sync points.
//!
//! ```text
//!   CPU ──CpuBus──▶ Motherboard ──┬─ SlotMap ──▶ MemoryDevice
//!                       │         └─ IoMap ────▶ IoDevice
//!                       │
//!                   Scheduler ───────────────▶ Schedulable
//! ```

mod builder;
mod config;
mod error;
mod io;
mod monitor;
mod motherboard;
mod slots;
mod snapshot;

pub use builder::MachineBuilder;
pub use config::MachineConfig;
pub use error::{ConfigError, SnapshotError};
pub use io::IoMap;
pub use monitor::{CoreMonitor, CoreStatus};
pub use motherboard::Motherboard;
pub use slots::{NUM_PAGES, NUM_SLOTS, Occupied, SlotMap, SlotRegisters};
pub use snapshot::{MachineSnapshot, PointState, SNAPSHOT_VERSION};

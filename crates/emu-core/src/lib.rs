//! Core types for cycle-accurate emulation: virtual time, the event
//! scheduler, the shared interrupt line and the device contracts.
//!
//! Everything is timed in ticks of one master frequency. Devices never run
//! on their own; they are called for bus accesses and woken by the scheduler
//! at the instants they asked for.

mod bus;
mod clock;
mod cpu;
mod device;
mod irq;
mod observable;
mod scheduler;
mod time;

pub use bus::CpuBus;
pub use clock::DeviceClock;
pub use cpu::Cpu;
pub use device::{
    Device, DeviceContext, DeviceId, DeviceRequest, IoDevice, MemoryDevice, OPEN_BUS, Schedulable,
    SyncTag,
};
pub use irq::IrqLine;
pub use observable::{Observable, Value};
pub use scheduler::{Scheduler, SyncPoint};
pub use time::{EmuDuration, EmuTime, MAIN_FREQ};

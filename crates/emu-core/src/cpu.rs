//! CPU core trait.

use crate::bus::CpuBus;
use crate::time::EmuTime;

/// A CPU driven by the machine's run loop.
///
/// The CPU does not own the bus. It is passed in for each slice so the
/// machine can route accesses and dispatch sync points in between.
pub trait Cpu {
    /// Current instant of the CPU.
    fn time(&self) -> EmuTime;

    /// Execute instructions until the CPU reaches `limit` or
    /// [`CpuBus::next_sync_time`] drops below the instant it has reached.
    ///
    /// Returns the instant reached, which may overshoot by less than one
    /// instruction.
    fn execute<B: CpuBus>(&mut self, bus: &mut B, limit: EmuTime) -> EmuTime;

    /// Move the CPU's clock without executing, e.g. after a snapshot load.
    fn set_time(&mut self, time: EmuTime);

    /// Reset the CPU to its initial state.
    fn reset(&mut self, time: EmuTime);
}

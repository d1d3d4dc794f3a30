//! The bus as seen by the CPU.

use crate::time::EmuTime;

/// Memory, I/O and interrupt interface consumed by the CPU.
///
/// The implementation decides which device (if any) answers each access; the
/// CPU never learns which one did. Every access carries the instant at which
/// it happens.
pub trait CpuBus {
    /// Read a byte from the given address.
    fn read_mem(&mut self, address: u16, time: EmuTime) -> u8;

    /// Write a byte to the given address.
    fn write_mem(&mut self, address: u16, value: u8, time: EmuTime);

    /// Read a byte from the given I/O port.
    fn read_io(&mut self, port: u16, time: EmuTime) -> u8;

    /// Write a byte to the given I/O port.
    fn write_io(&mut self, port: u16, value: u8, time: EmuTime);

    /// True while any device asserts the maskable interrupt line.
    fn irq_pending(&self) -> bool;

    /// Earliest instant at which the CPU must hand control back.
    ///
    /// A device may register a more urgent point during an access, so the
    /// CPU should check this after every instruction.
    fn next_sync_time(&self) -> EmuTime;
}

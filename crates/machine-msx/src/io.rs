//! I/O port tables.
//!
//! The Z80 puts a 16-bit port on the bus but MSX decodes only the low byte,
//! so there are exactly 256 input and 256 output ports. Input and output
//! sides are independent: a port may be read by one device and written by
//! another.

use emu_core::DeviceId;

use crate::slots::Occupied;

#[derive(Debug, Clone)]
pub struct IoMap {
    inputs: [Option<DeviceId>; 256],
    outputs: [Option<DeviceId>; 256],
}

impl Default for IoMap {
    fn default() -> Self {
        Self::new()
    }
}

fn claim(cell: &mut Option<DeviceId>, device: DeviceId) -> Result<(), Occupied> {
    match *cell {
        Some(existing) if existing != device => Err(Occupied(existing)),
        _ => {
            *cell = Some(device);
            Ok(())
        }
    }
}

impl IoMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: [None; 256],
            outputs: [None; 256],
        }
    }

    pub fn register_in(&mut self, port: u8, device: DeviceId) -> Result<(), Occupied> {
        claim(&mut self.inputs[usize::from(port)], device)
    }

    pub fn register_out(&mut self, port: u8, device: DeviceId) -> Result<(), Occupied> {
        claim(&mut self.outputs[usize::from(port)], device)
    }

    /// Device answering reads of `port`.
    #[must_use]
    pub fn reader(&self, port: u16) -> Option<DeviceId> {
        self.inputs[usize::from(port & 0xFF)]
    }

    /// Device receiving writes to `port`.
    #[must_use]
    pub fn writer(&self, port: u16) -> Option<DeviceId> {
        self.outputs[usize::from(port & 0xFF)]
    }

    /// Clear every port held by `device`. Returns how many were cleared.
    pub fn unregister(&mut self, device: DeviceId) -> usize {
        let mut cleared = 0;
        for cell in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            if *cell == Some(device) {
                *cell = None;
                cleared += 1;
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPI: DeviceId = DeviceId::new(0);
    const PSG: DeviceId = DeviceId::new(1);

    #[test]
    fn only_low_byte_selects_the_port() {
        let mut io = IoMap::new();
        io.register_in(0xA8, PPI).unwrap();
        assert_eq!(io.reader(0x12A8), Some(PPI));
        assert_eq!(io.writer(0x00A8), None);
    }

    #[test]
    fn in_and_out_are_independent() {
        let mut io = IoMap::new();
        io.register_out(0xA0, PSG).unwrap();
        io.register_in(0xA0, PPI).unwrap();
        assert_eq!(io.writer(0xA0), Some(PSG));
        assert_eq!(io.reader(0xA0), Some(PPI));
        assert_eq!(io.register_out(0xA0, PPI), Err(Occupied(PSG)));
    }

    #[test]
    fn unregister_clears_both_directions() {
        let mut io = IoMap::new();
        io.register_in(0xA2, PSG).unwrap();
        io.register_out(0xA0, PSG).unwrap();
        io.register_out(0xA1, PSG).unwrap();
        assert_eq!(io.unregister(PSG), 3);
        assert_eq!(io.writer(0xA1), None);
    }
}

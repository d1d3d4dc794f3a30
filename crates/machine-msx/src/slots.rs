//! MSX slot structure.
//!
//! The 64K address space is split into four 16K pages. Each page shows one
//! of four primary slots; a primary slot marked as expanded is itself split
//! into four secondary slots. A device occupies any number of
//! (primary, secondary, page) cells, and each cell holds at most one device.
//!
//! # Selection registers
//!
//! | Register         | Where (on real hardware) | Layout                        |
//! |------------------|--------------------------|-------------------------------|
//! | Primary          | PPI port A, I/O `$A8`    | 2 bits per page, page 0 in 1-0 |
//! | Secondary (×4)   | `$FFFF` of the slot      | 2 bits per page, page 0 in 1-0 |
//!
//! The secondary register of a slot is only consulted when that slot is
//! expanded. Reading `$FFFF` returns the register inverted.

use emu_core::DeviceId;

pub const NUM_SLOTS: u8 = 4;
pub const NUM_PAGES: u8 = 4;
pub const PAGE_SHIFT: u16 = 14;

/// A cell is already taken by this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupied(pub DeviceId);

/// Primary and secondary slot-select registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotRegisters {
    pub primary: u8,
    pub secondary: [u8; 4],
}

fn field(register: u8, page: u8) -> u8 {
    (register >> (2 * page)) & 3
}

fn with_field(register: u8, page: u8, value: u8) -> u8 {
    let shift = 2 * page;
    (register & !(3 << shift)) | ((value & 3) << shift)
}

#[derive(Debug, Clone)]
pub struct SlotMap {
    /// Indexed `[primary][secondary][page]`.
    layout: [[[Option<DeviceId>; 4]; 4]; 4],
    expanded: [bool; 4],
    registers: SlotRegisters,
    /// Device currently visible in each page.
    visible: [Option<DeviceId>; 4],
}

impl SlotMap {
    #[must_use]
    pub fn new(expanded: [bool; 4]) -> Self {
        Self {
            layout: [[[None; 4]; 4]; 4],
            expanded,
            registers: SlotRegisters::default(),
            visible: [None; 4],
        }
    }

    #[must_use]
    pub fn is_expanded(&self, primary: u8) -> bool {
        self.expanded[usize::from(primary & 3)]
    }

    /// Occupant of a cell. Indices must be in range.
    #[must_use]
    pub fn cell(&self, primary: u8, secondary: u8, page: u8) -> Option<DeviceId> {
        self.layout[usize::from(primary)][usize::from(secondary)][usize::from(page)]
    }

    /// Put `device` in a cell. Indices must be in range. Mapping a device
    /// into a cell it already holds is a no-op.
    pub fn register(
        &mut self,
        device: DeviceId,
        primary: u8,
        secondary: u8,
        page: u8,
    ) -> Result<(), Occupied> {
        let cell = &mut self.layout[usize::from(primary)][usize::from(secondary)][usize::from(page)];
        match *cell {
            Some(existing) if existing != device => return Err(Occupied(existing)),
            _ => *cell = Some(device),
        }
        self.refresh();
        Ok(())
    }

    /// Clear every cell held by `device`. Returns how many were cleared.
    pub fn unregister(&mut self, device: DeviceId) -> usize {
        let mut cleared = 0;
        for cell in self.layout.iter_mut().flatten().flatten() {
            if *cell == Some(device) {
                *cell = None;
                cleared += 1;
            }
        }
        self.refresh();
        cleared
    }

    #[must_use]
    pub fn registers(&self) -> SlotRegisters {
        self.registers
    }

    /// Primary slot currently selected for `page`.
    #[must_use]
    pub fn primary_for_page(&self, page: u8) -> u8 {
        field(self.registers.primary, page)
    }

    /// Secondary slot currently selected for `page` (0 if not expanded).
    #[must_use]
    pub fn secondary_for_page(&self, page: u8) -> u8 {
        let primary = self.primary_for_page(page);
        if self.is_expanded(primary) {
            field(self.registers.secondary[usize::from(primary)], page)
        } else {
            0
        }
    }

    /// Select `primary` for `page`. Out-of-range indices are ignored.
    pub fn set_primary(&mut self, page: u8, primary: u8) {
        if page >= NUM_PAGES || primary >= NUM_SLOTS {
            return;
        }
        self.registers.primary = with_field(self.registers.primary, page, primary);
        self.refresh();
    }

    /// Select `secondary` in every page of `primary`. Out-of-range indices
    /// are ignored.
    pub fn set_secondary(&mut self, primary: u8, secondary: u8) {
        if primary >= NUM_SLOTS || secondary >= NUM_SLOTS {
            return;
        }
        self.registers.secondary[usize::from(primary)] = secondary * 0x55;
        self.refresh();
    }

    pub fn write_primary_register(&mut self, value: u8) {
        self.registers.primary = value;
        self.refresh();
    }

    pub fn write_secondary_register(&mut self, primary: u8, value: u8) {
        self.registers.secondary[usize::from(primary & 3)] = value;
        self.refresh();
    }

    pub fn restore_registers(&mut self, registers: SlotRegisters) {
        self.registers = registers;
        self.refresh();
    }

    /// Device answering `address` under the current selection.
    #[must_use]
    pub fn resolve(&self, address: u16) -> Option<DeviceId> {
        self.visible[usize::from(address >> PAGE_SHIFT)]
    }

    /// Device visible in each page, page 0 first.
    #[must_use]
    pub fn visible(&self) -> [Option<DeviceId>; 4] {
        self.visible
    }

    fn refresh(&mut self) {
        for page in 0..NUM_PAGES {
            let primary = self.primary_for_page(page);
            let secondary = self.secondary_for_page(page);
            self.visible[usize::from(page)] = self.cell(primary, secondary, page);
        }
    }
}

//! Machine assembly.
//!
//! Devices and their mappings are collected first and registered in one
//! go by [`MachineBuilder::build`], which fails with a [`ConfigError`] on
//! the first conflict instead of producing a half-wired machine.

use emu_core::{Device, DeviceId};

use crate::config::MachineConfig;
use crate::error::ConfigError;
use crate::motherboard::Motherboard;

#[derive(Debug, Clone, Copy)]
enum Mapping {
    Memory {
        device: DeviceId,
        primary: u8,
        secondary: u8,
        page: u8,
    },
    IoIn { device: DeviceId, port: u8 },
    IoOut { device: DeviceId, port: u8 },
}

pub struct MachineBuilder {
    board: Motherboard,
    mappings: Vec<Mapping>,
}

impl MachineBuilder {
    #[must_use]
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            board: Motherboard::new(config),
            mappings: Vec::new(),
        }
    }

    pub fn add_device<D: Device + 'static>(&mut self, device: D) -> DeviceId {
        self.board.add_device(Box::new(device))
    }

    /// Map `device` into one page of a slot.
    pub fn map_memory(&mut self, device: DeviceId, primary: u8, secondary: u8, page: u8) -> &mut Self {
        self.mappings.push(Mapping::Memory {
            device,
            primary,
            secondary,
            page,
        });
        self
    }

    /// Map `device` into several pages of the same slot.
    pub fn map_memory_pages(
        &mut self,
        device: DeviceId,
        primary: u8,
        secondary: u8,
        pages: impl IntoIterator<Item = u8>,
    ) -> &mut Self {
        for page in pages {
            self.map_memory(device, primary, secondary, page);
        }
        self
    }

    pub fn map_io_in(&mut self, device: DeviceId, port: u8) -> &mut Self {
        self.mappings.push(Mapping::IoIn { device, port });
        self
    }

    pub fn map_io_out(&mut self, device: DeviceId, port: u8) -> &mut Self {
        self.mappings.push(Mapping::IoOut { device, port });
        self
    }

    /// Map both directions of `port`.
    pub fn map_io(&mut self, device: DeviceId, port: u8) -> &mut Self {
        self.map_io_in(device, port).map_io_out(device, port)
    }

    /// Register every mapping and run the devices' `init` hooks.
    pub fn build(self) -> Result<Motherboard, ConfigError> {
        let Self { mut board, mappings } = self;
        for mapping in mappings {
            match mapping {
                Mapping::Memory {
                    device,
                    primary,
                    secondary,
                    page,
                } => board.register_memory_device(device, primary, secondary, page)?,
                Mapping::IoIn { device, port } => board.register_io_in(port, device)?,
                Mapping::IoOut { device, port } => board.register_io_out(port, device)?,
            }
        }
        board.init_all();
        Ok(board)
    }
}

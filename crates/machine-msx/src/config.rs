//! Machine configuration.
//!
//! Every field has a default matching a plain MSX1 board; a machine
//! description file only needs to name what differs.

use emu_core::OPEN_BUS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Value read from unmapped memory and ports (floating bus).
    pub fill_value: u8,
    /// Which primary slots carry a secondary slot register.
    pub expanded_slots: [bool; 4],
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            fill_value: OPEN_BUS,
            expanded_slots: [false; 4],
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Mark `primary` as expanded.
    #[must_use]
    pub fn with_expanded(mut self, primary: u8) -> Self {
        self.expanded_slots[usize::from(primary & 3)] = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = MachineConfig::from_json(r#"{ "expanded_slots": [false, false, false, true] }"#)
            .expect("valid config");
        assert_eq!(config.fill_value, 0xFF);
        assert_eq!(config.expanded_slots, [false, false, false, true]);
    }

    #[test]
    fn with_expanded_sets_one_slot() {
        let config = MachineConfig::default().with_expanded(2);
        assert_eq!(config.expanded_slots, [false, false, true, false]);
    }
}

//! State inspection for debuggers and tests.
//!
//! Queries never affect emulation state.

use std::fmt;

use crate::time::EmuTime;

/// Result of a state query.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    /// Register-sized value, shown in hex.
    U8(u8),
    U64(u64),
    Time(EmuTime),
    String(String),
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::U64(v as u64)
    }
}

impl From<EmuTime> for Value {
    fn from(t: EmuTime) -> Self {
        Value::Time(t)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

/// A component whose state can be read by dotted path (`irq.pending`,
/// `slots.primary`, ...).
pub trait Observable {
    /// `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path [`Self::query`] answers.
    fn query_paths(&self) -> &'static [&'static str];
}

//! Status shared with threads outside the emulation loop.
//!
//! The audio thread needs the core's current time to know how far it may
//! render. The motherboard holds this lock for the whole of each time
//! advance and publishes the new status before releasing it, so a reader
//! always sees a consistent [`CoreStatus`]. Readers only copy the status;
//! they never change core state and the core never calls into them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use emu_core::EmuTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreStatus {
    pub time: EmuTime,
    pub irq_pending: bool,
    pub pending_points: usize,
}

/// Cloneable handle to the core status.
#[derive(Debug, Clone, Default)]
pub struct CoreMonitor {
    status: Arc<Mutex<CoreStatus>>,
}

impl CoreMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last published status. Blocks while the core is advancing.
    #[must_use]
    pub fn snapshot(&self) -> CoreStatus {
        *self.lock()
    }

    #[must_use]
    pub fn current_time(&self) -> EmuTime {
        self.lock().time
    }

    /// A panic on another thread cannot leave `CoreStatus` half-written, so
    /// a poisoned lock is still usable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, CoreStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

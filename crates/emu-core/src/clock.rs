//! Per-device clocks over master-clock time.

use crate::time::{EmuDuration, EmuTime, MAIN_FREQ};

/// A clock running at a device frequency, anchored to an instant.
///
/// Peripherals count in their own cycles; this converts those counts into
/// exact instants they can hand to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClock {
    freq_hz: u64,
    step: EmuDuration,
    last: EmuTime,
}

impl DeviceClock {
    /// Create a clock at `freq_hz` whose current tick is at `start`.
    ///
    /// `freq_hz` must divide [`MAIN_FREQ`] so that every step is exact.
    #[must_use]
    pub fn new(freq_hz: u64, start: EmuTime) -> Self {
        assert!(
            freq_hz != 0 && MAIN_FREQ % freq_hz == 0,
            "device clock {freq_hz} Hz does not divide the master clock"
        );
        Self {
            freq_hz,
            step: EmuDuration::from_cycles(1, freq_hz),
            last: start,
        }
    }

    #[must_use]
    pub const fn frequency_hz(&self) -> u64 {
        self.freq_hz
    }

    /// Instant of the current tick.
    #[must_use]
    pub const fn time(&self) -> EmuTime {
        self.last
    }

    /// Move the anchor to `time` without counting cycles.
    pub fn reset(&mut self, time: EmuTime) {
        self.last = time;
    }

    /// Advance by `cycles` device cycles.
    pub fn advance(&mut self, cycles: u64) {
        self.last = self.time_after(cycles);
    }

    /// Instant `cycles` device cycles after the current tick.
    #[must_use]
    pub fn time_after(&self, cycles: u64) -> EmuTime {
        let cycles = i64::try_from(cycles).unwrap_or(i64::MAX);
        self.last + EmuDuration::from_ticks(self.step.ticks().saturating_mul(cycles))
    }

    /// Whole device cycles from the current tick up to `time`.
    ///
    /// Zero when `time` is not after the current tick.
    #[must_use]
    pub fn ticks_until(&self, time: EmuTime) -> u64 {
        let span = time - self.last;
        if span.is_negative() {
            0
        } else {
            (span.ticks() / self.step.ticks()) as u64
        }
    }

    /// Advance to the last whole device cycle at or before `time`.
    ///
    /// Returns the number of cycles advanced.
    pub fn advance_to(&mut self, time: EmuTime) -> u64 {
        let cycles = self.ticks_until(time);
        self.advance(cycles);
        cycles
    }
}

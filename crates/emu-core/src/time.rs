//! Virtual time: instants and durations in master-clock ticks.
//!
//! All timing in the machine is expressed in ticks of one master frequency,
//! [`MAIN_FREQ`]. It is chosen as a common multiple of every clock found in an
//! MSX (Z80, VDP, PSG, FM, FDC), so converting a device cycle count to ticks
//! is always exact.

use core::fmt;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Master frequency in Hz: 3.579545 MHz × 960.
pub const MAIN_FREQ: u64 = 3_579_545 * 960;

fn saturate(ticks: i128) -> i64 {
    i64::try_from(ticks).unwrap_or(if ticks < 0 { i64::MIN } else { i64::MAX })
}

/// A signed span of virtual time, in master-clock ticks.
///
/// Durations are signed so that `a - b` is defined for any two instants.
/// Whether a duration may be negative is decided at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmuDuration(i64);

impl EmuDuration {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Duration of `cycles` periods of a clock running at `freq_hz`.
    ///
    /// Exact whenever `freq_hz` divides [`MAIN_FREQ`]; otherwise rounded
    /// towards zero. Saturates at the `i64` range.
    #[must_use]
    pub fn from_cycles(cycles: i64, freq_hz: u64) -> Self {
        assert!(freq_hz != 0, "clock frequency must be non-zero");
        let ticks = i128::from(cycles) * i128::from(MAIN_FREQ) / i128::from(freq_hz);
        Self(saturate(ticks))
    }

    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whole periods of a `freq_hz` clock contained in this duration.
    #[must_use]
    pub fn to_cycles(self, freq_hz: u64) -> i64 {
        assert!(freq_hz != 0, "clock frequency must be non-zero");
        saturate(i128::from(self.0) * i128::from(freq_hz) / i128::from(MAIN_FREQ))
    }

    /// Duration in seconds, for diagnostics only.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MAIN_FREQ as f64
    }
}

impl Add for EmuDuration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for EmuDuration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for EmuDuration {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

/// An instant in virtual time.
///
/// `EmuTime::INFINITY` is a sentinel that compares greater than every
/// reachable instant; adding to it leaves it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmuTime(u64);

impl EmuTime {
    pub const ZERO: Self = Self(0);
    pub const INFINITY: Self = Self(u64::MAX);

    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_infinite(self) -> bool {
        self.0 == u64::MAX
    }

    /// Signed distance from `earlier` to `self`.
    #[must_use]
    pub fn since(self, earlier: Self) -> EmuDuration {
        self - earlier
    }
}

impl Add<EmuDuration> for EmuTime {
    type Output = Self;

    /// Saturates at [`EmuTime::INFINITY`] and at [`EmuTime::ZERO`].
    fn add(self, rhs: EmuDuration) -> Self {
        if self.is_infinite() {
            return self;
        }
        let ticks = if rhs.0 >= 0 {
            self.0.saturating_add(rhs.0.unsigned_abs())
        } else {
            self.0.saturating_sub(rhs.0.unsigned_abs())
        };
        Self(ticks)
    }
}

impl AddAssign<EmuDuration> for EmuTime {
    fn add_assign(&mut self, rhs: EmuDuration) {
        *self = *self + rhs;
    }
}

impl Sub<EmuDuration> for EmuTime {
    type Output = Self;

    fn sub(self, rhs: EmuDuration) -> Self {
        self + (-rhs)
    }
}

impl SubAssign<EmuDuration> for EmuTime {
    fn sub_assign(&mut self, rhs: EmuDuration) {
        *self = *self - rhs;
    }
}

impl Sub for EmuTime {
    type Output = EmuDuration;

    fn sub(self, rhs: Self) -> EmuDuration {
        EmuDuration(saturate(i128::from(self.0) - i128::from(rhs.0)))
    }
}

impl fmt::Display for EmuTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}t", self.0)
        }
    }
}

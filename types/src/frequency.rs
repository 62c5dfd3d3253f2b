//! Frequency values and the suspend clamp.
//!
//! Frequencies are carried in kHz, the unit cpufreq reports and accepts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PowerState;

/// Maximum frequency allowed while suspended unless configured otherwise (800 MHz).
pub const DEFAULT_SUSPEND_MAX_FREQUENCY: Frequency = Frequency::from_mhz(800);

/// A processor frequency in kHz.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Frequency(u64);

impl Frequency {
    #[must_use]
    pub const fn from_khz(khz: u64) -> Self {
        Self(khz)
    }

    #[must_use]
    pub const fn from_mhz(mhz: u64) -> Self {
        Self(mhz.saturating_mul(1_000))
    }

    #[must_use]
    pub const fn khz(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kHz", self.0)
    }
}

/// An inclusive `[min, max]` frequency range.
///
/// Construction normalizes inverted input so `min <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrequencyRange {
    min: Frequency,
    max: Frequency,
}

impl FrequencyRange {
    #[must_use]
    pub fn new(min: Frequency, max: Frequency) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    #[must_use]
    pub fn from_khz(min: u64, max: u64) -> Self {
        Self::new(Frequency::from_khz(min), Frequency::from_khz(max))
    }

    #[must_use]
    pub const fn min(self) -> Frequency {
        self.min
    }

    #[must_use]
    pub const fn max(self) -> Frequency {
        self.max
    }
}

impl fmt::Display for FrequencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] kHz", self.min.khz(), self.max.khz())
    }
}

/// Narrow a unit's capability range for the given power state.
///
/// Active leaves the range untouched. Suspended caps the maximum at
/// `suspend_max`, never going below the unit's own minimum: a limit under the
/// minimum collapses the range to `[min, min]` instead of failing.
#[must_use]
pub fn clamp(
    capability: FrequencyRange,
    state: PowerState,
    suspend_max: Frequency,
) -> FrequencyRange {
    match state {
        PowerState::Active => capability,
        PowerState::Suspended => {
            let max = capability.max.min(suspend_max).max(capability.min);
            FrequencyRange {
                min: capability.min,
                max,
            }
        }
    }
}

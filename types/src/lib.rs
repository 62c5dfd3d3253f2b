//! Core domain types for the hotplug controller.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The frequency clamp lives here because it must stay a pure function: the
//! governor calls it synchronously from its own query path.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod frequency;
mod ids;

pub use frequency::{DEFAULT_SUSPEND_MAX_FREQUENCY, Frequency, FrequencyRange, clamp};
pub use ids::{SuspendLevel, UnitId};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Power state
// ============================================================================

/// Whether the device is currently meant to be suspended.
///
/// This is the *intended* state. While a transition is running the controllable
/// units may still be on their way to matching it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    #[default]
    Active,
    Suspended,
}

impl PowerState {
    #[must_use]
    pub const fn is_suspended(self) -> bool {
        matches!(self, Self::Suspended)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }

    /// Compact encoding used by the lock-free state cell.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Suspended => 1,
        }
    }

    /// Inverse of [`PowerState::to_u8`]. Unknown values read as `Active`.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Suspended,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// The two deferred transitions the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Suspend,
    Resume,
}

impl TransitionKind {
    /// Power state the transition publishes before touching any unit.
    #[must_use]
    pub const fn target_state(self) -> PowerState {
        match self {
            Self::Suspend => PowerState::Suspended,
            Self::Resume => PowerState::Active,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Unit primitive errors
// ============================================================================

/// Failure reported by the platform's unit online/offline primitive.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("unit {unit} is not present on this platform")]
    NotPresent { unit: UnitId },
    #[error("unit {unit} cannot be hotplugged")]
    NotHotpluggable { unit: UnitId },
    #[error("unit {unit} refused the request: {reason}")]
    Rejected { unit: UnitId, reason: String },
    #[error("i/o on {} failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

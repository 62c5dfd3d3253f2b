//! Frequency clamp handle handed to the governor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hotplug_types::{Frequency, FrequencyRange, PowerState, clamp};

use crate::state::PowerStateCell;

/// Answers the governor's "what range may this unit use" query.
///
/// Holds the live power state and the operator-tunable suspend cap. Both are
/// atomics, so [`FrequencyClamp::limit`] never blocks and never allocates.
#[derive(Debug, Clone)]
pub struct FrequencyClamp {
    state: PowerStateCell,
    suspend_max_khz: Arc<AtomicU64>,
}

impl FrequencyClamp {
    #[must_use]
    pub fn new(suspend_max: Frequency) -> Self {
        Self {
            state: PowerStateCell::default(),
            suspend_max_khz: Arc::new(AtomicU64::new(suspend_max.khz())),
        }
    }

    /// Allowed range for a unit whose hardware reports `capability`.
    #[must_use]
    pub fn limit(&self, capability: FrequencyRange) -> FrequencyRange {
        clamp(capability, self.power_state(), self.suspend_max_frequency())
    }

    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.state.get()
    }

    #[must_use]
    pub fn suspend_max_frequency(&self) -> Frequency {
        Frequency::from_khz(self.suspend_max_khz.load(Ordering::Acquire))
    }

    /// Change the suspend cap. Takes effect on the governor's next query.
    pub fn set_suspend_max_frequency(&self, limit: Frequency) {
        let previous = self.suspend_max_khz.swap(limit.khz(), Ordering::AcqRel);
        if previous != limit.khz() {
            tracing::info!(
                previous_khz = previous,
                khz = limit.khz(),
                "Suspend frequency cap updated"
            );
        }
    }

    pub(crate) fn state_cell(&self) -> &PowerStateCell {
        &self.state
    }
}

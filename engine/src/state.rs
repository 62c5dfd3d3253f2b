//! The controller's single source of truth for "are we suspended".

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use hotplug_types::PowerState;

/// Shared power state.
///
/// Cloning yields another handle to the same cell. Reads are lock-free and
/// never fail so the governor can call them from its query path; only the
/// transition engine writes.
#[derive(Debug, Clone, Default)]
pub struct PowerStateCell {
    inner: Arc<AtomicU8>,
}

impl PowerStateCell {
    #[must_use]
    pub fn new(initial: PowerState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial.to_u8())),
        }
    }

    #[must_use]
    pub fn get(&self) -> PowerState {
        PowerState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Release store: a governor that re-queries after this returns sees the new state.
    pub(crate) fn set(&self, state: PowerState) {
        self.inner.store(state.to_u8(), Ordering::Release);
    }
}

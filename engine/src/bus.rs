//! In-process early-suspend event source.
//!
//! Hooks are ordered by level: suspend walks them from the lowest level up,
//! resume walks them back down. Only edges are delivered; a second `suspend()`
//! while already suspended is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hotplug_types::SuspendLevel;

use crate::hooks::{HookId, SuspendEventSource, SuspendHook};

struct Registered {
    id: HookId,
    level: SuspendLevel,
    hook: Arc<dyn SuspendHook>,
}

#[derive(Default)]
struct BusState {
    hooks: Vec<Registered>,
    next_id: u64,
    suspended: bool,
}

/// Level-ordered suspend/resume dispatcher.
///
/// Edges are serialized: a `resume()` that races a `suspend()` still in
/// dispatch waits for it, so every hook sees edges in the order the flag
/// flipped. Hooks may register or unregister from inside a callback but must
/// not deliver another edge on the same bus.
#[derive(Default)]
pub struct EarlySuspendBus {
    state: Mutex<BusState>,
    dispatch: Mutex<()>,
}

impl EarlySuspendBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.lock().hooks.len()
    }

    /// Deliver a suspend edge. Returns `false` if already suspended.
    pub fn suspend(&self) -> bool {
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(hooks) = self.edge(true) else {
            return false;
        };
        tracing::debug!(hooks = hooks.len(), "Dispatching early suspend");
        for hook in hooks {
            hook.on_suspend();
        }
        true
    }

    /// Deliver a resume edge. Returns `false` if not suspended.
    pub fn resume(&self) -> bool {
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut hooks) = self.edge(false) else {
            return false;
        };
        hooks.reverse();
        tracing::debug!(hooks = hooks.len(), "Dispatching late resume");
        for hook in hooks {
            hook.on_resume();
        }
        true
    }

    /// Flip the suspended flag and snapshot hooks in ascending level order.
    /// The state lock is released before hooks run.
    fn edge(&self, suspend: bool) -> Option<Vec<Arc<dyn SuspendHook>>> {
        let mut state = self.lock();
        if state.suspended == suspend {
            return None;
        }
        state.suspended = suspend;
        Some(state.hooks.iter().map(|r| Arc::clone(&r.hook)).collect())
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SuspendEventSource for EarlySuspendBus {
    fn register(&self, level: SuspendLevel, hook: Arc<dyn SuspendHook>) -> HookId {
        let mut state = self.lock();
        let id = HookId::new(state.next_id);
        state.next_id += 1;
        // Stable insert keeps registration order within a level.
        let at = state.hooks.partition_point(|r| r.level <= level);
        state.hooks.insert(at, Registered { id, level, hook });
        tracing::debug!(%id, %level, "Suspend hook registered");
        id
    }

    fn unregister(&self, id: HookId) -> bool {
        let mut state = self.lock();
        let before = state.hooks.len();
        state.hooks.retain(|r| r.id != id);
        let removed = state.hooks.len() != before;
        if removed {
            tracing::debug!(%id, "Suspend hook unregistered");
        }
        removed
    }
}

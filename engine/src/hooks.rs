//! Suspend/resume hook interfaces and the controller's notification adapter.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use hotplug_types::{SuspendLevel, TransitionKind};

use crate::worker::WorkerMessage;

/// Receiver of suspend/resume edges.
///
/// Called from a context that must not block: implementations may only record
/// or enqueue work and return.
pub trait SuspendHook: Send + Sync {
    fn on_suspend(&self);

    fn on_resume(&self);
}

/// Registration handle returned by a [`SuspendEventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Something that delivers suspend/resume edges to registered hooks.
pub trait SuspendEventSource: Send + Sync {
    /// Register `hook` at `level`. Lower levels suspend first and resume last.
    fn register(&self, level: SuspendLevel, hook: Arc<dyn SuspendHook>) -> HookId;

    /// Returns `false` if `id` was not registered.
    fn unregister(&self, id: HookId) -> bool;
}

/// The controller's [`SuspendHook`]: forwards each edge to the transition worker.
///
/// Sending on the unbounded channel never blocks and never allocates beyond
/// the message itself, so this is safe to call from any thread.
#[derive(Clone)]
pub struct SignalAdapter {
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl SignalAdapter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self { tx }
    }

    fn enqueue(&self, kind: TransitionKind) {
        if self.tx.send(WorkerMessage::Signal(kind)).is_err() {
            tracing::debug!(transition = %kind, "Controller stopped; signal dropped");
        }
    }
}

impl fmt::Debug for SignalAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalAdapter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl SuspendHook for SignalAdapter {
    fn on_suspend(&self) {
        self.enqueue(TransitionKind::Suspend);
    }

    fn on_resume(&self) {
        self.enqueue(TransitionKind::Resume);
    }
}

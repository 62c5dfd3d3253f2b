//! Single-worker serial queue for transitions.
//!
//! The worker owns the pending set outright: adapters only push messages onto
//! an unbounded channel, and everything that decides what runs next happens
//! here, one transition at a time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot, watch};

use hotplug_types::TransitionKind;

use crate::transition::{TransitionReport, Transitions};

pub(crate) enum WorkerMessage {
    Signal(TransitionKind),
    /// Reply once every transition accepted before this message has run.
    Flush(oneshot::Sender<()>),
    /// Finish pending work, then exit.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueued {
    Queued,
    /// Same kind is already the last pending transition.
    Duplicate,
    /// The signal undid the trailing pending transition.
    Coalesced,
}

/// Pending transitions, at most two and always alternating.
///
/// Running the queue always leaves the system in the state named by the last
/// signal received; equal neighbours and `A, B, A` tails carry no extra effect,
/// so they are folded away.
#[derive(Debug, Default)]
pub(crate) struct PendingTransitions {
    slots: VecDeque<TransitionKind>,
}

impl PendingTransitions {
    pub(crate) fn push(&mut self, kind: TransitionKind) -> Enqueued {
        if self.slots.back() == Some(&kind) {
            return Enqueued::Duplicate;
        }
        if self.slots.len() == 2 {
            // [kind, opposite] + kind: the trailing opposite is cancelled.
            self.slots.pop_back();
            return Enqueued::Coalesced;
        }
        self.slots.push_back(kind);
        Enqueued::Queued
    }

    pub(crate) fn pop(&mut self) -> Option<TransitionKind> {
        self.slots.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[cfg(test)]
    fn as_vec(&self) -> Vec<TransitionKind> {
        self.slots.iter().copied().collect()
    }
}

pub(crate) struct Worker {
    transitions: Arc<Transitions>,
    running: Arc<AtomicBool>,
    reports: watch::Sender<Option<TransitionReport>>,
    pending: PendingTransitions,
    waiters: Vec<oneshot::Sender<()>>,
    stopping: bool,
}

impl Worker {
    pub(crate) fn new(
        transitions: Arc<Transitions>,
        running: Arc<AtomicBool>,
        reports: watch::Sender<Option<TransitionReport>>,
    ) -> Self {
        Self {
            transitions,
            running,
            reports,
            pending: PendingTransitions::default(),
            waiters: Vec::new(),
            stopping: false,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        tracing::debug!("Transition worker started");
        loop {
            if self.pending.is_empty() {
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(());
                }
                if self.stopping {
                    break;
                }
                match rx.recv().await {
                    Some(msg) => self.accept(msg),
                    None => break,
                }
            }

            // Fold everything that arrived while the last transition ran.
            while let Ok(msg) = rx.try_recv() {
                self.accept(msg);
            }

            if let Some(kind) = self.pending.pop() {
                self.execute(kind).await;
            }
        }
        tracing::debug!("Transition worker stopped");
    }

    fn accept(&mut self, msg: WorkerMessage) {
        match msg {
            WorkerMessage::Signal(kind) if self.stopping => {
                tracing::debug!(transition = %kind, "Ignoring signal after stop");
            }
            WorkerMessage::Signal(kind) => match self.pending.push(kind) {
                Enqueued::Queued => tracing::debug!(transition = %kind, "Transition queued"),
                Enqueued::Duplicate => {
                    tracing::debug!(transition = %kind, "Transition already pending");
                }
                Enqueued::Coalesced => {
                    tracing::debug!(transition = %kind, "Pending opposite transition cancelled");
                }
            },
            WorkerMessage::Flush(reply) => self.waiters.push(reply),
            WorkerMessage::Stop => self.stopping = true,
        }
    }

    async fn execute(&mut self, kind: TransitionKind) {
        self.running.store(true, Ordering::Release);
        let transitions = Arc::clone(&self.transitions);
        let outcome = tokio::task::spawn_blocking(move || transitions.run(kind)).await;
        self.running.store(false, Ordering::Release);

        match outcome {
            Ok(report) => {
                self.reports.send_replace(Some(report));
            }
            Err(err) => {
                tracing::error!(transition = %kind, "Transition task panicked: {err}");
            }
        }
    }
}

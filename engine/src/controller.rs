//! The controller is the one type callers construct.
//!
//! `start()` builds the transition bodies and spawns the worker exactly once.
//! Signals enter through [`SignalAdapter`] (registered with an event source via
//! [`Controller::attach`], or called directly), the governor reads through
//! [`FrequencyClamp`], and [`Controller::shutdown`] unregisters, drains, and
//! stops the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use hotplug_config::ControllerConfig;
use hotplug_types::{Frequency, PowerState, SuspendLevel, UnitId};

use crate::hooks::{HookId, SignalAdapter, SuspendEventSource, SuspendHook};
use crate::platform::{FrequencyGovernor, UnitControl};
use crate::policy::FrequencyClamp;
use crate::transition::{TransitionReport, Transitions};
use crate::worker::{Worker, WorkerMessage};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller is already attached to an event source ({0})")]
    AlreadyAttached(HookId),
    #[error("transition worker has stopped")]
    WorkerStopped,
}

/// Which units the controller manages and where it sits in the suspend order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub always_on: UnitId,
    pub controllable: Vec<UnitId>,
    pub suspend_level: SuspendLevel,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            always_on: UnitId::ALWAYS_ON,
            controllable: vec![UnitId::new(1)],
            suspend_level: SuspendLevel::DISABLE_FB,
        }
    }
}

impl From<&ControllerConfig> for ControllerOptions {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            always_on: config.always_on(),
            controllable: config.controllable(),
            suspend_level: config.suspend_level,
        }
    }
}

struct Attachment {
    source: Arc<dyn SuspendEventSource>,
    id: HookId,
}

pub struct Controller {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    adapter: Arc<SignalAdapter>,
    clamp: FrequencyClamp,
    running: Arc<AtomicBool>,
    reports: watch::Receiver<Option<TransitionReport>>,
    worker: Option<JoinHandle<()>>,
    attachment: Option<Attachment>,
    suspend_level: SuspendLevel,
}

impl Controller {
    /// Build the transitions and spawn the worker on the current Tokio runtime.
    ///
    /// The controller writes the power state held by `clamp`; hand clones of the
    /// same clamp to the governor so its queries observe every transition.
    #[must_use]
    pub fn start(
        options: ControllerOptions,
        clamp: FrequencyClamp,
        units: Arc<dyn UnitControl>,
        governor: Arc<dyn FrequencyGovernor>,
    ) -> Self {
        let mut controllable = options.controllable;
        controllable.sort_unstable();
        controllable.dedup();
        if let Some(pos) = controllable.iter().position(|&u| u == options.always_on) {
            tracing::warn!(
                unit = %options.always_on,
                "Always-on unit listed as controllable; ignoring it"
            );
            controllable.remove(pos);
        }

        tracing::info!(
            always_on = %options.always_on,
            controllable = ?controllable,
            suspend_max_khz = clamp.suspend_max_frequency().khz(),
            "Starting hotplug controller"
        );

        let transitions = Arc::new(Transitions::new(
            clamp.state_cell().clone(),
            units,
            governor,
            options.always_on,
            controllable,
        ));
        let running = Arc::new(AtomicBool::new(false));
        let (report_tx, reports) = watch::channel(None);
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker::new(transitions, Arc::clone(&running), report_tx);
        let handle = tokio::spawn(worker.run(rx));

        Self {
            adapter: Arc::new(SignalAdapter::new(tx.clone())),
            tx,
            clamp,
            running,
            reports,
            worker: Some(handle),
            attachment: None,
            suspend_level: options.suspend_level,
        }
    }

    /// The notification adapter. Safe to call from any thread without blocking.
    #[must_use]
    pub fn hook(&self) -> Arc<SignalAdapter> {
        Arc::clone(&self.adapter)
    }

    /// Shorthand for `hook().on_suspend()`.
    pub fn on_suspend(&self) {
        self.adapter.on_suspend();
    }

    /// Shorthand for `hook().on_resume()`.
    pub fn on_resume(&self) {
        self.adapter.on_resume();
    }

    /// Register the adapter with `source` at the configured level.
    pub fn attach(&mut self, source: Arc<dyn SuspendEventSource>) -> Result<HookId, ControllerError> {
        if let Some(existing) = &self.attachment {
            return Err(ControllerError::AlreadyAttached(existing.id));
        }
        let hook: Arc<dyn SuspendHook> = self.adapter.clone();
        let id = source.register(self.suspend_level, hook);
        tracing::info!(%id, level = %self.suspend_level, "Registered with suspend event source");
        self.attachment = Some(Attachment { source, id });
        Ok(id)
    }

    /// Unregister from the event source, if attached. Returns whether a hook was removed.
    pub fn detach(&mut self) -> bool {
        let Some(attachment) = self.attachment.take() else {
            return false;
        };
        let removed = attachment.source.unregister(attachment.id);
        if removed {
            tracing::info!(id = %attachment.id, "Unregistered from suspend event source");
        }
        removed
    }

    /// Clamp handle for governors.
    #[must_use]
    pub fn clamp(&self) -> &FrequencyClamp {
        &self.clamp
    }

    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.clamp.power_state()
    }

    pub fn set_suspend_max_frequency(&self, limit: Frequency) {
        self.clamp.set_suspend_max_frequency(limit);
    }

    /// Whether a transition body is executing right now.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn last_report(&self) -> Option<TransitionReport> {
        self.reports.borrow().clone()
    }

    /// Receiver that updates after every completed transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<TransitionReport>> {
        self.reports.clone()
    }

    /// Wait until every signal delivered before this call has been handled.
    pub async fn flush(&self) -> Result<(), ControllerError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(WorkerMessage::Flush(reply))
            .map_err(|_| ControllerError::WorkerStopped)?;
        done.await.map_err(|_| ControllerError::WorkerStopped)
    }

    /// Unregister, let queued transitions finish, and stop the worker.
    pub async fn shutdown(mut self) -> Result<(), ControllerError> {
        self.detach();
        if self.tx.send(WorkerMessage::Stop).is_err() {
            return Err(ControllerError::WorkerStopped);
        }
        if let Some(handle) = self.worker.take()
            && let Err(err) = handle.await
        {
            tracing::error!("Transition worker failed: {err}");
            return Err(ControllerError::WorkerStopped);
        }
        tracing::info!(state = %self.power_state(), "Hotplug controller stopped");
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        // Best-effort: never leave a dangling hook behind. Do not block in Drop.
        self.detach();
        let _ = self.tx.send(WorkerMessage::Stop);
    }
}

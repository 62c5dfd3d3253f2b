//! Transition bodies: publish the power state, re-evaluate frequency policy,
//! then toggle the controllable units. Units brought back online are
//! re-evaluated once more after they return.

use std::iter;
use std::sync::Arc;

use thiserror::Error;

use hotplug_types::{PowerState, TransitionKind, UnitError, UnitId};

use crate::platform::{FrequencyGovernor, UnitControl};
use crate::state::PowerStateCell;

/// A per-unit failure inside a transition. Never aborts the transition.
#[derive(Debug, Clone, Error)]
pub enum TransitionError {
    #[error("failed to take {unit} offline: {source}")]
    UnitOfflineFailed {
        unit: UnitId,
        #[source]
        source: Arc<UnitError>,
    },
    #[error("failed to bring {unit} online: {source}")]
    UnitOnlineFailed {
        unit: UnitId,
        #[source]
        source: Arc<UnitError>,
    },
    #[error("could not read online state of {unit}: {source}")]
    StatusUnavailable {
        unit: UnitId,
        #[source]
        source: Arc<UnitError>,
    },
}

impl TransitionError {
    #[must_use]
    pub fn unit(&self) -> UnitId {
        match self {
            Self::UnitOfflineFailed { unit, .. }
            | Self::UnitOnlineFailed { unit, .. }
            | Self::StatusUnavailable { unit, .. } => *unit,
        }
    }
}

/// Outcome of one completed transition.
#[derive(Debug, Clone)]
pub struct TransitionReport {
    kind: TransitionKind,
    reevaluated: Vec<UnitId>,
    changed: Vec<UnitId>,
    unchanged: Vec<UnitId>,
    failures: Vec<TransitionError>,
}

impl TransitionReport {
    fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            reevaluated: Vec::new(),
            changed: Vec::new(),
            unchanged: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    /// Units whose frequency policy was re-evaluated.
    #[must_use]
    pub fn reevaluated(&self) -> &[UnitId] {
        &self.reevaluated
    }

    /// Controllable units that were toggled.
    #[must_use]
    pub fn changed(&self) -> &[UnitId] {
        &self.changed
    }

    /// Controllable units already in the target state.
    #[must_use]
    pub fn unchanged(&self) -> &[UnitId] {
        &self.unchanged
    }

    #[must_use]
    pub fn failures(&self) -> &[TransitionError] {
        &self.failures
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The two transition bodies, built once and re-run on every signal.
pub(crate) struct Transitions {
    state: PowerStateCell,
    units: Arc<dyn UnitControl>,
    governor: Arc<dyn FrequencyGovernor>,
    always_on: UnitId,
    controllable: Vec<UnitId>,
}

impl Transitions {
    pub(crate) fn new(
        state: PowerStateCell,
        units: Arc<dyn UnitControl>,
        governor: Arc<dyn FrequencyGovernor>,
        always_on: UnitId,
        controllable: Vec<UnitId>,
    ) -> Self {
        Self {
            state,
            units,
            governor,
            always_on,
            controllable,
        }
    }

    /// Run a transition to completion. Blocking; call from the worker's pool only.
    pub(crate) fn run(&self, kind: TransitionKind) -> TransitionReport {
        let target = kind.target_state();
        self.state.set(target);
        tracing::info!(transition = %kind, state = %target, "Transition started");

        let mut report = TransitionReport::new(kind);

        // Re-evaluate while every unit is still in its pre-transition state so
        // a unit about to leave runs its last moments under the new clamp.
        let mut online = Vec::with_capacity(self.controllable.len() + 1);
        for unit in iter::once(self.always_on).chain(self.controllable.iter().copied()) {
            match self.units.is_online(unit) {
                Ok(true) => {
                    self.governor.reevaluate(unit);
                    report.reevaluated.push(unit);
                    online.push(unit);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%unit, "Could not read unit state: {err}");
                    report.failures.push(TransitionError::StatusUnavailable {
                        unit,
                        source: Arc::new(err),
                    });
                }
            }
        }

        for &unit in &self.controllable {
            if report.failures.iter().any(|f| f.unit() == unit) {
                continue;
            }
            let is_online = online.contains(&unit);
            match (target, is_online) {
                (PowerState::Suspended, true) => match self.units.take_offline(unit) {
                    Ok(()) => {
                        tracing::info!(%unit, "Unit taken offline");
                        report.changed.push(unit);
                    }
                    Err(err) => {
                        tracing::warn!(%unit, "Failed to take unit offline: {err}");
                        report.failures.push(TransitionError::UnitOfflineFailed {
                            unit,
                            source: Arc::new(err),
                        });
                    }
                },
                (PowerState::Active, false) => match self.units.bring_online(unit) {
                    Ok(()) => {
                        tracing::info!(%unit, "Unit brought online");
                        report.changed.push(unit);
                        // It may still carry the ceiling it was parked with.
                        self.governor.reevaluate(unit);
                        report.reevaluated.push(unit);
                    }
                    Err(err) => {
                        tracing::warn!(%unit, "Failed to bring unit online: {err}");
                        report.failures.push(TransitionError::UnitOnlineFailed {
                            unit,
                            source: Arc::new(err),
                        });
                    }
                },
                _ => {
                    tracing::debug!(%unit, state = %target, "Unit already in target state");
                    report.unchanged.push(unit);
                }
            }
        }

        tracing::info!(
            transition = %kind,
            changed = report.changed.len(),
            failures = report.failures.len(),
            "Transition finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        online: Mutex<BTreeMap<UnitId, bool>>,
        log: Mutex<Vec<String>>,
        refuse: Mutex<Option<UnitId>>,
    }

    impl Recorder {
        fn with_units(units: &[(u32, bool)]) -> Arc<Self> {
            let rec = Self::default();
            *rec.online.lock().unwrap() = units
                .iter()
                .map(|&(id, online)| (UnitId::new(id), online))
                .collect();
            Arc::new(rec)
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn toggle(&self, unit: UnitId, online: bool) -> Result<(), UnitError> {
            if *self.refuse.lock().unwrap() == Some(unit) {
                return Err(UnitError::Rejected {
                    unit,
                    reason: "busy".to_string(),
                });
            }
            let verb = if online { "online" } else { "offline" };
            self.log.lock().unwrap().push(format!("{verb} {unit}"));
            self.online.lock().unwrap().insert(unit, online);
            Ok(())
        }
    }

    impl UnitControl for Recorder {
        fn is_online(&self, unit: UnitId) -> Result<bool, UnitError> {
            self.online
                .lock()
                .unwrap()
                .get(&unit)
                .copied()
                .ok_or(UnitError::NotPresent { unit })
        }

        fn bring_online(&self, unit: UnitId) -> Result<(), UnitError> {
            self.toggle(unit, true)
        }

        fn take_offline(&self, unit: UnitId) -> Result<(), UnitError> {
            self.toggle(unit, false)
        }
    }

    impl FrequencyGovernor for Recorder {
        fn reevaluate(&self, unit: UnitId) {
            self.log.lock().unwrap().push(format!("reevaluate {unit}"));
        }
    }

    fn transitions(rec: &Arc<Recorder>, controllable: &[u32]) -> (Transitions, PowerStateCell) {
        let state = PowerStateCell::default();
        let t = Transitions::new(
            state.clone(),
            rec.clone(),
            rec.clone(),
            UnitId::ALWAYS_ON,
            controllable.iter().copied().map(UnitId::new).collect(),
        );
        (t, state)
    }

    #[test]
    fn suspend_reevaluates_before_offlining() {
        let rec = Recorder::with_units(&[(0, true), (1, true)]);
        let (t, state) = transitions(&rec, &[1]);

        let report = t.run(TransitionKind::Suspend);

        assert_eq!(state.get(), PowerState::Suspended);
        assert_eq!(
            rec.log(),
            vec!["reevaluate cpu0", "reevaluate cpu1", "offline cpu1"]
        );
        assert_eq!(report.changed(), &[UnitId::new(1)]);
        assert!(report.is_clean());
    }

    #[test]
    fn resume_onlines_then_reevaluates_returning_unit() {
        let rec = Recorder::with_units(&[(0, true), (1, false)]);
        let (t, state) = transitions(&rec, &[1]);

        let report = t.run(TransitionKind::Resume);

        assert_eq!(state.get(), PowerState::Active);
        assert_eq!(
            rec.log(),
            vec!["reevaluate cpu0", "online cpu1", "reevaluate cpu1"]
        );
        assert_eq!(report.reevaluated(), &[UnitId::ALWAYS_ON, UnitId::new(1)]);
        assert_eq!(report.changed(), &[UnitId::new(1)]);
    }

    #[test]
    fn repeated_suspend_skips_offline_units() {
        let rec = Recorder::with_units(&[(0, true), (1, true)]);
        let (t, _) = transitions(&rec, &[1]);

        t.run(TransitionKind::Suspend);
        let second = t.run(TransitionKind::Suspend);

        assert!(second.is_clean());
        assert!(second.changed().is_empty());
        assert_eq!(second.unchanged(), &[UnitId::new(1)]);
    }

    #[test]
    fn failure_is_recorded_and_loop_continues() {
        let rec = Recorder::with_units(&[(0, true), (1, true), (2, true)]);
        *rec.refuse.lock().unwrap() = Some(UnitId::new(1));
        let (t, state) = transitions(&rec, &[1, 2]);

        let report = t.run(TransitionKind::Suspend);

        assert_eq!(state.get(), PowerState::Suspended);
        assert_eq!(report.changed(), &[UnitId::new(2)]);
        assert_eq!(report.failures().len(), 1);
        assert!(matches!(
            &report.failures()[0],
            TransitionError::UnitOfflineFailed { unit, .. } if *unit == UnitId::new(1)
        ));
        assert!(rec.is_online(UnitId::new(1)).unwrap());
    }

    #[test]
    fn missing_unit_is_reported_not_toggled() {
        let rec = Recorder::with_units(&[(0, true)]);
        let (t, _) = transitions(&rec, &[1]);

        let report = t.run(TransitionKind::Resume);

        assert!(matches!(
            report.failures(),
            [TransitionError::StatusUnavailable { .. }]
        ));
        assert_eq!(rec.log(), vec!["reevaluate cpu0"]);
    }

    #[test]
    fn failed_online_is_not_reevaluated() {
        let rec = Recorder::with_units(&[(0, true), (1, false)]);
        *rec.refuse.lock().unwrap() = Some(UnitId::new(1));
        let (t, _) = transitions(&rec, &[1]);

        let report = t.run(TransitionKind::Resume);

        assert_eq!(rec.log(), vec!["reevaluate cpu0"]);
        assert_eq!(report.reevaluated(), &[UnitId::ALWAYS_ON]);
        assert!(matches!(
            report.failures(),
            [TransitionError::UnitOnlineFailed { .. }]
        ));
    }
}

//! In-memory platform used by the controller integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use hotplug_engine::{
    Controller, ControllerOptions, Frequency, FrequencyClamp, FrequencyGovernor, FrequencyRange,
    UnitControl, UnitError, UnitId,
};

pub const SUSPEND_MAX_KHZ: u64 = 800_000;

pub fn capability() -> FrequencyRange {
    FrequencyRange::from_khz(200_000, 1_500_000)
}

/// Two-unit board: cpu0 always on, cpu1 controllable, both online at start.
pub struct FakeBoard {
    clamp: FrequencyClamp,
    online: Mutex<BTreeMap<UnitId, bool>>,
    applied: Mutex<HashMap<UnitId, FrequencyRange>>,
    refuse: Mutex<HashSet<UnitId>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    op_threads: Mutex<Vec<ThreadId>>,
    ops: Mutex<Vec<String>>,
}

impl FakeBoard {
    pub fn new(clamp: FrequencyClamp) -> Arc<Self> {
        Arc::new(Self {
            clamp,
            online: Mutex::new(BTreeMap::from([
                (UnitId::new(0), true),
                (UnitId::new(1), true),
            ])),
            applied: Mutex::new(HashMap::new()),
            refuse: Mutex::new(HashSet::new()),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            op_threads: Mutex::new(Vec::new()),
            ops: Mutex::new(Vec::new()),
        })
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn refuse(&self, unit: UnitId) {
        self.refuse.lock().unwrap().insert(unit);
    }

    pub fn online(&self, unit: u32) -> bool {
        self.online.lock().unwrap()[&UnitId::new(unit)]
    }

    /// Range the governor last applied to `unit`.
    pub fn applied(&self, unit: u32) -> Option<FrequencyRange> {
        self.applied.lock().unwrap().get(&UnitId::new(unit)).copied()
    }

    /// What the governor would pick if it queried right now.
    pub fn query(&self) -> FrequencyRange {
        self.clamp.limit(capability())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn op_threads(&self) -> Vec<ThreadId> {
        self.op_threads.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn toggle(&self, unit: UnitId, online: bool) -> Result<(), UnitError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.op_threads.lock().unwrap().push(thread::current().id());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let result = self.apply_toggle(unit, online);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn apply_toggle(&self, unit: UnitId, online: bool) -> Result<(), UnitError> {
        if self.refuse.lock().unwrap().contains(&unit) {
            return Err(UnitError::Rejected {
                unit,
                reason: "busy".to_string(),
            });
        }
        let mut units = self.online.lock().unwrap();
        let current = units
            .get_mut(&unit)
            .ok_or(UnitError::NotPresent { unit })?;
        // Like the kernel: toggling into the current state is an error.
        if *current == online {
            return Err(UnitError::Rejected {
                unit,
                reason: "already in requested state".to_string(),
            });
        }
        *current = online;
        let verb = if online { "online" } else { "offline" };
        self.ops.lock().unwrap().push(format!("{verb} {unit}"));
        Ok(())
    }
}

impl UnitControl for FakeBoard {
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

impl FrequencyGovernor for FakeBoard {
    fn reevaluate(&self, unit: UnitId) {
        let allowed = self.clamp.limit(capability());
        self.applied.lock().unwrap().insert(unit, allowed);
        self.ops.lock().unwrap().push(format!("reevaluate {unit}"));
    }
}

pub fn start() -> (Controller, Arc<FakeBoard>) {
    let clamp = FrequencyClamp::new(Frequency::from_khz(SUSPEND_MAX_KHZ));
    let board = FakeBoard::new(clamp.clone());
    let controller = Controller::start(
        ControllerOptions::default(),
        clamp,
        board.clone(),
        board.clone(),
    );
    (controller, board)
}

//! Platform seams consumed by the transition engine.
//!
//! Both traits are called only from the transition worker's blocking pool,
//! never from a notification callback.

use hotplug_types::{UnitError, UnitId};

/// The core online/offline primitive.
///
/// Implementations may block for a long time (the kernel synchronizes with
/// every other consumer of the unit) and may fail.
pub trait UnitControl: Send + Sync {
    fn is_online(&self, unit: UnitId) -> Result<bool, UnitError>;

    fn bring_online(&self, unit: UnitId) -> Result<(), UnitError>;

    fn take_offline(&self, unit: UnitId) -> Result<(), UnitError>;
}

/// The frequency governor, seen from the engine.
///
/// `reevaluate` asks the governor to re-query the clamp for `unit` and apply
/// the result. Governors report their own failures; the engine treats the
/// request as fire-and-forget.
pub trait FrequencyGovernor: Send + Sync {
    fn reevaluate(&self, unit: UnitId);
}

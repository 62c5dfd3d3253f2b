//! Suspend-aware hotplug engine.
//!
//! Couples two platform facilities: taking secondary units offline/online and
//! clamping the maximum frequency the governor may pick. Suspend and resume
//! notifications arrive on a path that must never block, so the adapters only
//! enqueue; a single worker runs the transitions one at a time, in arrival order.
//!
//! ```text
//! SuspendEventSource ──on_suspend/on_resume──▶ SignalAdapter ──▶ worker (FIFO, coalescing)
//!                                                                   │
//!                          PowerStateCell ◀── set ─────────────────┤
//!                                │                                  ├─▶ FrequencyGovernor::reevaluate
//!   governor ──limit()──▶ FrequencyClamp                            └─▶ UnitControl::{take_offline, bring_online}
//! ```

mod bus;
mod controller;
mod hooks;
mod platform;
mod policy;
mod state;
mod sysfs;
mod transition;
mod worker;

pub use bus::EarlySuspendBus;
pub use controller::{Controller, ControllerError, ControllerOptions};
pub use hooks::{HookId, SignalAdapter, SuspendEventSource, SuspendHook};
pub use platform::{FrequencyGovernor, UnitControl};
pub use policy::FrequencyClamp;
pub use state::PowerStateCell;
pub use sysfs::SysfsPlatform;
pub use transition::{TransitionError, TransitionReport};

pub use hotplug_types::{
    Frequency, FrequencyRange, PowerState, SuspendLevel, TransitionKind, UnitError, UnitId,
    clamp,
};

use std::fmt;

/// Logical index of a processing unit (`cpuN`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct UnitId(u32);

impl UnitId {
    /// The boot unit. Never taken offline.
    pub const ALWAYS_ON: Self = Self(0);

    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Early-suspend registration level. Lower levels suspend first and resume last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SuspendLevel(u32);

impl SuspendLevel {
    pub const BLANK_SCREEN: Self = Self(50);
    pub const STOP_DRAWING: Self = Self(100);
    /// Framebuffer-dependent work is stopped; the hotplug controller sits here.
    pub const DISABLE_FB: Self = Self(150);

    #[must_use]
    pub const fn new(level: u32) -> Self {
        Self(level)
    }
}

impl fmt::Display for SuspendLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

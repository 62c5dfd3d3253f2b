//! Linux sysfs backend for both platform seams.
//!
//! Units map to `<root>/devices/system/cpu/cpuN`. Hotplug goes through the
//! `online` attribute; the governor side writes the clamped ceiling into
//! `cpufreq/scaling_max_freq` based on `cpufreq/cpuinfo_{min,max}_freq`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hotplug_types::{FrequencyRange, UnitError, UnitId};

use crate::platform::{FrequencyGovernor, UnitControl};
use crate::policy::FrequencyClamp;

pub struct SysfsPlatform {
    cpu_root: PathBuf,
    clamp: FrequencyClamp,
}

impl SysfsPlatform {
    /// `sysfs_root` is the sysfs mount point, normally `/sys`.
    #[must_use]
    pub fn new(sysfs_root: &Path, clamp: FrequencyClamp) -> Self {
        Self {
            cpu_root: sysfs_root.join("devices").join("system").join("cpu"),
            clamp,
        }
    }

    fn unit_dir(&self, unit: UnitId) -> PathBuf {
        self.cpu_root.join(format!("cpu{}", unit.value()))
    }

    fn online_attr(&self, unit: UnitId) -> Result<PathBuf, UnitError> {
        let dir = self.unit_dir(unit);
        if !dir.is_dir() {
            return Err(UnitError::NotPresent { unit });
        }
        Ok(dir.join("online"))
    }

    fn write_online(&self, unit: UnitId, online: bool) -> Result<(), UnitError> {
        let path = self.online_attr(unit)?;
        if !path.exists() {
            return Err(UnitError::NotHotpluggable { unit });
        }
        let value = if online { "1" } else { "0" };
        match fs::write(&path, value) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::ResourceBusy => Err(UnitError::Rejected {
                unit,
                reason: "device or resource busy".to_string(),
            }),
            Err(source) => Err(UnitError::Io { path, source }),
        }
    }

    /// Hardware frequency range of `unit`, from its cpufreq attributes.
    pub fn capability(&self, unit: UnitId) -> Result<FrequencyRange, UnitError> {
        let cpufreq = self.unit_dir(unit).join("cpufreq");
        let min = read_khz(&cpufreq.join("cpuinfo_min_freq"))?;
        let max = read_khz(&cpufreq.join("cpuinfo_max_freq"))?;
        Ok(FrequencyRange::from_khz(min, max))
    }

    fn apply_limit(&self, unit: UnitId) -> Result<FrequencyRange, UnitError> {
        let capability = self.capability(unit)?;
        let allowed = self.clamp.limit(capability);
        let path = self
            .unit_dir(unit)
            .join("cpufreq")
            .join("scaling_max_freq");
        fs::write(&path, allowed.max().khz().to_string())
            .map_err(|source| UnitError::Io { path, source })?;
        Ok(allowed)
    }
}

fn read_khz(path: &Path) -> Result<u64, UnitError> {
    let raw = fs::read_to_string(path).map_err(|source| UnitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    raw.trim().parse::<u64>().map_err(|e| UnitError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })
}

impl UnitControl for SysfsPlatform {
    fn is_online(&self, unit: UnitId) -> Result<bool, UnitError> {
        let path = self.online_attr(unit)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(raw.trim() == "1"),
            // Boot CPUs often have no `online` attribute: present means online.
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(source) => Err(UnitError::Io { path, source }),
        }
    }

    fn bring_online(&self, unit: UnitId) -> Result<(), UnitError> {
        self.write_online(unit, true)
    }

    fn take_offline(&self, unit: UnitId) -> Result<(), UnitError> {
        self.write_online(unit, false)
    }
}

impl FrequencyGovernor for SysfsPlatform {
    fn reevaluate(&self, unit: UnitId) {
        match self.apply_limit(unit) {
            Ok(allowed) => tracing::debug!(%unit, %allowed, "Frequency limit applied"),
            Err(err) => tracing::warn!(%unit, "Failed to apply frequency limit: {err}"),
        }
    }
}

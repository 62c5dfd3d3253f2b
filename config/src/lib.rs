//! Configuration loading, parsing, and validation for the hotplug controller.
//!
//! The config lives at `~/.hotplug/config.toml` unless `HOTPLUG_CONFIG` points
//! elsewhere. A missing file is not an error; every field has a default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs, io};
use thiserror::Error;

use hotplug_types::{DEFAULT_SUSPEND_MAX_FREQUENCY, Frequency, SuspendLevel, UnitId};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "HOTPLUG_CONFIG";

/// Environment variable that overrides `controller.suspend_max_freq_khz`.
pub const SUSPEND_MAX_FREQ_ENV: &str = "HOTPLUG_SUSPEND_MAX_FREQ_KHZ";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HotplugConfig {
    pub controller: ControllerConfig,
    pub sysfs: SysfsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Frequency cap applied while suspended, in kHz. Default: 800000.
    pub suspend_max_freq_khz: u64,
    /// Unit that is never taken offline. Default: 0.
    pub always_on_unit: u32,
    /// Units taken offline on suspend and brought back on resume. Default: `[1]`.
    pub controllable_units: Vec<u32>,
    /// Early-suspend level the controller registers at. Default: 150 (disable fb).
    pub suspend_level: SuspendLevel,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            suspend_max_freq_khz: DEFAULT_SUSPEND_MAX_FREQUENCY.khz(),
            always_on_unit: UnitId::ALWAYS_ON.value(),
            controllable_units: vec![1],
            suspend_level: SuspendLevel::DISABLE_FB,
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn suspend_max_frequency(&self) -> Frequency {
        Frequency::from_khz(self.suspend_max_freq_khz)
    }

    #[must_use]
    pub fn always_on(&self) -> UnitId {
        UnitId::new(self.always_on_unit)
    }

    /// Controllable units, sorted and deduplicated.
    #[must_use]
    pub fn controllable(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self
            .controllable_units
            .iter()
            .copied()
            .map(UnitId::new)
            .collect();
        units.sort_unstable();
        units.dedup();
        units
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SysfsConfig {
    /// Mount point of sysfs. Tests and dry runs point this at a scratch tree.
    pub root: PathBuf,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys"),
        }
    }
}

impl HotplugConfig {
    /// Load the config from the default location.
    ///
    /// Returns `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load, parse, apply environment overrides, and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let mut config = match Self::parse(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(SUSPEND_MAX_FREQ_ENV) {
            let khz = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: SUSPEND_MAX_FREQ_ENV,
                reason: format!("{raw:?} is not a frequency in kHz: {e}"),
            })?;
            tracing::debug!(khz, "Suspend frequency cap overridden from environment");
            self.controller.suspend_max_freq_khz = khz;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let controller = &self.controller;
        if controller.suspend_max_freq_khz == 0 {
            return Err(ConfigError::Invalid {
                key: "controller.suspend_max_freq_khz",
                reason: "must be greater than zero".to_string(),
            });
        }
        if controller.controllable_units.is_empty() {
            return Err(ConfigError::Invalid {
                key: "controller.controllable_units",
                reason: "at least one unit must be controllable".to_string(),
            });
        }
        if controller
            .controllable_units
            .contains(&controller.always_on_unit)
        {
            return Err(ConfigError::Invalid {
                key: "controller.controllable_units",
                reason: format!(
                    "cpu{} is the always-on unit and cannot be controlled",
                    controller.always_on_unit
                ),
            });
        }
        Ok(())
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".hotplug").join("config.toml"))
}

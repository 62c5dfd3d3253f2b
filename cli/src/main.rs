//! hotplugd - parks secondary cores and clamps frequency while suspended.
//!
//! # Architecture
//!
//! The daemon wires [`hotplug_engine`] to the host:
//!
//! ```text
//! signals ─▶ EarlySuspendBus ─▶ Controller (worker) ─▶ SysfsPlatform (cpuN/online)
//!                                      │                       ▲
//!                                      └── FrequencyClamp ◀────┘ (scaling_max_freq)
//! ```
//!
//! | Signal          | Action                               |
//! |-----------------|--------------------------------------|
//! | SIGUSR1         | screen off: suspend edge             |
//! | SIGUSR2         | screen on: resume edge               |
//! | SIGHUP          | reload the suspend frequency cap     |
//! | SIGINT, SIGTERM | unregister, drain, exit              |

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    env,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hotplug_config::{HotplugConfig, config_path};
use hotplug_engine::{Controller, EarlySuspendBus, FrequencyClamp, SysfsPlatform};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No writable log location: a daemon may still use stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: next to the config file, ~/.hotplug/logs/hotplugd.log
    if let Some(config_path) = config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("hotplugd.log"));
    }

    // Fallback: ./.hotplug/logs/hotplugd.log
    candidates.push(PathBuf::from(".hotplug").join("logs").join("hotplugd.log"));

    candidates
}

#[derive(Debug, Default, Parser)]
#[command(name = "hotplugd")]
#[command(about = "Park secondary cores and clamp frequency while the screen is off")]
struct Args {
    /// Config file (default: $HOTPLUG_CONFIG or ~/.hotplug/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// sysfs mount point (default: from config, /sys)
    #[arg(long, value_name = "PATH")]
    sysfs_root: Option<PathBuf>,
}

/// Load the config. An explicit `--config` must exist; the default location may not.
fn resolve_config(args: &Args) -> Result<HotplugConfig> {
    let loaded = match &args.config {
        Some(path) => Some(
            HotplugConfig::load_from(path)
                .with_context(|| format!("loading {}", path.display()))?,
        ),
        None => HotplugConfig::load()?,
    };
    let mut config = match loaded {
        Some(config) => config,
        None => {
            let mut config = HotplugConfig::default();
            config.apply_overrides(|key| env::var(key).ok())?;
            config.validate()?;
            config
        }
    };
    if let Some(root) = &args.sysfs_root {
        config.sysfs.root.clone_from(root);
    }
    Ok(config)
}

#[cfg(unix)]
fn warn_if_unprivileged(sysfs_root: &Path) {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 && sysfs_root == Path::new("/sys") {
        tracing::warn!(
            euid,
            "Not running as root; writes to /sys will likely be refused"
        );
    }
}

#[cfg(not(unix))]
fn warn_if_unprivileged(_sysfs_root: &Path) {}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing();

    let config = resolve_config(&args)?;
    warn_if_unprivileged(&config.sysfs.root);

    let clamp = FrequencyClamp::new(config.controller.suspend_max_frequency());
    let platform = Arc::new(SysfsPlatform::new(&config.sysfs.root, clamp.clone()));
    let mut controller = Controller::start(
        (&config.controller).into(),
        clamp,
        platform.clone(),
        platform,
    );

    let bus = Arc::new(EarlySuspendBus::new());
    controller
        .attach(bus.clone())
        .context("registering with the suspend bus")?;

    let result = run_signal_loop(&controller, &bus, &args).await;

    // Leave the board usable: bring units back before exiting.
    bus.resume();
    controller
        .shutdown()
        .await
        .context("stopping hotplug controller")?;
    result
}

#[cfg(unix)]
async fn run_signal_loop(controller: &Controller, bus: &EarlySuspendBus, args: &Args) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut screen_off = signal(SignalKind::user_defined1()).context("installing SIGUSR1")?;
    let mut screen_on = signal(SignalKind::user_defined2()).context("installing SIGUSR2")?;
    let mut reload = signal(SignalKind::hangup()).context("installing SIGHUP")?;
    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM")?;

    tracing::info!("hotplugd ready (SIGUSR1 = suspend, SIGUSR2 = resume, SIGHUP = reload)");

    loop {
        tokio::select! {
            _ = screen_off.recv() => {
                if !bus.suspend() {
                    tracing::debug!("Already suspended");
                }
            }
            _ = screen_on.recv() => {
                if !bus.resume() {
                    tracing::debug!("Already resumed");
                }
            }
            _ = reload.recv() => reload_frequency_cap(controller, args),
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received, shutting down");
                return Ok(());
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                tracing::info!("Interrupted, shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(not(unix))]
async fn run_signal_loop(_controller: &Controller, _bus: &EarlySuspendBus, _args: &Args) -> Result<()> {
    tracing::warn!("Suspend signals are only wired on unix; waiting for Ctrl-C");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    Ok(())
}

#[cfg_attr(not(unix), allow(dead_code))]
fn reload_frequency_cap(controller: &Controller, args: &Args) {
    match resolve_config(args) {
        Ok(config) => {
            controller.set_suspend_max_frequency(config.controller.suspend_max_frequency());
        }
        Err(e) => tracing::warn!("Config reload failed, keeping current settings: {e:#}"),
    }
}

use std::fs;
use std::path::Path;
use std::sync::Arc;

use hotplug_engine::{
    Controller, ControllerOptions, Frequency, FrequencyClamp, PowerState, SysfsPlatform,
};

fn fake_cpu(root: &Path, id: u32, online: Option<&str>) {
    let dir = root.join(format!("devices/system/cpu/cpu{id}"));
    fs::create_dir_all(dir.join("cpufreq")).unwrap();
    if let Some(online) = online {
        fs::write(dir.join("online"), online).unwrap();
    }
    fs::write(dir.join("cpufreq/cpuinfo_min_freq"), "200000\n").unwrap();
    fs::write(dir.join("cpufreq/cpuinfo_max_freq"), "1500000\n").unwrap();
    fs::write(dir.join("cpufreq/scaling_max_freq"), "1500000\n").unwrap();
}

fn read_attr(root: &Path, id: u32, attr: &str) -> String {
    fs::read_to_string(root.join(format!("devices/system/cpu/cpu{id}/{attr}")))
        .unwrap()
        .trim()
        .to_string()
}

fn start(root: &Path) -> Controller {
    let clamp = FrequencyClamp::new(Frequency::from_khz(800_000));
    let platform = Arc::new(SysfsPlatform::new(root, clamp.clone()));
    Controller::start(
        ControllerOptions::default(),
        clamp,
        platform.clone(),
        platform,
    )
}

#[tokio::test]
async fn suspend_and_resume_through_sysfs() {
    let dir = tempfile::tempdir().unwrap();
    fake_cpu(dir.path(), 0, None);
    fake_cpu(dir.path(), 1, Some("1\n"));
    let controller = start(dir.path());

    controller.on_suspend();
    controller.flush().await.unwrap();

    assert_eq!(controller.power_state(), PowerState::Suspended);
    assert_eq!(read_attr(dir.path(), 0, "cpufreq/scaling_max_freq"), "800000");
    assert_eq!(read_attr(dir.path(), 1, "cpufreq/scaling_max_freq"), "800000");
    assert_eq!(read_attr(dir.path(), 1, "online"), "0");
    assert!(controller.last_report().unwrap().is_clean());

    controller.on_resume();
    controller.flush().await.unwrap();

    assert_eq!(controller.power_state(), PowerState::Active);
    assert_eq!(read_attr(dir.path(), 1, "online"), "1");
    assert_eq!(read_attr(dir.path(), 0, "cpufreq/scaling_max_freq"), "1500000");
    assert_eq!(read_attr(dir.path(), 1, "cpufreq/scaling_max_freq"), "1500000");
    assert!(controller.last_report().unwrap().is_clean());

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_secondary_cpu_is_reported_and_boot_cpu_still_clamped() {
    let dir = tempfile::tempdir().unwrap();
    fake_cpu(dir.path(), 0, None);
    let controller = start(dir.path());

    controller.on_suspend();
    controller.flush().await.unwrap();

    assert_eq!(controller.power_state(), PowerState::Suspended);
    assert_eq!(read_attr(dir.path(), 0, "cpufreq/scaling_max_freq"), "800000");
    let report = controller.last_report().unwrap();
    assert_eq!(report.failures().len(), 1);

    controller.shutdown().await.unwrap();
}

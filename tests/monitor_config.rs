use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use motion_monitor::{MonitorConfig, TriggerMode, View};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MOTION_MONITOR_CONFIG",
        "MOTION_MONITOR_SOURCE_URL",
        "MOTION_MONITOR_FPS",
        "MOTION_MONITOR_MONITORING",
        "MOTION_MONITOR_TRIGGER",
        "MOTION_MONITOR_THRESHOLD",
        "MOTION_MONITOR_SNAPSHOT_INTERVAL_SECS",
        "MOTION_MONITOR_RECORD_MIN_SECS",
        "MOTION_MONITOR_ALERT",
        "MOTION_MONITOR_VIEW",
        "MOTION_MONITOR_VIDEO_DIR",
        "MOTION_MONITOR_PHOTO_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": {
            "url": "/srv/frames/porch",
            "target_fps": 12,
            "width": 800,
            "height": 600
        },
        "motion": {
            "history_duration_secs": 1.0,
            "aperture_size": 3
        },
        "controls": {
            "monitoring": true,
            "trigger": "interval_snapshot",
            "sensitivity": 48,
            "snapshot_interval_secs": 10
        },
        "capture": {
            "video_dir": "/var/lib/monitor/video"
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("MOTION_MONITOR_CONFIG", file.path());
    std::env::set_var("MOTION_MONITOR_THRESHOLD", "20");
    std::env::set_var("MOTION_MONITOR_VIEW", "grad_orient");

    let cfg = MonitorConfig::load().expect("load config");
    assert_eq!(cfg.source.url, "/srv/frames/porch");
    assert_eq!(cfg.source.target_fps, 12);
    assert_eq!((cfg.source.width, cfg.source.height), (800, 600));
    assert_eq!(cfg.motion.history_duration, 1.0);
    assert_eq!(cfg.motion.aperture, 3);
    assert_eq!(cfg.motion.min_region_area, 4096);

    assert!(cfg.controls.monitoring);
    assert_eq!(cfg.controls.trigger, TriggerMode::IntervalSnapshot);
    assert_eq!(cfg.controls.sensitivity, 20);
    assert_eq!(cfg.controls.snapshot_interval, Duration::from_secs(10));
    assert_eq!(cfg.controls.record_min_duration, Duration::from_secs(5));
    assert_eq!(cfg.controls.view, View::GradOrient);

    assert_eq!(cfg.capture.video_dir, PathBuf::from("/var/lib/monitor/video"));
    assert_eq!(cfg.capture.photo_dir, PathBuf::from("photo"));
    // Recordings default to the source frame rate.
    assert_eq!(cfg.capture.record_fps, 12);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[source]
url = "stub://yard"

[controls]
trigger = "record"
record_min_duration_secs = 2.5
alert = true

[alert]
duration_secs = 1.5
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = MonitorConfig::load_from(file.path()).expect("load config");
    assert_eq!(cfg.source.url, "stub://yard");
    assert_eq!(cfg.controls.trigger, TriggerMode::ContinuousRecord);
    assert_eq!(cfg.controls.record_min_duration, Duration::from_millis(2500));
    assert!(cfg.controls.alert_enabled);
    assert!(!cfg.controls.monitoring);
    assert_eq!(cfg.alert.duration, Duration::from_millis(1500));
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load defaults");
    assert_eq!(cfg.source.url, "stub://front_camera");
    assert_eq!(cfg.controls.sensitivity, 32);
    assert_eq!(cfg.controls.trigger, TriggerMode::None);
    assert_eq!(cfg.controls.view, View::Input);
    assert_eq!(cfg.motion.aperture, 5);
    assert_eq!(cfg.motion.max_time_delta, 0.25);
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MOTION_MONITOR_THRESHOLD", "300");
    let err = MonitorConfig::load().unwrap_err();
    assert!(err.to_string().contains("MOTION_MONITOR_THRESHOLD"));
    clear_env();
}

#[test]
fn rejects_invalid_motion_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "motion": { "aperture_size": 4 } }"#)
        .expect("write config");
    assert!(MonitorConfig::load_from(file.path()).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "controls": { "trigger": "burst" } }"#)
        .expect("write config");
    assert!(MonitorConfig::load_from(file.path()).is_err());
}

#[test]
fn rejects_durations_too_large_to_represent() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "controls": { "snapshot_interval_secs": 1e30 } }"#)
        .expect("write config");
    let err = MonitorConfig::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains("snapshot_interval_secs"));

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "alert": { "duration_secs": 1e30 } }"#)
        .expect("write config");
    assert!(MonitorConfig::load_from(file.path()).is_err());

    std::env::set_var("MOTION_MONITOR_RECORD_MIN_SECS", "1e30");
    let err = MonitorConfig::load().unwrap_err();
    assert!(err.to_string().contains("MOTION_MONITOR_RECORD_MIN_SECS"));
    clear_env();
}

#[test]
fn record_fps_follows_env_fps_unless_pinned() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{}").expect("write config");
    std::env::set_var("MOTION_MONITOR_FPS", "10");
    let cfg = MonitorConfig::load_from(file.path()).expect("load config");
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.capture.record_fps, 10);

    let mut pinned = NamedTempFile::new().expect("temp config");
    pinned
        .write_all(br#"{ "capture": { "record_fps": 15 } }"#)
        .expect("write config");
    let cfg = MonitorConfig::load_from(pinned.path()).expect("load config");
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.capture.record_fps, 15);
    clear_env();
}

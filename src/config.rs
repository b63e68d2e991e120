use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::controls::{Controls, TriggerMode, View, DEFAULT_CAPTURE_DELAY, DEFAULT_SENSITIVITY};
use crate::detect::MotionSettings;

const DEFAULT_SOURCE_URL: &str = "stub://front_camera";
const DEFAULT_SOURCE_FPS: u32 = 24;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_VIDEO_DIR: &str = "video";
const DEFAULT_PHOTO_DIR: &str = "photo";
const DEFAULT_ALERT_SECS: f64 = 2.0;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    source: Option<SourceConfigFile>,
    motion: Option<MotionConfigFile>,
    controls: Option<ControlsConfigFile>,
    capture: Option<CaptureConfigFile>,
    alert: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    history_duration_secs: Option<f64>,
    min_time_delta_secs: Option<f64>,
    max_time_delta_secs: Option<f64>,
    aperture_size: Option<u32>,
    min_region_area: Option<u64>,
    min_motion_ratio: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ControlsConfigFile {
    monitoring: Option<bool>,
    trigger: Option<TriggerMode>,
    sensitivity: Option<u32>,
    snapshot_interval_secs: Option<f64>,
    record_min_duration_secs: Option<f64>,
    alert: Option<bool>,
    view: Option<View>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    video_dir: Option<PathBuf>,
    photo_dir: Option<PathBuf>,
    record_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    duration_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceSettings,
    pub motion: MotionSettings,
    /// Control values the session starts with.
    pub controls: Controls,
    pub capture: CaptureSettings,
    pub alert: AlertSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            target_fps: DEFAULT_SOURCE_FPS,
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
        }
    }
}

impl SourceSettings {
    /// Tick period at the target frame rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub video_dir: PathBuf,
    pub photo_dir: PathBuf,
    pub record_fps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertSettings {
    /// How long one alert counts as playing.
    pub duration: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        // Defaults are infallible; from_file only fails on bad values.
        let source = SourceSettings::default();
        Self {
            capture: CaptureSettings {
                video_dir: PathBuf::from(DEFAULT_VIDEO_DIR),
                photo_dir: PathBuf::from(DEFAULT_PHOTO_DIR),
                record_fps: source.target_fps,
            },
            source,
            motion: MotionSettings::default(),
            controls: Controls::default(),
            alert: AlertSettings {
                duration: Duration::from_secs_f64(DEFAULT_ALERT_SECS),
            },
        }
    }
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTION_MONITOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::resolve(file_cfg.unwrap_or_default())
    }

    /// Load a specific file, then apply the environment and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::resolve(read_config_file(path)?)
    }

    fn resolve(file: MonitorConfigFile) -> Result<Self> {
        let record_fps = file.capture.as_ref().and_then(|capture| capture.record_fps);
        let mut cfg = Self::from_file(file)?;
        cfg.apply_env()?;
        // Recordings follow the source rate unless pinned, including an env fps override.
        cfg.capture.record_fps = record_fps.unwrap_or(cfg.source.target_fps);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let source = SourceSettings {
            url: file
                .source
                .as_ref()
                .and_then(|source| source.url.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_SOURCE_FPS),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_SOURCE_HEIGHT),
        };

        let defaults = MotionSettings::default();
        let motion = match file.motion {
            Some(motion) => MotionSettings {
                history_duration: motion
                    .history_duration_secs
                    .unwrap_or(defaults.history_duration),
                min_time_delta: motion.min_time_delta_secs.unwrap_or(defaults.min_time_delta),
                max_time_delta: motion.max_time_delta_secs.unwrap_or(defaults.max_time_delta),
                aperture: motion.aperture_size.unwrap_or(defaults.aperture),
                min_region_area: motion.min_region_area.unwrap_or(defaults.min_region_area),
                min_motion_ratio: motion.min_motion_ratio.unwrap_or(defaults.min_motion_ratio),
            },
            None => defaults,
        };

        let controls = match file.controls {
            Some(controls) => Controls {
                monitoring: controls.monitoring.unwrap_or(false),
                trigger: controls.trigger.unwrap_or_default(),
                sensitivity: parse_sensitivity(
                    controls.sensitivity.unwrap_or(DEFAULT_SENSITIVITY as u32),
                    "controls.sensitivity",
                )?,
                snapshot_interval: seconds_or_default(
                    controls.snapshot_interval_secs,
                    "controls.snapshot_interval_secs",
                )?,
                record_min_duration: seconds_or_default(
                    controls.record_min_duration_secs,
                    "controls.record_min_duration_secs",
                )?,
                alert_enabled: controls.alert.unwrap_or(false),
                view: controls.view.unwrap_or_default(),
            },
            None => Controls::default(),
        };

        let capture = CaptureSettings {
            video_dir: file
                .capture
                .as_ref()
                .and_then(|capture| capture.video_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_DIR)),
            photo_dir: file
                .capture
                .as_ref()
                .and_then(|capture| capture.photo_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PHOTO_DIR)),
            record_fps: file
                .capture
                .and_then(|capture| capture.record_fps)
                .unwrap_or(source.target_fps),
        };

        let alert_secs = file
            .alert
            .and_then(|alert| alert.duration_secs)
            .unwrap_or(DEFAULT_ALERT_SECS);
        let alert = AlertSettings {
            duration: checked_seconds(alert_secs, "alert.duration_secs")?,
        };

        Ok(Self {
            source,
            motion,
            controls,
            capture,
            alert,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("MOTION_MONITOR_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("MOTION_MONITOR_FPS") {
            self.source.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_MONITOR_FPS must be a positive integer"))?;
        }
        if let Ok(monitoring) = std::env::var("MOTION_MONITOR_MONITORING") {
            self.controls.monitoring = parse_bool(&monitoring, "MOTION_MONITOR_MONITORING")?;
        }
        if let Ok(trigger) = std::env::var("MOTION_MONITOR_TRIGGER") {
            if !trigger.trim().is_empty() {
                self.controls.trigger = trigger.parse()?;
            }
        }
        if let Ok(threshold) = std::env::var("MOTION_MONITOR_THRESHOLD") {
            let value: u32 = threshold.trim().parse().map_err(|_| {
                anyhow!("MOTION_MONITOR_THRESHOLD must be an integer between 0 and 255")
            })?;
            self.controls.sensitivity = parse_sensitivity(value, "MOTION_MONITOR_THRESHOLD")?;
        }
        if let Ok(interval) = std::env::var("MOTION_MONITOR_SNAPSHOT_INTERVAL_SECS") {
            self.controls.snapshot_interval =
                parse_seconds(&interval, "MOTION_MONITOR_SNAPSHOT_INTERVAL_SECS")?;
        }
        if let Ok(duration) = std::env::var("MOTION_MONITOR_RECORD_MIN_SECS") {
            self.controls.record_min_duration =
                parse_seconds(&duration, "MOTION_MONITOR_RECORD_MIN_SECS")?;
        }
        if let Ok(alert) = std::env::var("MOTION_MONITOR_ALERT") {
            self.controls.alert_enabled = parse_bool(&alert, "MOTION_MONITOR_ALERT")?;
        }
        if let Ok(view) = std::env::var("MOTION_MONITOR_VIEW") {
            if !view.trim().is_empty() {
                self.controls.view = view.parse()?;
            }
        }
        if let Ok(dir) = std::env::var("MOTION_MONITOR_VIDEO_DIR") {
            if !dir.trim().is_empty() {
                self.capture.video_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("MOTION_MONITOR_PHOTO_DIR") {
            if !dir.trim().is_empty() {
                self.capture.photo_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "source size must be non-zero (got {}x{})",
                self.source.width,
                self.source.height
            ));
        }
        if self.capture.record_fps == 0 {
            return Err(anyhow!("capture record_fps must be greater than zero"));
        }
        self.motion.validate()
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_sensitivity(value: u32, name: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{} must be between 0 and 255 (got {})", name, value))
}

fn checked_seconds(value: f64, name: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("{} must be a finite, non-negative number of seconds", name));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("{} is out of range ({} seconds)", name, value))
}

fn seconds_or_default(value: Option<f64>, name: &str) -> Result<Duration> {
    match value {
        Some(seconds) => checked_seconds(seconds, name),
        None => Ok(DEFAULT_CAPTURE_DELAY),
    }
}

fn parse_seconds(value: &str, name: &str) -> Result<Duration> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a number of seconds", name))?;
    checked_seconds(seconds, name)
}

fn parse_bool(value: &str, name: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("{} must be a boolean (got '{}')", name, other)),
    }
}

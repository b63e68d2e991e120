//! monitord - motion-history surveillance daemon
//!
//! This daemon:
//! 1. Acquires frames from the configured source (stub, image sequence, V4L2)
//! 2. Maintains the motion history and segments it into regions every tick
//! 3. Turns accepted motion into recordings, snapshots and alerts
//! 4. Optionally writes the annotated display frame to disk for inspection

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use motion_monitor::{
    CaptureAction, Clock, Frame, MonitorConfig, MonitorError, MonitorSession, MonotonicClock,
    TriggerMode, View,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const DISPLAY_WRITE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Watch a camera, detect motion and capture what moves"
)]
struct Args {
    /// Config file (TOML when the extension is .toml, JSON otherwise).
    #[arg(long, env = "MOTION_MONITOR_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Frame source: stub://name, v4l2:///dev/videoN, or an image directory.
    #[arg(long, value_name = "URL")]
    source: Option<String>,
    /// Start monitoring immediately.
    #[arg(long)]
    monitor: bool,
    /// Capture trigger: none, record or snapshot.
    #[arg(long, value_name = "MODE")]
    trigger: Option<String>,
    /// Display view: input, frame_diff, motion_hist or grad_orient.
    #[arg(long, value_name = "VIEW")]
    view: Option<String>,
    /// Play an alert when motion is detected.
    #[arg(long)]
    alert: bool,
    /// Stop after this many ticks.
    #[arg(long, value_name = "N")]
    max_ticks: Option<u64>,
    /// Write the latest display frame to this JPEG path about once a second.
    #[arg(long, value_name = "PATH")]
    display_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => MonitorConfig::load_from(path)?,
        None => MonitorConfig::load()?,
    };
    apply_args(&mut config, &args)?;
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let mut session = MonitorSession::open(config.clone(), clock)?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let frame_interval = config.source.frame_interval();
    log::info!(
        "monitord running at {} fps (monitoring={}, trigger={:?}, view={})",
        config.source.target_fps,
        config.controls.monitoring,
        config.controls.trigger,
        config.controls.view.name()
    );
    log::info!(
        "videos -> {}, photos -> {}",
        config.capture.video_dir.display(),
        config.capture.photo_dir.display()
    );

    let mut ticks = 0u64;
    let mut motion_ticks = 0u64;
    let mut sink_errors = 0u64;
    let mut last_display: Option<Frame> = None;
    let mut last_health_log = Instant::now();
    let mut last_display_write = Instant::now();

    loop {
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received");
            break;
        }
        if args.max_ticks.is_some_and(|max| ticks >= max) {
            log::info!("reached {} ticks", ticks);
            break;
        }
        let started = Instant::now();

        let report = match session.tick() {
            Ok(report) => report,
            Err(err) => {
                if matches!(
                    err.downcast_ref::<MonitorError>(),
                    Some(MonitorError::Acquisition(_))
                ) {
                    log::error!("{:#}", err);
                    break;
                }
                log::warn!("tick skipped: {:#}", err);
                ticks += 1;
                pace(frame_interval, started);
                continue;
            }
        };
        ticks += 1;
        if report.motion() {
            motion_ticks += 1;
        }
        for action in &report.capture.actions {
            match action {
                CaptureAction::RecordingStarted { location } => {
                    log::info!("recording started: {}", location)
                }
                CaptureAction::RecordingStopped(summary) => log::info!(
                    "recording stopped: {} ({} frames)",
                    summary.location,
                    summary.frames
                ),
                CaptureAction::SnapshotSaved { location } => {
                    log::info!("snapshot saved: {}", location)
                }
                CaptureAction::AlertPlayed => log::debug!("alert played"),
            }
        }
        sink_errors += report.capture.errors.len() as u64;
        last_display = Some(report.display);

        if let (Some(path), Some(display)) = (args.display_out.as_deref(), last_display.as_ref()) {
            if last_display_write.elapsed() >= DISPLAY_WRITE_INTERVAL {
                if let Err(err) = write_display(path, display) {
                    log::warn!("display write failed: {:#}", err);
                }
                last_display_write = Instant::now();
            }
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = session.source_stats();
            let state = session.state();
            log::info!(
                "source health={} frames={} location={} monitoring={} recording={} motion_ticks={} sink_errors={}",
                session.is_source_healthy(),
                stats.frames_captured,
                stats.location,
                state.monitoring,
                state.is_recording(),
                motion_ticks,
                sink_errors
            );
            last_health_log = Instant::now();
        }

        pace(frame_interval, started);
    }

    let closing = session.close();
    for action in &closing.actions {
        if let CaptureAction::RecordingStopped(summary) = action {
            log::info!(
                "recording stopped: {} ({} frames)",
                summary.location,
                summary.frames
            );
        }
    }
    if let (Some(path), Some(display)) = (args.display_out.as_deref(), last_display.as_ref()) {
        write_display(path, display)?;
    }
    log::info!(
        "monitord stopped after {} ticks ({} with motion, {} sink errors)",
        ticks,
        motion_ticks,
        sink_errors + closing.errors.len() as u64
    );
    Ok(())
}

/// Sleep out whatever is left of this tick's frame interval.
fn pace(frame_interval: Duration, started: Instant) {
    if let Some(rest) = remaining(frame_interval, started.elapsed()) {
        std::thread::sleep(rest);
    }
}

fn remaining(frame_interval: Duration, elapsed: Duration) -> Option<Duration> {
    frame_interval
        .checked_sub(elapsed)
        .filter(|rest| !rest.is_zero())
}

fn apply_args(config: &mut MonitorConfig, args: &Args) -> Result<()> {
    if let Some(source) = &args.source {
        config.source.url = source.clone();
    }
    if args.monitor {
        config.controls.monitoring = true;
    }
    if let Some(trigger) = &args.trigger {
        config.controls.trigger = trigger.parse::<TriggerMode>()?;
    }
    if let Some(view) = &args.view {
        config.controls.view = view.parse::<View>()?;
    }
    if args.alert {
        config.controls.alert_enabled = true;
    }
    Ok(())
}

fn write_display(path: &Path, display: &Frame) -> Result<()> {
    display
        .to_rgb_image()?
        .save(path)
        .with_context(|| format!("failed to write display frame {}", path.display()))
}

//! Capture sinks.
//!
//! The orchestrator decides *when* to record, snapshot or alert; these sinks
//! decide *how*. Each concern is a trait so the session can run against the
//! filesystem in production and against shared in-memory sinks in tests.
//!
//! - `recorder`: frame-sequence recordings on disk
//! - `snapshot`: single JPEG stills on disk
//! - `alert`: log-backed alert with a playback window
//! - `memory`: in-memory sinks with failure injection

mod alert;
mod memory;
mod recorder;
mod snapshot;

pub use alert::LogAlert;
pub use memory::{MemoryAlert, MemoryRecorder, MemorySnapshots};
pub use recorder::FilesystemRecorder;
pub use snapshot::FilesystemSnapshots;

use anyhow::Result;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{AlertSettings, CaptureSettings};
use crate::frame::Frame;

/// An open recording. Owned by the orchestrator while the writer is live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingHandle {
    pub id: u64,
    /// Where the recording lands (directory, or a label for in-memory sinks).
    pub location: String,
    pub frame_rate: u32,
    pub frame_size: (u32, u32),
}

/// What a closed recording contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingSummary {
    pub location: String,
    pub frames: u64,
}

pub trait RecordingSink: Send {
    /// Open a new recording. File naming is the sink's policy.
    fn start_recording(&mut self, frame_rate: u32, frame_size: (u32, u32))
        -> Result<RecordingHandle>;

    fn write_frame(&mut self, handle: &RecordingHandle, frame: &Frame) -> Result<()>;

    /// Flush and close. The handle is consumed even when closing fails.
    fn stop_recording(&mut self, handle: RecordingHandle) -> Result<RecordingSummary>;
}

pub trait SnapshotSink: Send {
    /// Persist one still; returns where it was stored.
    fn save_image(&mut self, frame: &Frame) -> Result<String>;
}

pub trait AlertSink: Send {
    fn play_alert(&mut self);

    fn is_playing(&self) -> bool;
}

/// The three side-effect sinks a session drives.
pub struct SinkSet {
    pub recorder: Box<dyn RecordingSink>,
    pub snapshots: Box<dyn SnapshotSink>,
    pub alert: Box<dyn AlertSink>,
}

impl SinkSet {
    pub fn new(
        recorder: impl RecordingSink + 'static,
        snapshots: impl SnapshotSink + 'static,
        alert: impl AlertSink + 'static,
    ) -> Self {
        Self {
            recorder: Box::new(recorder),
            snapshots: Box::new(snapshots),
            alert: Box::new(alert),
        }
    }

    /// Filesystem recorder and snapshots with a log-backed alert.
    pub fn filesystem(
        capture: &CaptureSettings,
        alert: &AlertSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            FilesystemRecorder::new(&capture.video_dir),
            FilesystemSnapshots::new(&capture.photo_dir),
            LogAlert::new(clock, alert.duration),
        )
    }
}

/// Local-time `YYYYmmddHHMMSS` stem for capture file names.
pub(crate) fn timestamp_stem() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// `dir/stem[.ext]`, or `dir/stem_N[.ext]` when that name is taken.
pub(crate) fn unique_path(dir: &Path, stem: &str, extension: Option<&str>) -> PathBuf {
    let name = |suffix: u32| {
        let base = if suffix == 0 {
            stem.to_string()
        } else {
            format!("{}_{}", stem, suffix)
        };
        match extension {
            Some(ext) => dir.join(format!("{}.{}", base, ext)),
            None => dir.join(base),
        }
    };
    let mut suffix = 0;
    let mut candidate = name(suffix);
    while candidate.exists() {
        suffix += 1;
        candidate = name(suffix);
    }
    candidate
}

pub(crate) fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let image = frame.to_rgb_image()?;
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Jpeg)?;
    Ok(bytes.into_inner())
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

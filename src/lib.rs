//! Motion Monitor
//!
//! This crate implements the motion analysis and capture-orchestration engine of a
//! live video-surveillance monitor.
//!
//! # Architecture
//!
//! One fixed-rate tick drives the whole pipeline, strictly in this order:
//!
//! 1. **Acquisition**: a [`FrameSource`] delivers one RGB frame.
//! 2. **Motion history**: the frame is differenced against the previous one and the
//!    changed pixels are stamped into a decaying timestamp map.
//! 3. **Gradient & segmentation**: the map yields a motion-direction field and a set
//!    of independently moving regions, plus the whole-frame region (index 0).
//! 4. **Evaluation**: regions are filtered by size and pixel-level change and get a
//!    dominant direction of travel.
//! 5. **Orchestration**: whole-frame motion drives snapshots, recordings and alerts
//!    with debounce.
//! 6. **Rendering**: an annotated display frame is produced.
//!
//! All mutable state is owned by the [`MonitorSession`] and touched only from the
//! tick, so no locking is needed inside the pipeline.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame type and pixel helpers
//! - `ingest`: frame sources (synthetic, image sequence, V4L2)
//! - `detect`: motion history, gradient, segmentation, region evaluation
//! - `capture`: recording, snapshot and alert sinks
//! - `orchestrator`: the capture state machine
//! - `render`: diagnostic views and overlays
//! - `session`: the per-tick pipeline

pub mod capture;
pub mod clock;
pub mod config;
pub mod controls;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod orchestrator;
pub mod render;
pub mod session;

pub use capture::{
    AlertSink, FilesystemRecorder, FilesystemSnapshots, LogAlert, MemoryAlert, MemoryRecorder,
    MemorySnapshots, RecordingHandle, RecordingSink, RecordingSummary, SinkSet, SnapshotSink,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::MonitorConfig;
pub use controls::{Controls, TriggerMode, View};
pub use detect::{
    DetectionEvent, GradientField, MotionAnalysis, MotionDetector, MotionHistory, MotionMask,
    MotionReport, MotionSettings, Region,
};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceStats};
pub use orchestrator::{
    CaptureAction, CaptureOrchestrator, CaptureReport, Intent, OrchestratorState,
};
pub use session::{MonitorSession, TickReport};

// -------------------- Error Taxonomy --------------------

/// Which capture sink failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    Recording,
    Snapshot,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Recording => write!(f, "recording"),
            SinkKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Errors the monitor distinguishes. Carried inside `anyhow::Error`; callers that
/// need to branch on the kind use `downcast_ref::<MonitorError>()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorError {
    /// The frame source is unavailable or returned no frame.
    Acquisition(String),
    /// A recording or snapshot sink failed to start, write or close.
    SinkWrite { sink: SinkKind, message: String },
    /// An operation was attempted in a state where it cannot apply.
    Precondition(String),
}

impl MonitorError {
    pub fn acquisition(message: impl Into<String>) -> Self {
        MonitorError::Acquisition(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        MonitorError::Precondition(message.into())
    }

    /// Wrap a sink failure, keeping the full `anyhow` context chain in the message.
    pub fn sink(sink: SinkKind, err: &anyhow::Error) -> Self {
        MonitorError::SinkWrite {
            sink,
            message: format!("{:#}", err),
        }
    }
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Acquisition(message) => write!(f, "acquisition failed: {}", message),
            MonitorError::SinkWrite { sink, message } => {
                write!(f, "{} sink failed: {}", sink, message)
            }
            MonitorError::Precondition(message) => {
                write!(f, "precondition violated: {}", message)
            }
        }
    }
}

impl std::error::Error for MonitorError {}

//! Capture Orchestrator.
//!
//! A single state machine decides when motion turns into a recording, a
//! snapshot or an alert. Operator input arrives as `Intent`s through one dispatch
//! function; per-tick work arrives through `record_frame` and `on_tick`. The sinks
//! perform the side effects; the orchestrator only decides when.
//!
//! Sink failures never abort a tick. They are collected in the `CaptureReport`
//! and leave the state as if the action had not started, except that a failed
//! recording write closes the writer so `is_recording` never outlives it.

use anyhow::Result;

use crate::capture::{RecordingHandle, RecordingSummary, SinkSet};
use crate::controls::{Controls, TriggerMode};
use crate::detect::DetectionEvent;
use crate::frame::Frame;
use crate::{MonitorError, SinkKind};

/// Everything the orchestrator mutates. Only its own transitions touch it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrchestratorState {
    pub monitoring: bool,
    pub mode: TriggerMode,
    /// The live writer, if a recording is open.
    pub recording: Option<RecordingHandle>,
    /// Time of the last motion-driven action (record re-arm or snapshot).
    pub last_action: Option<f64>,
}

impl OrchestratorState {
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }
}

/// Operator requests, dispatched through `CaptureOrchestrator::handle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    StartMonitoring,
    StopMonitoring,
    SelectTrigger(TriggerMode),
    TakeSnapshot,
    StartRecording,
    StopRecording,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureAction {
    RecordingStarted { location: String },
    RecordingStopped(RecordingSummary),
    SnapshotSaved { location: String },
    AlertPlayed,
}

/// Side effects performed and sink failures collected during one call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub actions: Vec<CaptureAction>,
    pub errors: Vec<MonitorError>,
}

impl CaptureReport {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.errors.is_empty()
    }

    pub fn merge(&mut self, other: CaptureReport) {
        self.actions.extend(other.actions);
        self.errors.extend(other.errors);
    }

    pub fn snapshots(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| matches!(action, CaptureAction::SnapshotSaved { .. }))
            .count()
    }

    fn fail(&mut self, kind: SinkKind, err: &anyhow::Error) {
        log::warn!("{} sink failed: {:#}", kind, err);
        self.errors.push(MonitorError::sink(kind, err));
    }
}

pub struct CaptureOrchestrator {
    state: OrchestratorState,
    record_fps: u32,
}

impl CaptureOrchestrator {
    /// Idle orchestrator; recordings are opened at `record_fps`.
    pub fn new(record_fps: u32) -> Self {
        Self {
            state: OrchestratorState::default(),
            record_fps,
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    /// Dispatch one operator intent.
    ///
    /// `frame` is the most recent acquired frame, if any. Intents that cannot
    /// apply in the current state fail with `MonitorError::Precondition` and
    /// change nothing.
    pub fn handle(
        &mut self,
        intent: Intent,
        frame: Option<&Frame>,
        sinks: &mut SinkSet,
        now: f64,
    ) -> Result<CaptureReport> {
        let mut report = CaptureReport::default();
        match intent {
            Intent::StartMonitoring => {
                if self.state.monitoring {
                    return Ok(report);
                }
                if frame.is_none() {
                    return Err(
                        MonitorError::precondition("monitoring needs an acquired frame").into(),
                    );
                }
                self.state.monitoring = true;
                if self.state.is_recording() && self.state.mode == TriggerMode::ContinuousRecord {
                    self.state.last_action = Some(now);
                }
                log::info!("monitoring started (trigger {:?})", self.state.mode);
            }
            Intent::StopMonitoring => {
                if !self.state.monitoring {
                    return Ok(report);
                }
                self.close_recording(sinks, &mut report);
                self.state.monitoring = false;
                log::info!("monitoring stopped");
            }
            Intent::SelectTrigger(mode) => {
                let previous = self.state.mode;
                if previous == mode {
                    return Ok(report);
                }
                if mode == TriggerMode::ContinuousRecord {
                    self.state.last_action = Some(now);
                }
                if previous == TriggerMode::ContinuousRecord && self.state.monitoring {
                    self.close_recording(sinks, &mut report);
                }
                self.state.mode = mode;
                log::info!("trigger mode {:?} -> {:?}", previous, mode);
            }
            Intent::TakeSnapshot => {
                let frame = frame.ok_or_else(|| {
                    MonitorError::precondition("no frame acquired to snapshot")
                })?;
                self.snapshot(frame, sinks, &mut report);
            }
            Intent::StartRecording => {
                if self.state.monitoring {
                    return Err(MonitorError::precondition(
                        "manual recording is unavailable while monitoring",
                    )
                    .into());
                }
                if self.state.is_recording() {
                    return Err(MonitorError::precondition("a recording is already open").into());
                }
                let frame = frame
                    .ok_or_else(|| MonitorError::precondition("no frame acquired to record"))?;
                self.open_recording(frame, sinks, &mut report);
            }
            Intent::StopRecording => {
                if !self.state.is_recording() {
                    return Err(MonitorError::precondition("no recording is open").into());
                }
                self.close_recording(sinks, &mut report);
            }
        }
        Ok(report)
    }

    /// Append the raw frame to the open recording, if any.
    pub fn record_frame(&mut self, frame: &Frame, sinks: &mut SinkSet) -> CaptureReport {
        let mut report = CaptureReport::default();
        let Some(handle) = self.state.recording.as_ref() else {
            return report;
        };
        if let Err(err) = sinks.recorder.write_frame(handle, frame) {
            report.fail(SinkKind::Recording, &err);
            self.close_recording(sinks, &mut report);
        }
        report
    }

    /// React to this tick's detections, then apply the record debounce.
    pub fn on_tick(
        &mut self,
        detections: &[DetectionEvent],
        frame: &Frame,
        controls: &Controls,
        sinks: &mut SinkSet,
        now: f64,
    ) -> CaptureReport {
        let mut report = CaptureReport::default();
        if !self.state.monitoring {
            return report;
        }

        if detections.iter().any(|event| event.is_global) {
            match self.state.mode {
                TriggerMode::ContinuousRecord => {
                    self.state.last_action = Some(now);
                    if !self.state.is_recording() {
                        self.open_recording(frame, sinks, &mut report);
                    }
                }
                TriggerMode::IntervalSnapshot => {
                    let interval = controls.snapshot_interval.as_secs_f64();
                    let due = self
                        .state
                        .last_action
                        .is_none_or(|last| now - last >= interval);
                    if due && self.snapshot(frame, sinks, &mut report) {
                        self.state.last_action = Some(now);
                    }
                }
                TriggerMode::None => {}
            }
            if controls.alert_enabled && !sinks.alert.is_playing() {
                sinks.alert.play_alert();
                report.actions.push(CaptureAction::AlertPlayed);
            }
        }

        if self.state.is_recording() && self.state.mode == TriggerMode::ContinuousRecord {
            let quiet = controls.record_min_duration.as_secs_f64();
            if self
                .state
                .last_action
                .is_some_and(|last| now - last >= quiet)
            {
                log::debug!("no motion for {:.1}s, closing recording", quiet);
                self.close_recording(sinks, &mut report);
            }
        }
        report
    }

    fn snapshot(&mut self, frame: &Frame, sinks: &mut SinkSet, report: &mut CaptureReport) -> bool {
        match sinks.snapshots.save_image(frame) {
            Ok(location) => {
                log::info!("snapshot saved to {}", location);
                report.actions.push(CaptureAction::SnapshotSaved { location });
                true
            }
            Err(err) => {
                report.fail(SinkKind::Snapshot, &err);
                false
            }
        }
    }

    fn open_recording(&mut self, frame: &Frame, sinks: &mut SinkSet, report: &mut CaptureReport) {
        match sinks.recorder.start_recording(self.record_fps, frame.dims()) {
            Ok(handle) => {
                log::info!("recording started at {}", handle.location);
                report.actions.push(CaptureAction::RecordingStarted {
                    location: handle.location.clone(),
                });
                self.state.recording = Some(handle);
            }
            Err(err) => report.fail(SinkKind::Recording, &err),
        }
    }

    /// Close the open recording. The handle is dropped even if closing fails.
    fn close_recording(&mut self, sinks: &mut SinkSet, report: &mut CaptureReport) {
        let Some(handle) = self.state.recording.take() else {
            return;
        };
        match sinks.recorder.stop_recording(handle) {
            Ok(summary) => {
                log::info!(
                    "recording stopped at {} ({} frames)",
                    summary.location,
                    summary.frames
                );
                report.actions.push(CaptureAction::RecordingStopped(summary));
            }
            Err(err) => report.fail(SinkKind::Recording, &err),
        }
    }
}

//! Monitoring session: the per-tick pipeline.
//!
//! A `MonitorSession` owns the frame source, the motion detector, the capture
//! orchestrator and the sinks. One call to `tick` runs acquisition, recording,
//! analysis, orchestration and rendering strictly in that order, so all mutable
//! state is touched from a single timeline.

use anyhow::Result;
use std::sync::Arc;

use crate::capture::SinkSet;
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::controls::Controls;
use crate::detect::{DetectionEvent, MotionDetector};
use crate::frame::Frame;
use crate::ingest::{open_source, FrameSource, SourceStats};
use crate::orchestrator::{
    CaptureAction, CaptureOrchestrator, CaptureReport, Intent, OrchestratorState,
};
use crate::render::render;
use crate::MonitorError;

/// What one tick produced.
#[derive(Clone, Debug)]
pub struct TickReport {
    pub now: f64,
    /// Number of regions analysed, including the whole frame. Zero when idle.
    pub regions: usize,
    pub detections: Vec<DetectionEvent>,
    pub capture: CaptureReport,
    /// Annotated frame for the active view, or the raw frame when idle.
    pub display: Frame,
}

impl TickReport {
    pub fn motion(&self) -> bool {
        self.detections.iter().any(|event| event.is_global)
    }
}

pub struct MonitorSession {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    source: Box<dyn FrameSource>,
    source_open: bool,
    sinks: SinkSet,
    orchestrator: CaptureOrchestrator,
    detector: Option<MotionDetector>,
    /// Desired control values; reconciled against the orchestrator each tick.
    controls: Controls,
    frame: Option<Frame>,
    prev_frame: Option<Frame>,
}

impl MonitorSession {
    /// Open the configured source with filesystem sinks.
    pub fn open(config: MonitorConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let source = open_source(&config.source)?;
        let sinks = SinkSet::filesystem(&config.capture, &config.alert, clock.clone());
        Self::with_parts(config, source, sinks, clock)
    }

    /// Build a session from explicit parts and open the source.
    pub fn with_parts(
        config: MonitorConfig,
        mut source: Box<dyn FrameSource>,
        sinks: SinkSet,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        source.open()?;
        log::info!(
            "session opened on {} (record {} fps, trigger {:?}, view {})",
            source.stats().location,
            config.capture.record_fps,
            config.controls.trigger,
            config.controls.view.name()
        );
        Ok(Self {
            controls: config.controls.clone(),
            orchestrator: CaptureOrchestrator::new(config.capture.record_fps),
            config,
            clock,
            source,
            source_open: true,
            sinks,
            detector: None,
            frame: None,
            prev_frame: None,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn state(&self) -> &OrchestratorState {
        self.orchestrator.state()
    }

    /// The most recently acquired frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn source_stats(&self) -> SourceStats {
        self.source.stats()
    }

    pub fn is_source_healthy(&self) -> bool {
        self.source_open && self.source.is_healthy()
    }

    /// Dispatch an operator intent immediately.
    pub fn apply(&mut self, intent: Intent) -> Result<CaptureReport> {
        let now = self.clock.now();
        self.dispatch(intent, now)
    }

    /// Take a new control snapshot. Monitoring and trigger changes are applied
    /// now when possible; monitoring that needs a frame starts on the next tick.
    pub fn sync_controls(&mut self, controls: Controls) -> Result<CaptureReport> {
        if let Some(detector) = self.detector.as_mut() {
            detector.set_threshold(controls.sensitivity);
        }
        self.controls = controls;
        let now = self.clock.now();
        self.reconcile(now)
    }

    /// Run one full pipeline step.
    pub fn tick(&mut self) -> Result<TickReport> {
        let now = self.clock.now();
        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(err) => return Err(self.acquisition_failed(err, now)),
        };
        self.frame = Some(frame.clone());

        let mut capture = self.reconcile(now)?;
        capture.merge(self.orchestrator.record_frame(&frame, &mut self.sinks));

        let monitoring = self.orchestrator.state().monitoring;
        let (detections, regions, display) = match (monitoring, self.detector.as_mut()) {
            (true, Some(detector)) => {
                let prev = self.prev_frame.as_ref().unwrap_or(&frame);
                let report = match detector.process(&frame, prev, now) {
                    Ok(report) => report,
                    Err(err) => return Err(abandoned_tick(err, capture)),
                };
                for event in &report.detections {
                    log::debug!(
                        "region {} at ({}, {}) {}x{} moving {:.0} deg",
                        event.region.index,
                        event.region.x,
                        event.region.y,
                        event.region.width,
                        event.region.height,
                        event.angle
                    );
                }
                capture.merge(self.orchestrator.on_tick(
                    &report.detections,
                    &frame,
                    &self.controls,
                    &mut self.sinks,
                    now,
                ));
                let display = render(
                    &frame,
                    &report.diff,
                    detector.history(),
                    &report.analysis.gradient,
                    &report.detections,
                    self.controls.view,
                    now,
                );
                (report.detections, report.analysis.regions.len(), display)
            }
            _ => (Vec::new(), 0, frame.clone()),
        };

        self.prev_frame = Some(frame);
        Ok(TickReport {
            now,
            regions,
            detections,
            capture,
            display,
        })
    }

    /// Stop monitoring, close any recording and release the source. Idempotent.
    pub fn close(&mut self) -> CaptureReport {
        let now = self.clock.now();
        let mut report = CaptureReport::default();
        for intent in [Intent::StopMonitoring, Intent::StopRecording] {
            let applies = match intent {
                Intent::StopMonitoring => self.orchestrator.state().monitoring,
                _ => self.orchestrator.state().is_recording(),
            };
            if !applies {
                continue;
            }
            match self.dispatch(intent, now) {
                Ok(step) => report.merge(step),
                Err(err) => log::warn!("close: {:#}", err),
            }
        }
        if self.source_open {
            self.source.release();
            self.source_open = false;
            log::info!("session closed");
        }
        report
    }

    fn dispatch(&mut self, intent: Intent, now: f64) -> Result<CaptureReport> {
        let starting = intent == Intent::StartMonitoring && !self.orchestrator.state().monitoring;
        let detector = if starting {
            let frame = self
                .frame
                .as_ref()
                .ok_or_else(|| MonitorError::precondition("monitoring needs an acquired frame"))?;
            Some(MotionDetector::new(
                frame.width(),
                frame.height(),
                self.controls.sensitivity,
                self.config.motion,
            )?)
        } else {
            None
        };

        let report = self
            .orchestrator
            .handle(intent, self.frame.as_ref(), &mut self.sinks, now)?;

        if let Some(detector) = detector {
            self.detector = Some(detector);
            self.prev_frame = self.frame.clone();
        }
        let state = self.orchestrator.state();
        match intent {
            Intent::StartMonitoring | Intent::StopMonitoring => {
                self.controls.monitoring = state.monitoring;
                if !state.monitoring {
                    self.detector = None;
                }
            }
            Intent::SelectTrigger(_) => self.controls.trigger = state.mode,
            _ => {}
        }
        Ok(report)
    }

    /// Bring the orchestrator in line with the desired controls.
    fn reconcile(&mut self, now: f64) -> Result<CaptureReport> {
        let mut report = CaptureReport::default();
        let state = self.orchestrator.state();
        let (monitoring, mode) = (state.monitoring, state.mode);
        let (want_monitoring, want_mode) = (self.controls.monitoring, self.controls.trigger);

        if want_mode != mode {
            report.merge(self.dispatch(Intent::SelectTrigger(want_mode), now)?);
        }
        if want_monitoring && !monitoring {
            if self.frame.is_none() {
                return Ok(report);
            }
            report.merge(self.dispatch(Intent::StartMonitoring, now)?);
        } else if !want_monitoring && monitoring {
            report.merge(self.dispatch(Intent::StopMonitoring, now)?);
        }
        Ok(report)
    }

    fn acquisition_failed(&mut self, err: anyhow::Error, now: f64) -> anyhow::Error {
        log::warn!("frame acquisition failed: {:#}", err);
        if self.orchestrator.state().monitoring {
            if let Err(stop_err) = self.dispatch(Intent::StopMonitoring, now) {
                log::warn!("failed to stop monitoring: {:#}", stop_err);
            }
        }
        self.controls.monitoring = false;
        if err.downcast_ref::<MonitorError>().is_some() {
            err
        } else {
            MonitorError::acquisition(format!("{:#}", err)).into()
        }
    }
}

/// Keep side effects already performed this tick visible when analysis fails.
fn abandoned_tick(err: anyhow::Error, capture: CaptureReport) -> anyhow::Error {
    if capture.is_empty() {
        return err;
    }
    let done: Vec<String> = capture
        .actions
        .iter()
        .map(|action| match action {
            CaptureAction::RecordingStarted { location } => {
                format!("recording started at {}", location)
            }
            CaptureAction::RecordingStopped(summary) => {
                format!("recording stopped at {} ({} frames)", summary.location, summary.frames)
            }
            CaptureAction::SnapshotSaved { location } => {
                format!("snapshot saved to {}", location)
            }
            CaptureAction::AlertPlayed => "alert played".to_string(),
        })
        .chain(capture.errors.iter().map(|sink_err| sink_err.to_string()))
        .collect();
    let summary = done.join("; ");
    log::warn!("analysis failed after capture activity this tick: {}", summary);
    err.context(format!("tick aborted after: {}", summary))
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.close();
    }
}

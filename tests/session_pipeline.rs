use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use motion_monitor::{
    CaptureAction, Controls, Frame, FrameSource, ManualClock, MemoryAlert, MemoryRecorder,
    MemorySnapshots, MonitorConfig, MonitorError, MonitorSession, SinkSet, SourceStats,
    TriggerMode, View,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Plays back a fixed list of frames, then fails like an unplugged camera.
struct ScriptedSource {
    frames: VecDeque<Frame>,
    captured: u64,
    open: bool,
}

impl ScriptedSource {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            captured: 0,
            open: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(MonitorError::acquisition("script not opened").into());
        }
        let frame = self
            .frames
            .pop_front()
            .ok_or_else(|| MonitorError::acquisition("script exhausted"))?;
        self.captured += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_healthy(&self) -> bool {
        self.open && !self.frames.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.captured,
            location: "script://test".to_string(),
        }
    }
}

fn background() -> Frame {
    Frame::filled(WIDTH, HEIGHT, [90, 90, 90])
}

fn with_box() -> Frame {
    let mut frame = background();
    frame.fill_rect(100, 60, 100, 100, [140, 140, 140]);
    frame
}

struct Rig {
    session: MonitorSession,
    clock: Arc<ManualClock>,
    recorder: MemoryRecorder,
    snapshots: MemorySnapshots,
}

fn rig(frames: Vec<Frame>, controls: Controls) -> Result<Rig> {
    let mut config = MonitorConfig::default();
    config.source.width = WIDTH;
    config.source.height = HEIGHT;
    config.controls = controls;

    let clock = Arc::new(ManualClock::new(1.0));
    let recorder = MemoryRecorder::new();
    let snapshots = MemorySnapshots::new();
    let sinks = SinkSet::new(recorder.clone(), snapshots.clone(), MemoryAlert::new());
    let session = MonitorSession::with_parts(
        config,
        Box::new(ScriptedSource::new(frames)),
        sinks,
        clock.clone(),
    )?;
    Ok(Rig {
        session,
        clock,
        recorder,
        snapshots,
    })
}

fn monitoring(trigger: TriggerMode) -> Controls {
    Controls {
        monitoring: true,
        trigger,
        ..Controls::default()
    }
}

#[test]
fn box_entering_the_frame_is_detected_and_outlined() -> Result<()> {
    let mut rig = rig(vec![background(), with_box()], monitoring(TriggerMode::None))?;

    let first = rig.session.tick()?;
    assert!(rig.session.state().monitoring);
    assert!(first.detections.is_empty());

    rig.clock.set(2.0);
    let second = rig.session.tick()?;
    assert!(second.motion());
    assert_eq!(second.regions, 2);
    assert_eq!(second.detections.len(), 2);

    let boxed = second
        .detections
        .iter()
        .find(|event| !event.is_global)
        .expect("segmented box");
    assert_eq!(
        (boxed.region.x, boxed.region.y, boxed.region.width, boxed.region.height),
        (100, 60, 100, 100)
    );
    // Input view with the region outline drawn in green.
    assert_eq!(second.display.pixel(100, 60), [0, 255, 0]);
    Ok(())
}

#[test]
fn static_scene_produces_nothing() -> Result<()> {
    let frames = vec![background(); 6];
    let mut rig = rig(frames, monitoring(TriggerMode::IntervalSnapshot))?;
    for step in 0..6 {
        rig.clock.set(1.0 + step as f64);
        let report = rig.session.tick()?;
        assert!(report.detections.is_empty());
        assert!(report.capture.is_empty());
    }
    assert_eq!(rig.snapshots.count(), 0);
    assert_eq!(rig.recorder.started(), 0);
    Ok(())
}

#[test]
fn continuous_recording_stops_after_quiet_period() -> Result<()> {
    let mut frames = vec![background()];
    frames.extend(std::iter::repeat_with(with_box).take(6));
    let controls = Controls {
        record_min_duration: Duration::from_secs(5),
        ..monitoring(TriggerMode::ContinuousRecord)
    };
    let mut rig = rig(frames, controls)?;

    rig.session.tick()?;
    rig.clock.set(2.0);
    let motion = rig.session.tick()?;
    assert!(matches!(
        motion.capture.actions.as_slice(),
        [CaptureAction::RecordingStarted { .. }]
    ));

    // The box stays put, so nothing new is stamped after t=2.
    for t in 3..7 {
        rig.clock.set(t as f64);
        let report = rig.session.tick()?;
        assert!(!report.motion());
        assert!(rig.session.state().is_recording(), "closed early at t={}", t);
    }

    rig.clock.set(7.0);
    let closing = rig.session.tick()?;
    assert!(matches!(
        closing.capture.actions.as_slice(),
        [CaptureAction::RecordingStopped(_)]
    ));
    assert!(!rig.session.state().is_recording());

    let finished = rig.recorder.finished();
    assert_eq!(finished.len(), 1);
    // Frames from t=3 through t=7 inclusive.
    assert_eq!(finished[0].frames, 5);
    Ok(())
}

#[test]
fn acquisition_failure_stops_monitoring() -> Result<()> {
    let mut rig = rig(vec![background(), background()], monitoring(TriggerMode::None))?;
    rig.session.tick()?;
    rig.session.tick()?;
    assert!(rig.session.state().monitoring);

    let err = rig.session.tick().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MonitorError>(),
        Some(MonitorError::Acquisition(_))
    ));
    assert!(!rig.session.state().monitoring);
    assert!(!rig.session.controls().monitoring);
    Ok(())
}

#[test]
fn view_changes_apply_without_touching_capture_state() -> Result<()> {
    let mut rig = rig(
        vec![background(), with_box(), with_box()],
        monitoring(TriggerMode::None),
    )?;
    rig.session.tick()?;
    rig.clock.set(1.1);
    rig.session.tick()?;

    rig.session.sync_controls(Controls {
        view: View::MotionHist,
        ..rig.session.controls().clone()
    })?;
    rig.clock.set(1.2);
    let report = rig.session.tick()?;
    assert!(rig.session.state().monitoring);
    // Inside the box, away from overlays: stamped 0.1s ago out of a 0.5s window.
    assert_eq!(report.display.pixel(120, 100), [204, 204, 204]);
    // Untouched background stays black.
    assert_eq!(report.display.pixel(300, 20), [0, 0, 0]);
    Ok(())
}

#[test]
fn analysis_failure_reports_capture_work_already_done() -> Result<()> {
    let frames = vec![background(), with_box(), Frame::filled(160, 120, [90, 90, 90])];
    let mut rig = rig(frames, monitoring(TriggerMode::ContinuousRecord))?;
    rig.session.tick()?;
    rig.clock.set(2.0);
    rig.session.tick()?;
    assert!(rig.session.state().is_recording());

    // The undersized frame fails the recorder first, then motion analysis.
    rig.clock.set(3.0);
    let err = rig.session.tick().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MonitorError>(),
        Some(MonitorError::Precondition(_))
    ));
    let message = format!("{:#}", err);
    assert!(message.contains("recording stopped"), "{}", message);
    assert!(!rig.session.state().is_recording());
    assert_eq!(rig.recorder.finished().len(), 1);
    Ok(())
}

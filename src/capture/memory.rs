//! In-memory sinks.
//!
//! Each sink is a cheap clonable handle over shared state: hand one clone to the
//! session and keep another to inspect what happened or to inject failures.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{AlertSink, RecordingHandle, RecordingSink, RecordingSummary, SnapshotSink};
use crate::frame::Frame;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct RecorderState {
    next_id: u64,
    open: Option<(RecordingHandle, u64)>,
    finished: Vec<RecordingSummary>,
    started: usize,
    fail_start: bool,
    fail_write: bool,
    fail_stop: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_start(&self, fail: bool) {
        lock(&self.state).fail_start = fail;
    }

    pub fn set_fail_write(&self, fail: bool) {
        lock(&self.state).fail_write = fail;
    }

    pub fn set_fail_stop(&self, fail: bool) {
        lock(&self.state).fail_stop = fail;
    }

    /// Recordings successfully started so far.
    pub fn started(&self) -> usize {
        lock(&self.state).started
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open.is_some()
    }

    /// Frames written to the open recording, if any.
    pub fn open_frames(&self) -> Option<u64> {
        lock(&self.state).open.as_ref().map(|(_, frames)| *frames)
    }

    /// Summaries of recordings that were closed, in order.
    pub fn finished(&self) -> Vec<RecordingSummary> {
        lock(&self.state).finished.clone()
    }
}

impl RecordingSink for MemoryRecorder {
    fn start_recording(
        &mut self,
        frame_rate: u32,
        frame_size: (u32, u32),
    ) -> Result<RecordingHandle> {
        let mut state = lock(&self.state);
        if state.fail_start {
            return Err(anyhow!("storage unavailable"));
        }
        if state.open.is_some() {
            return Err(anyhow!("a recording is already open"));
        }
        state.next_id += 1;
        let handle = RecordingHandle {
            id: state.next_id,
            location: format!("memory://recording/{}", state.next_id),
            frame_rate,
            frame_size,
        };
        state.open = Some((handle.clone(), 0));
        state.started += 1;
        Ok(handle)
    }

    fn write_frame(&mut self, handle: &RecordingHandle, frame: &Frame) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_write {
            return Err(anyhow!("disk full"));
        }
        match state.open.as_mut() {
            Some((open, frames)) if open.id == handle.id => {
                if frame.dims() != open.frame_size {
                    return Err(anyhow!("frame size does not match the recording"));
                }
                *frames += 1;
                Ok(())
            }
            _ => Err(anyhow!("recording {} is not open", handle.id)),
        }
    }

    fn stop_recording(&mut self, handle: RecordingHandle) -> Result<RecordingSummary> {
        let mut state = lock(&self.state);
        let frames = match state.open.take() {
            Some((open, frames)) if open.id == handle.id => frames,
            other => {
                state.open = other;
                return Err(anyhow!("recording {} is not open", handle.id));
            }
        };
        if state.fail_stop {
            return Err(anyhow!("failed to finalise {}", handle.location));
        }
        let summary = RecordingSummary {
            location: handle.location,
            frames,
        };
        state.finished.push(summary.clone());
        Ok(summary)
    }
}

#[derive(Debug, Default)]
struct SnapshotState {
    saved: Vec<Frame>,
    fail: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MemorySnapshots {
    state: Arc<Mutex<SnapshotState>>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn count(&self) -> usize {
        lock(&self.state).saved.len()
    }

    pub fn saved(&self) -> Vec<Frame> {
        lock(&self.state).saved.clone()
    }
}

impl SnapshotSink for MemorySnapshots {
    fn save_image(&mut self, frame: &Frame) -> Result<String> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(anyhow!("storage unavailable"));
        }
        state.saved.push(frame.clone());
        Ok(format!("memory://snapshot/{}", state.saved.len()))
    }
}

#[derive(Debug, Default)]
struct AlertState {
    plays: usize,
    playing: bool,
}

/// Alert that keeps playing until `finish_playback` is called.
#[derive(Clone, Debug, Default)]
pub struct MemoryAlert {
    state: Arc<Mutex<AlertState>>,
}

impl MemoryAlert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plays(&self) -> usize {
        lock(&self.state).plays
    }

    pub fn finish_playback(&self) {
        lock(&self.state).playing = false;
    }
}

impl AlertSink for MemoryAlert {
    fn play_alert(&mut self) {
        let mut state = lock(&self.state);
        state.plays += 1;
        state.playing = true;
    }

    fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }
}

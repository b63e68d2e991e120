//! Filesystem recording sink.
//!
//! A recording is a directory `<video_dir>/<stamp>/` holding one JPEG per frame
//! and a `recording.json` manifest written when the recording stops.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{encode_jpeg, timestamp_stem, unique_path, write_atomic};
use super::{RecordingHandle, RecordingSink, RecordingSummary};
use crate::frame::Frame;

const MANIFEST_NAME: &str = "recording.json";

#[derive(Debug, Serialize)]
struct RecordingManifest {
    frame_rate: u32,
    width: u32,
    height: u32,
    frames: u64,
    started_at: String,
    stopped_at: String,
}

struct OpenRecording {
    id: u64,
    dir: PathBuf,
    frames: u64,
    started_at: DateTime<Local>,
}

pub struct FilesystemRecorder {
    video_dir: PathBuf,
    open: Option<OpenRecording>,
    next_id: u64,
}

impl FilesystemRecorder {
    pub fn new(video_dir: &Path) -> Self {
        Self {
            video_dir: video_dir.to_path_buf(),
            open: None,
            next_id: 1,
        }
    }

    fn open_for(&mut self, handle: &RecordingHandle) -> Result<&mut OpenRecording> {
        match self.open.as_mut() {
            Some(open) if open.id == handle.id => Ok(open),
            _ => Err(anyhow!("recording {} is not open", handle.id)),
        }
    }
}

impl RecordingSink for FilesystemRecorder {
    fn start_recording(
        &mut self,
        frame_rate: u32,
        frame_size: (u32, u32),
    ) -> Result<RecordingHandle> {
        if let Some(open) = &self.open {
            return Err(anyhow!(
                "recording {} is still open at {}",
                open.id,
                open.dir.display()
            ));
        }
        if frame_rate == 0 || frame_size.0 == 0 || frame_size.1 == 0 {
            return Err(anyhow!(
                "invalid recording format {}x{} @ {} fps",
                frame_size.0,
                frame_size.1,
                frame_rate
            ));
        }
        fs::create_dir_all(&self.video_dir)
            .with_context(|| format!("create video dir {}", self.video_dir.display()))?;
        let dir = unique_path(&self.video_dir, &timestamp_stem(), None);
        fs::create_dir(&dir).with_context(|| format!("create recording {}", dir.display()))?;

        let id = self.next_id;
        self.next_id += 1;
        let handle = RecordingHandle {
            id,
            location: dir.display().to_string(),
            frame_rate,
            frame_size,
        };
        self.open = Some(OpenRecording {
            id,
            dir,
            frames: 0,
            started_at: Local::now(),
        });
        Ok(handle)
    }

    fn write_frame(&mut self, handle: &RecordingHandle, frame: &Frame) -> Result<()> {
        if frame.dims() != handle.frame_size {
            return Err(anyhow!(
                "frame is {}x{} but recording is {}x{}",
                frame.width(),
                frame.height(),
                handle.frame_size.0,
                handle.frame_size.1
            ));
        }
        let bytes = encode_jpeg(frame)?;
        let open = self.open_for(handle)?;
        let path = open.dir.join(format!("frame_{:06}.jpg", open.frames + 1));
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        open.frames += 1;
        Ok(())
    }

    fn stop_recording(&mut self, handle: RecordingHandle) -> Result<RecordingSummary> {
        self.open_for(&handle)?;
        let Some(open) = self.open.take() else {
            return Err(anyhow!("recording {} is not open", handle.id));
        };
        let manifest = RecordingManifest {
            frame_rate: handle.frame_rate,
            width: handle.frame_size.0,
            height: handle.frame_size.1,
            frames: open.frames,
            started_at: open.started_at.to_rfc3339(),
            stopped_at: Local::now().to_rfc3339(),
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&open.dir.join(MANIFEST_NAME), &json)
            .with_context(|| format!("write manifest for {}", open.dir.display()))?;
        Ok(RecordingSummary {
            location: handle.location,
            frames: open.frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_frames_and_manifest() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut recorder = FilesystemRecorder::new(&dir.path().join("video"));
        let handle = recorder.start_recording(24, (8, 8))?;
        let frame = Frame::filled(8, 8, [50, 60, 70]);
        recorder.write_frame(&handle, &frame)?;
        recorder.write_frame(&handle, &frame)?;

        let location = PathBuf::from(&handle.location);
        assert!(location.join("frame_000001.jpg").is_file());
        assert!(location.join("frame_000002.jpg").is_file());

        let summary = recorder.stop_recording(handle)?;
        assert_eq!(summary.frames, 2);
        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(location.join(MANIFEST_NAME))?)?;
        assert_eq!(manifest["frames"], 2);
        assert_eq!(manifest["frame_rate"], 24);
        assert_eq!(manifest["width"], 8);
        Ok(())
    }

    #[test]
    fn only_one_recording_at_a_time() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut recorder = FilesystemRecorder::new(dir.path());
        let handle = recorder.start_recording(24, (8, 8))?;
        let first_location = handle.location.clone();
        assert!(recorder.start_recording(24, (8, 8)).is_err());
        recorder.stop_recording(handle)?;
        let again = recorder.start_recording(24, (8, 8))?;
        assert_eq!(again.id, 2);
        assert_ne!(again.location, first_location);
        Ok(())
    }

    #[test]
    fn rejects_frames_of_the_wrong_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut recorder = FilesystemRecorder::new(dir.path());
        let handle = recorder.start_recording(24, (8, 8))?;
        assert!(recorder
            .write_frame(&handle, &Frame::filled(4, 8, [0, 0, 0]))
            .is_err());
        assert_eq!(recorder.stop_recording(handle)?.frames, 0);
        Ok(())
    }

    #[test]
    fn unwritable_video_dir_fails_to_start() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let mut recorder = FilesystemRecorder::new(&blocker.join("video"));
        assert!(recorder.start_recording(24, (8, 8)).is_err());
        Ok(())
    }
}

//! Image-sequence frame source.
//!
//! Replays JPEG/PNG stills from a local directory in file-name order. The first
//! frame fixes the session size; a still with different dimensions, or running
//! out of stills, is an acquisition error.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;
use crate::MonitorError;

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    dims: Option<(u32, u32)>,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageSequenceSource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
            next: 0,
            dims: None,
            frame_count: 0,
            last_error: None,
        }
    }

    /// Stills not yet delivered.
    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.next)
    }

    fn fail(&mut self, message: String) -> anyhow::Error {
        self.last_error = Some(message.clone());
        MonitorError::acquisition(message).into()
    }
}

fn is_still(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            self.fail(format!("failed to list {}: {}", self.dir.display(), e))
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| self.fail(format!("failed to list {}: {}", self.dir.display(), e)))?
                .path();
            if path.is_file() && is_still(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(self.fail(format!("no JPEG or PNG stills in {}", self.dir.display())));
        }
        files.sort();
        log::info!(
            "ImageSequenceSource: opened {} ({} stills)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.next = 0;
        self.dims = None;
        self.last_error = None;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        let Some(path) = self.files.get(self.next).cloned() else {
            return Err(self.fail(format!("image sequence {} exhausted", self.dir.display())));
        };
        self.next += 1;

        let image = image::open(&path)
            .map_err(|e| self.fail(format!("failed to decode {}: {}", path.display(), e)))?
            .to_rgb8();
        let frame = Frame::from_rgb_image(image)?;

        match self.dims {
            None => self.dims = Some(frame.dims()),
            Some(dims) if dims != frame.dims() => {
                return Err(self.fail(format!(
                    "{} is {}x{} but the sequence is {}x{}",
                    path.display(),
                    frame.width(),
                    frame.height(),
                    dims.0,
                    dims.1
                )));
            }
            Some(_) => {}
        }

        self.frame_count += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.files.clear();
        self.next = 0;
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.remaining() > 0
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.dir.display().to_string(),
        }
    }
}

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{encode_jpeg, timestamp_stem, unique_path, write_atomic, SnapshotSink};
use crate::frame::Frame;

/// Saves stills as `<photo_dir>/<stamp>.jpg`.
pub struct FilesystemSnapshots {
    photo_dir: PathBuf,
}

impl FilesystemSnapshots {
    pub fn new(photo_dir: &Path) -> Self {
        Self {
            photo_dir: photo_dir.to_path_buf(),
        }
    }
}

impl SnapshotSink for FilesystemSnapshots {
    fn save_image(&mut self, frame: &Frame) -> Result<String> {
        fs::create_dir_all(&self.photo_dir)
            .with_context(|| format!("create photo dir {}", self.photo_dir.display()))?;
        let bytes = encode_jpeg(frame)?;
        let path = unique_path(&self.photo_dir, &timestamp_stem(), Some("jpg"));
        write_atomic(&path, &bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path.display().to_string())
    }
}

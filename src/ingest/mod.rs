//! Frame ingestion sources.
//!
//! This module provides the sources that feed the tick:
//! - Synthetic scene (`stub://...`) for tests and dry runs
//! - Image sequences from a local directory
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source delivers RGB `Frame`s of constant dimensions for the lifetime of
//! a session. Acquisition failures surface as `MonitorError::Acquisition`.

#[cfg(any(feature = "ingest-v4l2", test))]
mod normalize;
pub mod sequence;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use sequence::ImageSequenceSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

use anyhow::Result;
use std::path::Path;

use crate::config::SourceSettings;
use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";
const V4L2_SCHEME: &str = "v4l2://";

/// A camera-like producer of RGB frames.
pub trait FrameSource: Send {
    /// Acquire the underlying device or input. Must be called before `read`.
    fn open(&mut self) -> Result<()>;

    /// Deliver the next frame.
    fn read(&mut self) -> Result<Frame>;

    /// Release the device. Safe to call more than once.
    fn release(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    /// URL, device node or directory the frames come from.
    pub location: String,
}

/// Pick a source implementation from the configured URL.
///
/// `stub://` selects the synthetic scene, `v4l2://<device>` a local camera, and
/// anything else is treated as a directory of still images.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let url = settings.url.trim();
    if url.starts_with(STUB_SCHEME) {
        return Ok(Box::new(SyntheticSource::new(settings.clone())));
    }
    if let Some(device) = url.strip_prefix(V4L2_SCHEME) {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Source::new(device, settings.clone())));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            anyhow::bail!("{} requires the ingest-v4l2 feature", device)
        }
    }
    Ok(Box::new(ImageSequenceSource::new(Path::new(url))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_url_selects_synthetic_source() -> Result<()> {
        let settings = SourceSettings {
            url: "stub://porch".to_string(),
            target_fps: 24,
            width: 64,
            height: 48,
        };
        let mut source = open_source(&settings)?;
        source.open()?;
        let frame = source.read()?;
        assert_eq!(frame.dims(), (64, 48));
        assert_eq!(source.stats().location, "stub://porch");
        Ok(())
    }

    #[test]
    fn plain_path_selects_image_sequence() -> Result<()> {
        let settings = SourceSettings {
            url: "/definitely/not/a/real/dir".to_string(),
            ..SourceSettings::default()
        };
        let mut source = open_source(&settings)?;
        assert!(source.open().is_err());
        Ok(())
    }
}

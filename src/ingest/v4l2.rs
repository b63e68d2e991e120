//! Local camera capture over Video4Linux2.
//!
//! Frames come from memory-mapped driver buffers; RGB24, YUYV and NV12 payloads
//! are converted to RGB before they leave the source.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;
use crate::MonitorError;

const MMAP_BUFFERS: u32 = 4;
const MIN_STALL_MS: u32 = 2_000;
/// A stream counts as stalled after this many missed frame periods.
const STALL_PERIODS: u32 = 6;

/// Geometry and encoding the driver agreed to.
#[derive(Clone, Copy, Debug)]
struct Negotiated {
    width: u32,
    height: u32,
    encoding: PixelFormat,
}

#[self_referencing]
struct Capture {
    node: v4l::Device,
    #[borrows(mut node)]
    #[covariant]
    buffers: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Source {
    path: String,
    requested: SourceSettings,
    capture: Option<Capture>,
    negotiated: Negotiated,
    delivered: u64,
    last_delivery: Option<Instant>,
    fault: Option<String>,
}

impl V4l2Source {
    pub fn new(path: &str, requested: SourceSettings) -> Self {
        Self {
            path: path.to_string(),
            negotiated: Negotiated {
                width: requested.width,
                height: requested.height,
                encoding: PixelFormat::Rgb24,
            },
            requested,
            capture: None,
            delivered: 0,
            last_delivery: None,
            fault: None,
        }
    }

    fn stall_after(&self) -> Duration {
        let period_ms = 1_000 / self.requested.target_fps.max(1);
        Duration::from_millis(period_ms.saturating_mul(STALL_PERIODS).max(MIN_STALL_MS) as u64)
    }

    fn fail(&mut self, message: String) -> anyhow::Error {
        self.fault = Some(message.clone());
        MonitorError::acquisition(message).into()
    }
}

fn encoding_for(fourcc: v4l::FourCC) -> Result<PixelFormat> {
    match &fourcc.repr {
        b"RGB3" => Ok(PixelFormat::Rgb24),
        b"YUYV" => Ok(PixelFormat::Yuyv),
        b"NV12" => Ok(PixelFormat::Nv12),
        unknown => Err(anyhow!(
            "camera offers {} frames, expected RGB3, YUYV or NV12",
            String::from_utf8_lossy(unknown)
        )),
    }
}

impl FrameSource for V4l2Source {
    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture as _;

        let node = v4l::Device::with_path(&self.path)
            .with_context(|| format!("cannot open camera {}", self.path))
            .map_err(|err| MonitorError::acquisition(format!("{:#}", err)))?;

        let mut wanted = node.format().context("query camera format")?;
        wanted.width = self.requested.width;
        wanted.height = self.requested.height;
        wanted.fourcc = v4l::FourCC::new(b"RGB3");
        let granted = node.set_format(&wanted).or_else(|err| {
            log::warn!("{} rejected {}x{} RGB3: {}", self.path, wanted.width, wanted.height, err);
            node.format().context("query camera format after rejection")
        })?;

        let rate = v4l::video::capture::Parameters::with_fps(self.requested.target_fps.max(1));
        if let Err(err) = node.set_params(&rate) {
            log::warn!("{} ignored the {} fps request: {}", self.path, self.requested.target_fps, err);
        }

        self.negotiated = Negotiated {
            width: granted.width,
            height: granted.height,
            encoding: encoding_for(granted.fourcc)?,
        };

        let capture = CaptureBuilder {
            node,
            buffers_builder: |node| {
                v4l::prelude::MmapStream::with_buffers(node, Type::VideoCapture, MMAP_BUFFERS)
                    .context("map camera buffers")
            },
        }
        .try_build();
        match capture {
            Ok(capture) => self.capture = Some(capture),
            Err(err) => return Err(self.fail(format!("{:#}", err))),
        }
        self.fault = None;

        log::info!(
            "camera {} streaming {}x{} ({:?})",
            self.path,
            self.negotiated.width,
            self.negotiated.height,
            self.negotiated.encoding
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let Negotiated {
            width,
            height,
            encoding,
        } = self.negotiated;
        let Some(capture) = self.capture.as_mut() else {
            return Err(MonitorError::acquisition(format!("camera {} is closed", self.path)).into());
        };
        let dequeued = capture.with_buffers_mut(|buffers| match buffers.next() {
            Ok((data, meta)) => {
                let filled = match meta.bytesused as usize {
                    0 => data.len(),
                    n => n.min(data.len()),
                };
                normalize_to_rgb(&data[..filled], width, height, encoding)
            }
            Err(err) => Err(anyhow!("dequeue failed: {}", err)),
        });
        let rgb = match dequeued {
            Ok(rgb) => rgb,
            Err(err) => return Err(self.fail(format!("camera {}: {:#}", self.path, err))),
        };

        self.delivered += 1;
        self.last_delivery = Some(Instant::now());
        Frame::new(width, height, rgb)
    }

    fn release(&mut self) {
        if self.capture.take().is_some() {
            log::info!("camera {} closed after {} frames", self.path, self.delivered);
        }
    }

    fn is_healthy(&self) -> bool {
        if self.capture.is_none() || self.fault.is_some() {
            return false;
        }
        self.last_delivery
            .is_none_or(|at| at.elapsed() <= self.stall_after())
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.delivered,
            location: self.path.clone(),
        }
    }
}

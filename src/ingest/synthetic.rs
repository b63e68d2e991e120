//! Synthetic frame source (`stub://`).
//!
//! Renders a static checkerboard with low sensor noise and, once per cycle, a
//! bright box crossing the scene from left to right. The noise amplitude stays
//! well under the default sensitivity so a quiet scene yields no motion.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;
use crate::MonitorError;

const NOISE_SEED: u64 = 0x6d6f_7469_6f6e;
const NOISE_AMPLITUDE: i16 = 4;
const CHECKER_CELL: u32 = 40;
const BOX_COLOUR: [u8; 3] = [240, 240, 240];
/// Frames per crossing cycle; the box is visible for the first half.
const CYCLE_FRAMES: u64 = 240;
const BOX_STEP: u32 = 8;

pub struct SyntheticSource {
    settings: SourceSettings,
    rng: StdRng,
    frame_count: u64,
    open: bool,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            rng: StdRng::seed_from_u64(NOISE_SEED),
            frame_count: 0,
            open: false,
        }
    }

    fn box_side(&self) -> u32 {
        (self.settings.width.min(self.settings.height) / 5).max(1)
    }

    /// Left edge of the crossing box for the current frame, if it is on screen.
    fn box_x(&self) -> Option<u32> {
        let phase = self.frame_count % CYCLE_FRAMES;
        if phase >= CYCLE_FRAMES / 2 {
            return None;
        }
        let x = phase as u32 * BOX_STEP;
        (x < self.settings.width).then_some(x)
    }

    fn render(&mut self) -> Result<Frame> {
        let (width, height) = (self.settings.width, self.settings.height);
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let base: i16 = if ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0 {
                    60
                } else {
                    90
                };
                let noise = self.rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
                let v = (base + noise).clamp(0, 255) as u8;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let mut frame = Frame::new(width, height, data)?;
        if let Some(x) = self.box_x() {
            let side = self.box_side();
            let y = height.saturating_sub(side) / 2;
            frame.fill_rect(x, y, side, side, BOX_COLOUR);
        }
        Ok(frame)
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.settings.url,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(MonitorError::acquisition(format!(
                "{} is not open",
                self.settings.url
            ))
            .into());
        }
        let frame = self.render()?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        if self.open {
            log::info!("SyntheticSource: released {}", self.settings.url);
        }
        self.open = false;
    }

    fn is_healthy(&self) -> bool {
        self.open
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.settings.url.clone(),
        }
    }
}

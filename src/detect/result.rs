/// Index reserved for the synthetic whole-frame region.
pub const GLOBAL_REGION_INDEX: usize = 0;

/// Bounding box of a motion region, in pixels.
///
/// Regions other than index 0 are rediscovered every tick and carry no identity
/// across ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// The whole-frame region.
    pub fn global(width: u32, height: u32) -> Self {
        Self {
            index: GLOBAL_REGION_INDEX,
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_global(&self) -> bool {
        self.index == GLOBAL_REGION_INDEX
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Row-major index ranges covered by the region, clipped to the frame.
    pub(crate) fn rows(
        &self,
        frame_width: u32,
        frame_height: u32,
    ) -> impl Iterator<Item = std::ops::Range<usize>> {
        let stride = frame_width as usize;
        let x0 = self.x.min(frame_width) as usize;
        let x1 = self.x.saturating_add(self.width).min(frame_width) as usize;
        let y0 = self.y.min(frame_height);
        let y1 = self.y.saturating_add(self.height).min(frame_height);
        (y0..y1).map(move |y| {
            let start = y as usize * stride;
            start + x0..start + x1
        })
    }
}

/// Result of evaluating one region for one tick. Consumed immediately.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionEvent {
    pub region: Region,
    /// Dominant direction of travel in degrees, `[0, 360)`, image coordinates (y down).
    pub angle: f64,
    pub is_global: bool,
}

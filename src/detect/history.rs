//! Motion History Tracker.
//!
//! Differences consecutive frames, thresholds the intensity change into a binary
//! silhouette and stamps changed pixels with the current time. Cells are never
//! rewritten when they go stale; freshness is a read-time comparison against `now`.

use anyhow::Result;

use crate::frame::Frame;
use crate::MonitorError;

use super::result::Region;

/// Binary per-pixel change mask for one tick (1 = changed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionMask {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl MotionMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![0; width as usize * height as usize],
        }
    }

    /// Threshold a luma buffer: 1 where the value is strictly above `threshold`.
    pub fn from_luma(width: u32, height: u32, luma: &[u8], threshold: u8) -> Self {
        Self {
            width,
            height,
            bits: luma.iter().map(|&v| u8::from(v > threshold)).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[y as usize * self.width as usize + x as usize] != 0
    }

    pub fn count(&self) -> u64 {
        self.bits.iter().map(|&b| b as u64).sum()
    }

    /// L1 norm of the mask restricted to `region`.
    pub fn l1_norm_in(&self, region: &Region) -> u64 {
        region
            .rows(self.width, self.height)
            .map(|row| self.bits[row].iter().map(|&b| b as u64).sum::<u64>())
            .sum()
    }
}

/// Per-pixel timestamp of the most recent detected change. Zero means "never".
#[derive(Clone, Debug, PartialEq)]
pub struct MotionHistory {
    width: u32,
    height: u32,
    duration: f64,
    stamps: Vec<f64>,
}

impl MotionHistory {
    pub fn zeroed(width: u32, height: u32, duration: f64) -> Self {
        Self {
            width,
            height,
            duration,
            stamps: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Freshness window in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn stamps(&self) -> &[f64] {
        &self.stamps
    }

    pub fn stamp_at(&self, x: u32, y: u32) -> f64 {
        self.stamps[self.index(x, y)]
    }

    /// Mark one pixel as changed at `now`.
    pub fn stamp(&mut self, x: u32, y: u32, now: f64) {
        let idx = self.index(x, y);
        self.stamps[idx] = now;
    }

    pub fn is_fresh(&self, x: u32, y: u32, now: f64) -> bool {
        self.is_fresh_index(self.index(x, y), now)
    }

    pub(crate) fn is_fresh_index(&self, idx: usize, now: f64) -> bool {
        let stamp = self.stamps[idx];
        stamp > 0.0 && now - stamp <= self.duration
    }

    /// Timestamp as seen by consumers: stale cells read as zero.
    pub(crate) fn effective(&self, idx: usize, now: f64) -> f64 {
        if self.is_fresh_index(idx, now) {
            self.stamps[idx]
        } else {
            0.0
        }
    }

    /// Stale-as-zero copy of the whole map.
    pub(crate) fn effective_map(&self, now: f64) -> Vec<f64> {
        (0..self.stamps.len())
            .map(|idx| self.effective(idx, now))
            .collect()
    }

    /// Recency in `[0, 1]`: 1 for a pixel stamped at `now`, 0 once `duration` old.
    pub fn recency(&self, idx: usize, now: f64) -> f64 {
        ((self.stamps[idx] - (now - self.duration)) / self.duration).clamp(0.0, 1.0)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Output of one tracker update.
#[derive(Clone, Debug)]
pub struct MotionUpdate {
    /// Per-channel absolute difference between the frame and its predecessor.
    pub diff: Frame,
    pub mask: MotionMask,
}

pub struct MotionHistoryTracker {
    threshold: u8,
    history: MotionHistory,
}

impl MotionHistoryTracker {
    /// A tracker with an all-zero history sized for `width` x `height` frames.
    pub fn new(width: u32, height: u32, threshold: u8, history_duration: f64) -> Self {
        Self {
            threshold,
            history: MotionHistory::zeroed(width, height, history_duration),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.threshold = threshold;
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }

    /// Difference `frame` against `prev`, threshold, and stamp changed pixels.
    ///
    /// A dimension mismatch between the frames or against the history map is a
    /// precondition violation and leaves the history untouched.
    pub fn update(&mut self, frame: &Frame, prev: &Frame, now: f64) -> Result<MotionUpdate> {
        if frame.dims() != (self.history.width, self.history.height) {
            return Err(MonitorError::precondition(format!(
                "frame is {}x{} but motion history is {}x{}",
                frame.width(),
                frame.height(),
                self.history.width,
                self.history.height
            ))
            .into());
        }
        let diff = frame.abs_diff(prev)?;
        let mask = MotionMask::from_luma(
            frame.width(),
            frame.height(),
            &diff.to_luma(),
            self.threshold,
        );
        for (stamp, &bit) in self.history.stamps.iter_mut().zip(mask.bits.iter()) {
            if bit != 0 {
                *stamp = now;
            }
        }
        Ok(MotionUpdate { diff, mask })
    }
}

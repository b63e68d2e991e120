//! Motion analysis.
//!
//! - `history`: frame differencing and the decaying motion history map
//! - `gradient`: motion-direction field
//! - `segment`: independent motion regions
//! - `evaluate`: region filtering and dominant angle
//!
//! `MotionDetector` strings the stages together for one tick.

mod evaluate;
mod gradient;
mod history;
mod result;
mod segment;

pub use evaluate::{global_orientation, RegionEvaluator};
pub use gradient::{motion_gradient, GradientField, GradientParams};
pub use history::{MotionHistory, MotionHistoryTracker, MotionMask, MotionUpdate};
pub use result::{DetectionEvent, Region, GLOBAL_REGION_INDEX};
pub use segment::segment_motion;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub const DEFAULT_HISTORY_DURATION: f64 = 0.5;
pub const DEFAULT_MIN_TIME_DELTA: f64 = 0.05;
pub const DEFAULT_MAX_TIME_DELTA: f64 = 0.25;
pub const DEFAULT_APERTURE: u32 = 5;

/// Static analysis parameters, fixed for a monitoring session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSettings {
    /// Seconds a changed pixel stays fresh.
    pub history_duration: f64,
    pub min_time_delta: f64,
    /// Also the recency tolerance used when growing segments.
    pub max_time_delta: f64,
    pub aperture: u32,
    pub min_region_area: u64,
    pub min_motion_ratio: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            history_duration: DEFAULT_HISTORY_DURATION,
            min_time_delta: DEFAULT_MIN_TIME_DELTA,
            max_time_delta: DEFAULT_MAX_TIME_DELTA,
            aperture: DEFAULT_APERTURE,
            min_region_area: evaluate::DEFAULT_MIN_REGION_AREA,
            min_motion_ratio: evaluate::DEFAULT_MIN_MOTION_RATIO,
        }
    }
}

impl MotionSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.history_duration.is_finite() && self.history_duration > 0.0) {
            return Err(anyhow!("history duration must be a positive number of seconds"));
        }
        if !(self.min_time_delta > 0.0 && self.min_time_delta < self.max_time_delta) {
            return Err(anyhow!(
                "time deltas must satisfy 0 < min ({}) < max ({})",
                self.min_time_delta,
                self.max_time_delta
            ));
        }
        if !self.max_time_delta.is_finite() {
            return Err(anyhow!("max time delta must be finite"));
        }
        if ![3, 5, 7].contains(&self.aperture) {
            return Err(anyhow!(
                "aperture size must be 3, 5 or 7 (got {})",
                self.aperture
            ));
        }
        if !(0.0..=1.0).contains(&self.min_motion_ratio) {
            return Err(anyhow!("min motion ratio must be within [0, 1]"));
        }
        Ok(())
    }

    pub fn gradient_params(&self) -> GradientParams {
        GradientParams {
            aperture: self.aperture,
            min_delta: self.min_time_delta,
            max_delta: self.max_time_delta,
        }
    }

    pub fn evaluator(&self) -> RegionEvaluator {
        RegionEvaluator {
            min_area: self.min_region_area,
            min_motion_ratio: self.min_motion_ratio,
        }
    }
}

/// Gradient field plus the region list; index 0 is always the whole frame.
#[derive(Clone, Debug)]
pub struct MotionAnalysis {
    pub gradient: GradientField,
    pub regions: Vec<Region>,
}

/// Derive the gradient field and the motion regions from a history map.
pub fn analyze(history: &MotionHistory, now: f64, settings: &MotionSettings) -> MotionAnalysis {
    let gradient = motion_gradient(history, now, settings.gradient_params());
    let mut regions = vec![Region::global(history.width(), history.height())];
    regions.extend(segment_motion(history, now, settings.max_time_delta));
    MotionAnalysis { gradient, regions }
}

/// Everything one tick of analysis produced.
#[derive(Clone, Debug)]
pub struct MotionReport {
    pub diff: Frame,
    pub mask: MotionMask,
    pub analysis: MotionAnalysis,
    /// Surviving regions, in region order.
    pub detections: Vec<DetectionEvent>,
}

impl MotionReport {
    pub fn global_detection(&self) -> Option<&DetectionEvent> {
        self.detections.iter().find(|event| event.is_global)
    }
}

/// Per-session motion pipeline: history tracker, analysis and evaluation.
pub struct MotionDetector {
    settings: MotionSettings,
    tracker: MotionHistoryTracker,
    evaluator: RegionEvaluator,
}

impl MotionDetector {
    /// A detector with a zeroed history map for `width` x `height` frames.
    pub fn new(width: u32, height: u32, threshold: u8, settings: MotionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            tracker: MotionHistoryTracker::new(width, height, threshold, settings.history_duration),
            evaluator: settings.evaluator(),
            settings,
        })
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    pub fn history(&self) -> &MotionHistory {
        self.tracker.history()
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.tracker.set_threshold(threshold);
    }

    /// Run one tick: update the history, analyse it and evaluate every region.
    pub fn process(&mut self, frame: &Frame, prev: &Frame, now: f64) -> Result<MotionReport> {
        let MotionUpdate { diff, mask } = self.tracker.update(frame, prev, now)?;
        let history = self.tracker.history();
        let analysis = analyze(history, now, &self.settings);
        let detections = analysis
            .regions
            .iter()
            .filter_map(|region| {
                self.evaluator
                    .evaluate(region, &mask, &analysis.gradient, history, now)
            })
            .collect();
        Ok(MotionReport {
            diff,
            mask,
            analysis,
            detections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn background() -> Frame {
        Frame::filled(320, 240, [90, 90, 90])
    }

    #[test]
    fn identical_frames_yield_no_detections() -> Result<()> {
        let mut detector = MotionDetector::new(320, 240, 32, MotionSettings::default())?;
        let frame = background();
        for step in 1..5 {
            let report = detector.process(&frame, &frame, step as f64)?;
            assert!(report.detections.is_empty());
            assert_eq!(report.analysis.regions.len(), 1);
            assert!(report.analysis.regions[0].is_global());
        }
        Ok(())
    }

    #[test]
    fn uniform_box_change_is_accepted() -> Result<()> {
        let mut detector = MotionDetector::new(320, 240, 32, MotionSettings::default())?;
        let prev = background();
        let mut frame = background();
        frame.fill_rect(100, 60, 100, 100, [140, 140, 140]);

        let report = detector.process(&frame, &prev, 10.0)?;
        assert_eq!(report.mask.count(), 10_000);

        let boxed = report
            .analysis
            .regions
            .iter()
            .find(|r| !r.is_global())
            .expect("segmented box");
        assert_eq!((boxed.x, boxed.y, boxed.width, boxed.height), (100, 60, 100, 100));

        assert_eq!(report.detections.len(), 2);
        assert!(report.global_detection().is_some());
        Ok(())
    }

    #[test]
    fn small_change_is_segmented_but_filtered() -> Result<()> {
        let mut detector = MotionDetector::new(320, 240, 32, MotionSettings::default())?;
        let prev = background();
        let mut frame = background();
        frame.fill_rect(10, 10, 40, 40, [200, 200, 200]);

        let report = detector.process(&frame, &prev, 10.0)?;
        assert_eq!(report.analysis.regions.len(), 2);
        assert!(report.detections.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_invalid_settings() {
        let bad_aperture = MotionSettings {
            aperture: 4,
            ..MotionSettings::default()
        };
        assert!(MotionDetector::new(10, 10, 32, bad_aperture).is_err());

        let inverted = MotionSettings {
            min_time_delta: 0.3,
            max_time_delta: 0.1,
            ..MotionSettings::default()
        };
        assert!(inverted.validate().is_err());
    }
}

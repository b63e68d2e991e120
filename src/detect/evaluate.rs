//! Region Evaluator: size and silhouette filtering plus dominant-angle estimation.

use super::gradient::{wrap_degrees, GradientField};
use super::history::{MotionHistory, MotionMask};
use super::result::{DetectionEvent, Region};

pub const DEFAULT_MIN_REGION_AREA: u64 = 64 * 64;
pub const DEFAULT_MIN_MOTION_RATIO: f64 = 0.05;

const ORIENTATION_BINS: usize = 12;
const BIN_WIDTH_DEG: f64 = 360.0 / ORIENTATION_BINS as f64;
const REFINE_WINDOW_DEG: f64 = 45.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionEvaluator {
    pub min_area: u64,
    /// Minimum changed-pixel count as a fraction of the region area.
    pub min_motion_ratio: f64,
}

impl Default for RegionEvaluator {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_REGION_AREA,
            min_motion_ratio: DEFAULT_MIN_MOTION_RATIO,
        }
    }
}

impl RegionEvaluator {
    /// Evaluate one region for the current tick.
    ///
    /// Rejects, in order: regions smaller than `min_area`, then regions whose
    /// silhouette L1 norm is below `min_motion_ratio * area`. Survivors get a
    /// dominant motion angle.
    pub fn evaluate(
        &self,
        region: &Region,
        mask: &MotionMask,
        gradient: &GradientField,
        history: &MotionHistory,
        now: f64,
    ) -> Option<DetectionEvent> {
        let area = region.area();
        if area < self.min_area {
            return None;
        }
        let silhouette = mask.l1_norm_in(region) as f64;
        if silhouette < area as f64 * self.min_motion_ratio {
            return None;
        }
        Some(DetectionEvent {
            region: *region,
            angle: global_orientation(region, gradient, history, now),
            is_global: region.is_global(),
        })
    }
}

/// Dominant direction of the valid gradient inside `region`.
///
/// The coarse direction is the fullest 30-degree histogram bin; it is refined by the
/// recency-weighted mean offset of orientations within 45 degrees of it. Returns 0
/// when the region holds no valid gradient.
pub fn global_orientation(
    region: &Region,
    gradient: &GradientField,
    history: &MotionHistory,
    now: f64,
) -> f64 {
    let (width, height) = (gradient.width(), gradient.height());
    let orientations = gradient.orientations();
    let validity = gradient.validity();

    let mut histogram = [0u64; ORIENTATION_BINS];
    let mut newest = f64::NEG_INFINITY;
    for row in region.rows(width, height) {
        for idx in row {
            if validity[idx] == 0 {
                continue;
            }
            let bin = ((orientations[idx] as f64 / BIN_WIDTH_DEG) as usize).min(ORIENTATION_BINS - 1);
            histogram[bin] += 1;
            newest = newest.max(history.effective(idx, now));
        }
    }

    let mut best_bin = 0;
    for (bin, &count) in histogram.iter().enumerate() {
        if count > histogram[best_bin] {
            best_bin = bin;
        }
    }
    if histogram[best_bin] == 0 {
        return 0.0;
    }
    let base = best_bin as f64 * BIN_WIDTH_DEG;

    let slope = (254.0 / 255.0) / history.duration();
    let mut shift = 0.0;
    let mut total_weight = 0.0;
    for row in region.rows(width, height) {
        for idx in row {
            if validity[idx] == 0 {
                continue;
            }
            let mut offset = orientations[idx] as f64 - base;
            if offset < -180.0 {
                offset += 360.0;
            }
            if offset > 180.0 {
                offset -= 360.0;
            }
            if offset.abs() >= REFINE_WINDOW_DEG {
                continue;
            }
            let weight = 1.0 - (newest - history.effective(idx, now)) * slope;
            if weight <= 0.0 {
                continue;
            }
            shift += weight * offset;
            total_weight += weight;
        }
    }

    if total_weight > f64::EPSILON && shift.abs() > f64::EPSILON {
        wrap_degrees(base + shift / total_weight)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::super::gradient::{motion_gradient, GradientParams};
    use super::*;

    const PARAMS: GradientParams = GradientParams {
        aperture: 5,
        min_delta: 0.05,
        max_delta: 0.25,
    };

    fn full_mask(width: u32, height: u32) -> MotionMask {
        MotionMask::from_luma(width, height, &vec![255u8; (width * height) as usize], 0)
    }

    fn ramp_history(width: u32, height: u32, now: f64, leftward: bool) -> MotionHistory {
        let mut history = MotionHistory::zeroed(width, height, 0.5);
        for y in 0..height {
            for x in 20..50u32 {
                let age = if leftward { x - 20 } else { 49 - x };
                history.stamp(x, y, now - age as f64 * 0.015);
            }
        }
        history
    }

    #[test]
    fn rejects_regions_below_minimum_area() {
        let evaluator = RegionEvaluator::default();
        let history = MotionHistory::zeroed(100, 100, 0.5);
        let gradient = motion_gradient(&history, 1.0, PARAMS);
        let mask = full_mask(100, 100);
        let small = Region {
            index: 1,
            x: 0,
            y: 0,
            width: 63,
            height: 64,
        };
        assert!(evaluator
            .evaluate(&small, &mask, &gradient, &history, 1.0)
            .is_none());
        let exact = Region { width: 64, ..small };
        assert!(evaluator
            .evaluate(&exact, &mask, &gradient, &history, 1.0)
            .is_some());
    }

    #[test]
    fn rejects_regions_with_too_little_silhouette() {
        let evaluator = RegionEvaluator::default();
        let history = MotionHistory::zeroed(100, 100, 0.5);
        let gradient = motion_gradient(&history, 1.0, PARAMS);
        // 499 changed pixels in a 100x100 region: one short of 5%.
        let mut luma = vec![0u8; 100 * 100];
        luma.iter_mut().take(499).for_each(|v| *v = 255);
        let mask = MotionMask::from_luma(100, 100, &luma, 10);
        let region = Region::global(100, 100);
        assert!(evaluator
            .evaluate(&region, &mask, &gradient, &history, 1.0)
            .is_none());

        luma[499] = 255;
        let mask = MotionMask::from_luma(100, 100, &luma, 10);
        let event = evaluator
            .evaluate(&region, &mask, &gradient, &history, 1.0)
            .expect("500 changed pixels is exactly 5%");
        assert!(event.is_global);
        assert_eq!(event.angle, 0.0);
    }

    #[test]
    fn rightward_motion_reports_zero_degrees() {
        let history = ramp_history(80, 70, 10.0, false);
        let gradient = motion_gradient(&history, 10.0, PARAMS);
        let region = Region {
            index: 1,
            x: 0,
            y: 0,
            width: 80,
            height: 70,
        };
        let angle = global_orientation(&region, &gradient, &history, 10.0);
        assert!(angle.min(360.0 - angle) < 1.0, "angle {}", angle);
    }

    #[test]
    fn leftward_motion_reports_one_eighty_degrees() {
        let history = ramp_history(80, 70, 10.0, true);
        let gradient = motion_gradient(&history, 10.0, PARAMS);
        let event = RegionEvaluator::default()
            .evaluate(
                &Region::global(80, 70),
                &full_mask(80, 70),
                &gradient,
                &history,
                10.0,
            )
            .expect("region passes filters");
        assert!((event.angle - 180.0).abs() < 1.0, "angle {}", event.angle);
    }

    #[test]
    fn angle_is_always_in_range() {
        for leftward in [false, true] {
            let history = ramp_history(80, 70, 10.0, leftward);
            let gradient = motion_gradient(&history, 10.0, PARAMS);
            let angle = global_orientation(&Region::global(80, 70), &gradient, &history, 10.0);
            assert!((0.0..360.0).contains(&angle));
        }
    }
}

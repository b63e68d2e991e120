//! Motion-direction field derived from the spatial gradient of the history map.

use super::history::MotionHistory;

const GRADIENT_EPSILON: f64 = 1e-6;

/// Per-pixel orientation (degrees) and validity of the motion gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientField {
    width: u32,
    height: u32,
    orientation: Vec<f32>,
    valid: Vec<u8>,
}

impl GradientField {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Orientations in degrees, `[0, 360)`; zero where invalid.
    pub fn orientations(&self) -> &[f32] {
        &self.orientation
    }

    /// Validity mask, 1 where the orientation is meaningful.
    pub fn validity(&self) -> &[u8] {
        &self.valid
    }

    pub fn orientation_at(&self, x: u32, y: u32) -> f32 {
        self.orientation[self.index(x, y)]
    }

    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.valid[self.index(x, y)] != 0
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v != 0).count()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientParams {
    /// Sobel aperture and neighbourhood size; one of 3, 5, 7.
    pub aperture: u32,
    pub min_delta: f64,
    pub max_delta: f64,
}

/// Compute the motion gradient of `history` as seen at `now`.
///
/// A pixel is valid when the gradient is non-negligible and the timestamp spread
/// over its aperture neighbourhood lies within `[min_delta, max_delta]`.
pub fn motion_gradient(history: &MotionHistory, now: f64, params: GradientParams) -> GradientField {
    let width = history.width() as usize;
    let height = history.height() as usize;
    let src = history.effective_map(now);
    let (smooth, deriv) = sobel_kernels(params.aperture);
    let radius = smooth.len() / 2;

    let dx = separable(&src, width, height, deriv, smooth);
    let dy = separable(&src, width, height, smooth, deriv);
    let lo = window_extreme(&src, width, height, radius, f64::min);
    let hi = window_extreme(&src, width, height, radius, f64::max);

    let mut orientation = vec![0.0f32; src.len()];
    let mut valid = vec![0u8; src.len()];
    for idx in 0..src.len() {
        if dx[idx].abs() < GRADIENT_EPSILON && dy[idx].abs() < GRADIENT_EPSILON {
            continue;
        }
        let spread = hi[idx] - lo[idx];
        if spread < params.min_delta || spread > params.max_delta {
            continue;
        }
        let degrees = wrap_degrees(dy[idx].atan2(dx[idx]).to_degrees()) as f32;
        // Narrowing can round 359.99.. up to 360.
        orientation[idx] = if degrees >= 360.0 { 0.0 } else { degrees };
        valid[idx] = 1;
    }

    GradientField {
        width: history.width(),
        height: history.height(),
        orientation,
        valid,
    }
}

pub(crate) fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

const SMOOTH_3: [f64; 3] = [1.0, 2.0, 1.0];
const DERIV_3: [f64; 3] = [-1.0, 0.0, 1.0];
const SMOOTH_5: [f64; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
const DERIV_5: [f64; 5] = [-1.0, -2.0, 0.0, 2.0, 1.0];
const SMOOTH_7: [f64; 7] = [1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0];
const DERIV_7: [f64; 7] = [-1.0, -4.0, -5.0, 0.0, 5.0, 4.0, 1.0];

fn sobel_kernels(aperture: u32) -> (&'static [f64], &'static [f64]) {
    match aperture {
        3 => (&SMOOTH_3[..], &DERIV_3[..]),
        7 => (&SMOOTH_7[..], &DERIV_7[..]),
        // 5 is the default; other sizes are rejected by MotionSettings::validate.
        _ => (&SMOOTH_5[..], &DERIV_5[..]),
    }
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Correlate with `horizontal` along rows then `vertical` along columns, replicating borders.
fn separable(
    src: &[f64],
    width: usize,
    height: usize,
    horizontal: &[f64],
    vertical: &[f64],
) -> Vec<f64> {
    let hr = (horizontal.len() / 2) as isize;
    let vr = (vertical.len() / 2) as isize;
    let mut tmp = vec![0.0; src.len()];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            tmp[y * width + x] = horizontal
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[clamp_index(x as isize + k as isize - hr, width)])
                .sum();
        }
    }
    let mut out = vec![0.0; src.len()];
    for y in 0..height {
        for x in 0..width {
            out[y * width + x] = vertical
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    w * tmp[clamp_index(y as isize + k as isize - vr, height) * width + x]
                })
                .sum();
        }
    }
    out
}

/// Min or max over a square window of side `2 * radius + 1`, replicating borders.
fn window_extreme(
    src: &[f64],
    width: usize,
    height: usize,
    radius: usize,
    pick: fn(f64, f64) -> f64,
) -> Vec<f64> {
    let r = radius as isize;
    let mut tmp = vec![0.0; src.len()];
    for y in 0..height {
        for x in 0..width {
            tmp[y * width + x] = (-r..=r)
                .map(|d| src[y * width + clamp_index(x as isize + d, width)])
                .fold(src[y * width + x], pick);
        }
    }
    let mut out = vec![0.0; src.len()];
    for y in 0..height {
        for x in 0..width {
            out[y * width + x] = (-r..=r)
                .map(|d| tmp[clamp_index(y as isize + d, height) * width + x])
                .fold(tmp[y * width + x], pick);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: GradientParams = GradientParams {
        aperture: 5,
        min_delta: 0.05,
        max_delta: 0.25,
    };

    /// History whose stamps grow by `step` per column inside `[x0, x1)`.
    fn horizontal_ramp(width: u32, height: u32, x0: u32, x1: u32, now: f64, step: f64) -> MotionHistory {
        let mut history = MotionHistory::zeroed(width, height, 0.5);
        for y in 0..height {
            for x in x0..x1 {
                history.stamp(x, y, now - (x1 - 1 - x) as f64 * step);
            }
        }
        history
    }

    #[test]
    fn empty_history_has_no_valid_gradient() {
        let history = MotionHistory::zeroed(20, 20, 0.5);
        let field = motion_gradient(&history, 10.0, PARAMS);
        assert_eq!(field.valid_count(), 0);
    }

    #[test]
    fn uniform_recent_blob_is_invalid_inside() {
        let mut history = MotionHistory::zeroed(30, 30, 0.5);
        for y in 5..25 {
            for x in 5..25 {
                history.stamp(x, y, 10.0);
            }
        }
        let field = motion_gradient(&history, 10.0, PARAMS);
        // Flat interior has no gradient; the border jumps from 0 to 10 s, far above max_delta.
        assert_eq!(field.valid_count(), 0);
    }

    #[test]
    fn rightward_ramp_points_at_zero_degrees() {
        let history = horizontal_ramp(60, 20, 10, 40, 10.0, 0.015);
        let field = motion_gradient(&history, 10.0, PARAMS);
        assert!(field.valid_count() > 0);
        assert!(field.is_valid(25, 10));
        let angle = field.orientation_at(25, 10);
        assert!(angle.min(360.0 - angle) < 1e-3, "angle {}", angle);
    }

    #[test]
    fn downward_ramp_points_at_ninety_degrees() {
        let mut history = MotionHistory::zeroed(20, 60, 0.5);
        for y in 10..40u32 {
            for x in 0..20 {
                history.stamp(x, y, 10.0 - (39 - y) as f64 * 0.015);
            }
        }
        let field = motion_gradient(&history, 10.0, PARAMS);
        assert!(field.is_valid(10, 25));
        assert!((field.orientation_at(10, 25) - 90.0).abs() < 1e-3);
    }

    #[test]
    fn too_shallow_ramp_is_filtered_as_noise() {
        // 4 columns * 0.005 s = 0.02 s spread, under min_delta.
        let history = horizontal_ramp(60, 20, 10, 40, 10.0, 0.005);
        let field = motion_gradient(&history, 10.0, PARAMS);
        assert!(!field.is_valid(25, 10));
    }

    #[test]
    fn wrap_degrees_stays_in_range() {
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }
}

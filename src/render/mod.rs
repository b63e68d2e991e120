//! Visualization Renderer.
//!
//! Builds the display frame for one tick: one of four diagnostic views, with
//! every surviving region outlined and marked with its direction of travel,
//! plus a label naming the view. Pure: the same inputs always give the same frame.

mod draw;
mod font;

pub use draw::{draw_circle, draw_line, draw_rect};
pub use font::draw_text;

use crate::controls::View;
use crate::detect::{DetectionEvent, GradientField, MotionHistory};
use crate::frame::Frame;

const REGION_COLOUR: [u8; 3] = [0, 255, 0];
const GLOBAL_INDICATOR: [u8; 3] = [255, 0, 0];
const REGION_INDICATOR: [u8; 3] = [0, 0, 255];
const INDICATOR_THICKNESS: u32 = 3;
const LABEL_ORIGIN: (i64, i64) = (20, 12);
const LABEL_SCALE: u32 = 2;

/// Compose the display frame for `view` and overlay `detections`.
pub fn render(
    frame: &Frame,
    diff: &Frame,
    history: &MotionHistory,
    gradient: &GradientField,
    detections: &[DetectionEvent],
    view: View,
    now: f64,
) -> Frame {
    let mut out = match view {
        View::Input => frame.clone(),
        View::FrameDiff => diff.clone(),
        View::MotionHist => recency_map(history, now),
        View::GradOrient => orientation_map(gradient),
    };
    for event in detections {
        overlay(&mut out, event);
    }
    label(&mut out, view.name());
    out
}

/// Gray heat map: 255 for pixels changed at `now`, fading to 0 over the history window.
fn recency_map(history: &MotionHistory, now: f64) -> Frame {
    let luma: Vec<u8> = (0..history.stamps().len())
        .map(|idx| {
            if history.is_fresh_index(idx, now) {
                (history.recency(idx, now) * 255.0).round() as u8
            } else {
                0
            }
        })
        .collect();
    gray_frame(history.width(), history.height(), &luma)
}

/// HSV encoding: hue follows the orientation, value is the validity mask.
fn orientation_map(gradient: &GradientField) -> Frame {
    let mut out = Frame::filled(gradient.width(), gradient.height(), [0, 0, 0]);
    for y in 0..gradient.height() {
        for x in 0..gradient.width() {
            if gradient.is_valid(x, y) {
                let hue = (gradient.orientation_at(x, y) / 2.0).floor() * 2.0;
                out.put_pixel(x as i64, y as i64, hue_to_rgb(hue as f64));
            }
        }
    }
    out
}

fn gray_frame(width: u32, height: u32, luma: &[u8]) -> Frame {
    match Frame::from_luma(width, height, luma) {
        Ok(frame) => frame,
        Err(_) => Frame::filled(width, height, [0, 0, 0]),
    }
}

/// Fully saturated, full value colour for a hue in degrees.
fn hue_to_rgb(hue: f64) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = 1.0 - ((h % 2.0) - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let to_u8 = |v: f64| (v * 255.0).round() as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

fn overlay(out: &mut Frame, event: &DetectionEvent) {
    let region = &event.region;
    draw_rect(out, region, REGION_COLOUR, 1);

    let colour = if event.is_global {
        GLOBAL_INDICATOR
    } else {
        REGION_INDICATOR
    };
    let (cx, cy) = region.center();
    let (cx, cy) = (cx as i64, cy as i64);
    let radius = (region.width.min(region.height) / 2) as i64;
    draw_circle(out, (cx, cy), radius, colour, INDICATOR_THICKNESS);

    let theta = event.angle.to_radians();
    let tip = (
        cx + (theta.cos() * radius as f64).round() as i64,
        cy + (theta.sin() * radius as f64).round() as i64,
    );
    draw_line(out, (cx, cy), tip, colour, INDICATOR_THICKNESS);
}

fn label(out: &mut Frame, text: &str) {
    let (x, y) = LABEL_ORIGIN;
    draw_text(out, x + 1, y + 1, text, [0, 0, 0], LABEL_SCALE);
    draw_text(out, x, y, text, [255, 255, 255], LABEL_SCALE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{motion_gradient, GradientParams, Region};

    const PARAMS: GradientParams = GradientParams {
        aperture: 5,
        min_delta: 0.05,
        max_delta: 0.25,
    };

    fn scene() -> (Frame, Frame, MotionHistory) {
        let frame = Frame::filled(120, 90, [40, 80, 120]);
        let diff = Frame::filled(120, 90, [3, 3, 3]);
        let mut history = MotionHistory::zeroed(120, 90, 0.5);
        for y in 50..80 {
            for x in 60..100u32 {
                history.stamp(x, y, 10.0 - (99 - x) as f64 * 0.015);
            }
        }
        (frame, diff, history)
    }

    #[test]
    fn rendering_is_idempotent_for_every_view() {
        let (frame, diff, history) = scene();
        let gradient = motion_gradient(&history, 10.0, PARAMS);
        let events = [DetectionEvent {
            region: Region {
                index: 1,
                x: 60,
                y: 50,
                width: 40,
                height: 30,
            },
            angle: 30.0,
            is_global: false,
        }];
        for view in View::ALL {
            let a = render(&frame, &diff, &history, &gradient, &events, view, 10.0);
            let b = render(&frame, &diff, &history, &gradient, &events, view, 10.0);
            assert_eq!(a, b, "{}", view.name());
        }
    }

    #[test]
    fn views_select_their_source() {
        let (frame, diff, history) = scene();
        let gradient = motion_gradient(&history, 10.0, PARAMS);
        let input = render(&frame, &diff, &history, &gradient, &[], View::Input, 10.0);
        assert_eq!(input.pixel(110, 80), [40, 80, 120]);

        let frame_diff = render(&frame, &diff, &history, &gradient, &[], View::FrameDiff, 10.0);
        assert_eq!(frame_diff.pixel(110, 80), [3, 3, 3]);

        let hist = render(&frame, &diff, &history, &gradient, &[], View::MotionHist, 10.0);
        assert_eq!(hist.pixel(99, 60), [255, 255, 255]);
        assert_eq!(hist.pixel(5, 80), [0, 0, 0]);

        let orient = render(&frame, &diff, &history, &gradient, &[], View::GradOrient, 10.0);
        assert_eq!(orient.pixel(5, 80), [0, 0, 0]);
        // Rightward motion: hue 0, pure red.
        assert_eq!(orient.pixel(80, 65), [255, 0, 0]);
    }

    #[test]
    fn label_is_drawn_in_white() {
        let (frame, diff, history) = scene();
        let gradient = motion_gradient(&history, 10.0, PARAMS);
        let out = render(&frame, &diff, &history, &gradient, &[], View::Input, 10.0);
        // Top-left pixel of the 'i' dot, scaled by 2.
        assert_eq!(out.pixel(24, 12), [255, 255, 255]);
    }

    #[test]
    fn detections_are_outlined() {
        let (frame, diff, history) = scene();
        let gradient = motion_gradient(&history, 10.0, PARAMS);
        let global = DetectionEvent {
            region: Region::global(120, 90),
            angle: 0.0,
            is_global: true,
        };
        let out = render(&frame, &diff, &history, &gradient, &[global], View::Input, 10.0);
        assert_eq!(out.pixel(0, 89), REGION_COLOUR);
        // Indicator line runs right from the centre.
        assert_eq!(out.pixel(75, 45), GLOBAL_INDICATOR);
    }

    #[test]
    fn hue_wheel_primaries() {
        assert_eq!(hue_to_rgb(0.0), [255, 0, 0]);
        assert_eq!(hue_to_rgb(120.0), [0, 255, 0]);
        assert_eq!(hue_to_rgb(240.0), [0, 0, 255]);
    }
}

//! Clipped raster primitives on RGB frames.

use crate::detect::Region;
use crate::frame::Frame;

/// Outline `region` with a border `thickness` pixels wide, drawn inwards.
pub fn draw_rect(frame: &mut Frame, region: &Region, color: [u8; 3], thickness: u32) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let x0 = region.x as i64;
    let y0 = region.y as i64;
    let x1 = x0 + region.width as i64 - 1;
    let y1 = y0 + region.height as i64 - 1;
    for t in 0..thickness as i64 {
        let (xx0, yy0, xx1, yy1) = (x0 + t, y0 + t, x1 - t, y1 - t);
        if xx0 > xx1 || yy0 > yy1 {
            break;
        }
        for x in xx0..=xx1 {
            frame.put_pixel(x, yy0, color);
            frame.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            frame.put_pixel(xx0, y, color);
            frame.put_pixel(xx1, y, color);
        }
    }
}

/// Bresenham line stamped with a square brush of side `thickness`.
pub fn draw_line(frame: &mut Frame, from: (i64, i64), to: (i64, i64), color: [u8; 3], thickness: u32) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        stamp(frame, x, y, color, thickness);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Midpoint circle outline stamped with a square brush of side `thickness`.
pub fn draw_circle(frame: &mut Frame, center: (i64, i64), radius: i64, color: [u8; 3], thickness: u32) {
    let (cx, cy) = center;
    if radius <= 0 {
        stamp(frame, cx, cy, color, thickness);
        return;
    }
    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;
    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            stamp(frame, cx + px, cy + py, color, thickness);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

fn stamp(frame: &mut Frame, x: i64, y: i64, color: [u8; 3], thickness: u32) {
    let side = thickness.max(1) as i64;
    let offset = (side - 1) / 2;
    for dy in 0..side {
        for dx in 0..side {
            frame.put_pixel(x - offset + dx, y - offset + dy, color);
        }
    }
}

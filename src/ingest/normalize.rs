//! Conversion of camera payload encodings to packed RGB.

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
    Nv12,
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = plane_len(width, height)?
                .checked_mul(3)
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
            check_len("RGB", pixels.len(), expected)?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
    }
}

fn plane_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn check_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            name,
            expected,
            actual
        ));
    }
    Ok(())
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frames need an even width (got {})", width));
    }
    let count = plane_len(width, height)?;
    check_len("YUYV", pixels.len(), count * 2)?;

    let mut rgb = Vec::with_capacity(count * 3);
    for pair in pixels.chunks_exact(4) {
        let (u, v) = (pair[1], pair[3]);
        rgb.extend_from_slice(&yuv_to_rgb(pair[0], u, v));
        rgb.extend_from_slice(&yuv_to_rgb(pair[2], u, v));
    }
    Ok(rgb)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let luma_len = plane_len(width, height)?;
    check_len("NV12", pixels.len(), luma_len + luma_len / 2)?;
    let (luma, chroma) = pixels.split_at(luma_len);
    let stride = width as usize;

    let mut rgb = Vec::with_capacity(luma_len * 3);
    for (row, line) in luma.chunks_exact(stride).enumerate() {
        // One interleaved UV row serves two luma rows.
        let uv_row = &chroma[(row / 2) * stride..];
        for (col, &y) in line.iter().enumerate() {
            let uv = (col / 2) * 2;
            rgb.extend_from_slice(&yuv_to_rgb(y, uv_row[uv], uv_row[uv + 1]));
        }
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    [
        saturate(y + 1.402_f32 * v),
        saturate(y - 0.344_136_f32 * u - 0.714_136_f32 * v),
        saturate(y + 1.772_f32 * u),
    ]
}

fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

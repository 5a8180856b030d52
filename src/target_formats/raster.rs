//! Uncompressed pixel formats. Blocks are written pixel by pixel, clipped
//! to the original image size.

use crate::color::{scale_8_to_n, Color32};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Rgba32,
    /// RGB part of an RGBA32 pixel, alpha byte is kept
    Rgb32,
    /// Alpha byte of an RGBA32 pixel, taken from the selected channel
    A32,
    Rgb565,
    Bgr565,
    /// RGB part of an RGBA4444 pixel, alpha nibble is kept
    Rgba4444Color,
    /// Alpha nibble of an RGBA4444 pixel, taken from the selected channel
    Rgba4444Alpha,
    /// RGBA4444 pixel with alpha set to 0xF
    Rgba4444ColorOpaque,
}

impl RasterFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            RasterFormat::Rgba32 | RasterFormat::Rgb32 | RasterFormat::A32 => 4,
            _ => 2,
        }
    }

    fn write_pixel(self, dst: &mut [u8], pixel: Color32, channel: usize) {
        match self {
            RasterFormat::Rgba32 => dst[..4].copy_from_slice(&pixel.0),
            RasterFormat::Rgb32 => dst[..3].copy_from_slice(&pixel.0[..3]),
            RasterFormat::A32 => dst[3] = pixel[channel],
            RasterFormat::Rgb565 => dst[..2].copy_from_slice(&pixel.to_565().to_le_bytes()),
            RasterFormat::Bgr565 => {
                let r = scale_8_to_n(pixel[0], 5) as u16;
                let g = scale_8_to_n(pixel[1], 6) as u16;
                let b = scale_8_to_n(pixel[2], 5) as u16;
                dst[..2].copy_from_slice(&(b << 11 | g << 5 | r).to_le_bytes());
            }
            RasterFormat::Rgba4444Color | RasterFormat::Rgba4444Alpha | RasterFormat::Rgba4444ColorOpaque => {
                let old = u16::from_le_bytes([dst[0], dst[1]]);
                let rgb = || {
                    let r = scale_8_to_n(pixel[0], 4) as u16;
                    let g = scale_8_to_n(pixel[1], 4) as u16;
                    let b = scale_8_to_n(pixel[2], 4) as u16;
                    r << 12 | g << 8 | b << 4
                };
                let new = match self {
                    RasterFormat::Rgba4444Color => (old & 0x000F) | rgb(),
                    RasterFormat::Rgba4444Alpha => (old & 0xFFF0) | scale_8_to_n(pixel[channel], 4) as u16,
                    _ => rgb() | 0x000F,
                };
                dst[..2].copy_from_slice(&new.to_le_bytes());
            }
        }
    }
}

/// Geometry of a raster output: the visible image size and the row pitch,
/// both in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterTarget {
    pub width: u32,
    pub height: u32,
    pub row_pitch: u32,
}

/// Writes the pixels of block (`block_x`, `block_y`) which fall inside the
/// visible image. `output` must hold `row_pitch * height` pixels.
pub fn write_block(
    format: RasterFormat,
    pixels: &[Color32; 16],
    channel: usize,
    output: &mut [u8],
    target: &RasterTarget,
    block_x: u32,
    block_y: u32,
) {
    let bpp = format.bytes_per_pixel();
    let x0 = block_x * 4;
    let y0 = block_y * 4;
    let w = target.width.saturating_sub(x0).min(4) as usize;
    let h = target.height.saturating_sub(y0).min(4) as usize;

    for y in 0..h {
        let row_start = ((y0 as usize + y) * target.row_pitch as usize + x0 as usize) * bpp;
        let row = &mut output[row_start..row_start + w * bpp];
        for (x, dst) in row.chunks_exact_mut(bpp).enumerate() {
            format.write_pixel(dst, pixels[y * 4 + x], channel);
        }
    }
}

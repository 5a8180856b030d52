//! Block encoders for the GPU formats the transcoder can write.
//!
//! Every encoder works on one decoded 4x4 block in row-major pixel order.

pub mod astc;
pub mod atc;
pub mod bc1;
pub mod bc4;
pub mod bc7;
pub mod eac;
pub mod raster;

use crate::color::Color32;

/// Extracts one channel of a decoded block.
pub fn channel_values(pixels: &[Color32; 16], channel: usize) -> [u8; 16] {
    let mut values = [0u8; 16];
    for (v, p) in values.iter_mut().zip(pixels.iter()) {
        *v = p[channel];
    }
    values
}

/// Index of the closest entry of `palette`, by squared RGBA distance.
pub(crate) fn closest_color(palette: &[Color32], color: Color32) -> usize {
    let mut best = 0;
    let mut best_err = u32::MAX;
    for (i, p) in palette.iter().enumerate() {
        let err = color_distance(*p, color);
        if err < best_err {
            best = i;
            best_err = err;
        }
    }
    best
}

pub(crate) fn color_distance(a: Color32, b: Color32) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

/// Per-channel minimum and maximum of a block.
pub(crate) fn bounding_box(pixels: &[Color32; 16]) -> (Color32, Color32) {
    let mut min = Color32::new(255, 255, 255, 255);
    let mut max = Color32::new(0, 0, 0, 0);
    for p in pixels.iter() {
        for c in 0..4 {
            min[c] = min[c].min(p[c]);
            max[c] = max[c].max(p[c]);
        }
    }
    (min, max)
}

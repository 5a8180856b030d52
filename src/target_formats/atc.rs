use super::{bounding_box, closest_color};
use crate::color::{extend_n_to_8, scale_8_to_n, Color32};

pub const ATC_RGB_BLOCK_SIZE: usize = 8;

/// ATC RGB block in the interpolated mode. Color 0 is stored as 555 with
/// the mode bit cleared, color 1 as 565.
pub fn encode_rgb_block(pixels: &[Color32; 16]) -> [u8; ATC_RGB_BLOCK_SIZE] {
    let (min, max) = bounding_box(pixels);
    let c0 = to_555(min);
    let c1 = max.to_565();

    let mut block = [0u8; ATC_RGB_BLOCK_SIZE];
    block[0..2].copy_from_slice(&c0.to_le_bytes());
    block[2..4].copy_from_slice(&c1.to_le_bytes());

    let palette = palette(c0, c1);
    let mut indices = 0u32;
    for (i, &p) in pixels.iter().enumerate() {
        let mut p = p;
        p[3] = 0xFF;
        indices |= (closest_color(&palette, p) as u32) << (2 * i);
    }
    block[4..8].copy_from_slice(&indices.to_le_bytes());
    block
}

fn to_555(color: Color32) -> u16 {
    let r = scale_8_to_n(color[0], 5) as u16;
    let g = scale_8_to_n(color[1], 5) as u16;
    let b = scale_8_to_n(color[2], 5) as u16;
    r << 10 | g << 5 | b
}

fn from_555(c: u16) -> Color32 {
    let r = extend_n_to_8(((c >> 10) & 0x1F) as u8, 5);
    let g = extend_n_to_8(((c >> 5) & 0x1F) as u8, 5);
    let b = extend_n_to_8((c & 0x1F) as u8, 5);
    Color32::new(r, g, b, 0xFF)
}

pub fn palette(c0: u16, c1: u16) -> [Color32; 4] {
    let e0 = from_555(c0);
    let e1 = Color32::from_565(c1);
    let mut p1 = e0;
    let mut p2 = e1;
    for c in 0..3 {
        p1[c] = ((2 * e0[c] as u32 + e1[c] as u32) / 3) as u8;
        p2[c] = ((e0[c] as u32 + 2 * e1[c] as u32) / 3) as u8;
    }
    [e0, p1, p2, e1]
}

#[cfg(test)]
pub(crate) fn decode_rgb_block(block: &[u8]) -> [Color32; 16] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    assert_eq!(c0 & 0x8000, 0);
    let palette = palette(c0, c1);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let mut pixels = [Color32::default(); 16];
    for (i, p) in pixels.iter_mut().enumerate() {
        *p = palette[(indices >> (2 * i) & 3) as usize];
    }
    pixels
}

use super::{bounding_box, closest_color};
use crate::color::Color32;

pub const BC1_BLOCK_SIZE: usize = 8;

/// Four color BC1 block spanning the bounding box of the block colors.
pub fn encode_block(pixels: &[Color32; 16]) -> [u8; BC1_BLOCK_SIZE] {
    let (min, max) = bounding_box(pixels);
    let mut c0 = max.to_565();
    let mut c1 = min.to_565();
    if c0 < c1 {
        core::mem::swap(&mut c0, &mut c1);
    }

    let mut block = [0u8; BC1_BLOCK_SIZE];
    block[0..2].copy_from_slice(&c0.to_le_bytes());
    block[2..4].copy_from_slice(&c1.to_le_bytes());

    if c0 == c1 {
        // Every index 0 selects color0, the three color mode doesn't matter
        return block;
    }

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

/// Four color mode palette, `c0` must be greater than `c1`.
pub fn palette(c0: u16, c1: u16) -> [Color32; 4] {
    let e0 = Color32::from_565(c0);
    let e1 = Color32::from_565(c1);
    let mut p2 = e0;
    let mut p3 = e1;
    for c in 0..3 {
        p2[c] = ((2 * e0[c] as u32 + e1[c] as u32) / 3) as u8;
        p3[c] = ((e0[c] as u32 + 2 * e1[c] as u32) / 3) as u8;
    }
    [e0, e1, p2, p3]
}

#[cfg(test)]
pub(crate) fn decode_block(block: &[u8]) -> [Color32; 16] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let palette = palette(c0, c1);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let mut pixels = [Color32::default(); 16];
    for (i, p) in pixels.iter_mut().enumerate() {
        *p = palette[(indices >> (2 * i) & 3) as usize];
    }
    pixels
}

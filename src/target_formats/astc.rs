use super::{bounding_box, closest_color};
use crate::{
    bitwriter::{BitWriterLsb, BitWriterLsbReversed},
    color::Color32,
};

pub const ASTC_BLOCK_SIZE: usize = 16;

// 4x4 weight grid, single plane, weight range 0..=3, one partition
const BLOCK_MODE: u16 = 0b000_0100_0010;
const BLOCK_MODE_BITS: usize = 11;
const PARTITION_COUNT_BITS: usize = 2;

// LDR RGBA, direct
const CEM_RGBA_DIRECT: u8 = 12;

// Unquantized values of the four 2 bit weights
static WEIGHT_VALUES: [u32; 4] = [0, 21, 43, 64];

/// Encodes an LDR block, a void extent block for solid colors and an RGBA
/// direct block with 8 bit endpoints and 2 bit weights otherwise.
pub fn encode_block(pixels: &[Color32; 16]) -> [u8; ASTC_BLOCK_SIZE] {
    let (min, max) = bounding_box(pixels);
    if min == max {
        return void_extent_block(min);
    }

    let mut palette = [Color32::default(); 4];
    for (p, &w) in palette.iter_mut().zip(WEIGHT_VALUES.iter()) {
        for c in 0..4 {
            p[c] = astc_interpolate(min[c] as u32, max[c] as u32, w);
        }
    }

    let mut block = [0u8; ASTC_BLOCK_SIZE];
    {
        let writer = &mut BitWriterLsb::new(&mut block);
        writer.write_u16(BLOCK_MODE_BITS, BLOCK_MODE);
        writer.write_u8(PARTITION_COUNT_BITS, 0);
        writer.write_u8(4, CEM_RGBA_DIRECT);

        // Endpoint 1 is never smaller than endpoint 0, so blue contraction
        // is never triggered
        for c in 0..4 {
            writer.write_u8(8, min[c]);
            writer.write_u8(8, max[c]);
        }
    }

    // Weights are stored from the top of the block, bit reversed
    let writer = &mut BitWriterLsbReversed::new(&mut block);
    for &pixel in pixels.iter() {
        writer.write_u8(2, closest_color(&palette, pixel) as u8);
    }

    block
}

pub fn void_extent_block(color: Color32) -> [u8; ASTC_BLOCK_SIZE] {
    let mut block = [0u8; ASTC_BLOCK_SIZE];
    let writer = &mut BitWriterLsb::new(&mut block);

    // 0..=8: void-extent signature
    // 9: 0 means endpoints are UNORM16, 1 means FP16
    // 10..=11: reserved, must be 1
    writer.write_u16(12, 0b1101_1111_1100);

    // 4x 13 bits of void extent coordinates, all 1s to get them ignored
    writer.write_u32(20, 0x000F_FFFF);
    writer.write_u32(32, 0xFFFF_FFFF);

    for c in 0..4 {
        let v = color[c] as u16;
        writer.write_u16(16, v << 8 | v);
    }
    block
}

fn astc_interpolate(l: u32, h: u32, w: u32) -> u8 {
    let l = (l << 8) | l;
    let h = (h << 8) | h;
    let k = (l * (64 - w) + h * w + 32) >> 6;
    (k >> 8) as u8
}

#[cfg(test)]
pub(crate) fn decode_block(block: &[u8; ASTC_BLOCK_SIZE]) -> [Color32; 16] {
    use crate::bitreader::BitReaderLsb;

    let r = &mut BitReaderLsb::new(block);
    if r.peek(12) == 0b1101_1111_1100 {
        r.remove(64);
        let mut color = Color32::default();
        for c in 0..4 {
            color[c] = (r.read_u32(16) >> 8) as u8;
        }
        return [color; 16];
    }

    assert_eq!(r.read_u32(BLOCK_MODE_BITS) as u16, BLOCK_MODE);
    assert_eq!(r.read_u8(PARTITION_COUNT_BITS), 0);
    assert_eq!(r.read_u8(4), CEM_RGBA_DIRECT);
    let mut endpoints = [Color32::default(); 2];
    for c in 0..4 {
        endpoints[0][c] = r.read_u8(8);
        endpoints[1][c] = r.read_u8(8);
    }

    let weights = u32::from_le_bytes([block[12], block[13], block[14], block[15]]).reverse_bits();
    let mut pixels = [Color32::default(); 16];
    for (i, p) in pixels.iter_mut().enumerate() {
        let w = WEIGHT_VALUES[(weights >> (2 * i) & 3) as usize];
        for c in 0..4 {
            p[c] = astc_interpolate(endpoints[0][c] as u32, endpoints[1][c] as u32, w);
        }
    }
    pixels
}

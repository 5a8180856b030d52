use super::{bounding_box, color_distance};
use crate::{bitwriter::BitWriterLsb, color::Color32};

pub const BC7_BLOCK_SIZE: usize = 16;

const MODE: usize = 6;
const ENDPOINT_BITS: usize = 7;
const WEIGHT_BITS: usize = 4;

static BC7_WEIGHTS4: [u32; 16] = [0, 4, 9, 13, 17, 21, 26, 30, 34, 38, 43, 47, 51, 55, 60, 64];

/// Mode 6 block: one subset, RGBA endpoints with 7 bits plus a p-bit each
/// and 4 bit indices.
pub fn encode_block(pixels: &[Color32; 16]) -> [u8; BC7_BLOCK_SIZE] {
    let (min, max) = bounding_box(pixels);
    let opaque = min[3] == 0xFF;

    let mut best: Option<(u32, [[u8; 4]; 2], [u8; 2], [u8; 16])> = None;
    for p_bits in [[1u8, 1u8], [0, 1], [1, 0], [0, 0]] {
        // Opaque blocks need both p-bits set to reach 255
        if opaque && p_bits != [1, 1] {
            continue;
        }
        let mut quant = [[0u8; 4]; 2];
        for c in 0..4 {
            quant[0][c] = quantize(min[c], p_bits[0]);
            quant[1][c] = quantize(max[c], p_bits[1]);
        }
        let (err, indices) = select_indices(&quant, &p_bits, pixels);
        if best.map_or(true, |(best_err, ..)| err < best_err) {
            best = Some((err, quant, p_bits, indices));
        }
    }

    let mut block = [0u8; BC7_BLOCK_SIZE];
    let (_, mut quant, mut p_bits, mut indices) = match best {
        Some(best) => best,
        None => return block,
    };

    // The anchor index has its most significant bit implied to be 0
    if indices[0] >= 8 {
        quant.swap(0, 1);
        p_bits.swap(0, 1);
        for i in indices.iter_mut() {
            *i = 15 - *i;
        }
    }

    let writer = &mut BitWriterLsb::new(&mut block);
    writer.write_u8(MODE + 1, 1 << MODE);
    for c in 0..4 {
        writer.write_u8(ENDPOINT_BITS, quant[0][c]);
        writer.write_u8(ENDPOINT_BITS, quant[1][c]);
    }
    writer.write_u8(1, p_bits[0]);
    writer.write_u8(1, p_bits[1]);

    writer.write_u8(WEIGHT_BITS - 1, indices[0]);
    for &i in indices.iter().skip(1) {
        writer.write_u8(WEIGHT_BITS, i);
    }
    block
}

/// Closest 7 bit value which expands to `v` with the given p-bit.
fn quantize(v: u8, p_bit: u8) -> u8 {
    ((v as i32 - p_bit as i32 + 1) / 2).clamp(0, 127) as u8
}

fn unquantize(quant: &[[u8; 4]; 2], p_bits: &[u8; 2]) -> [Color32; 2] {
    let mut res = [Color32::default(); 2];
    for e in 0..2 {
        for c in 0..4 {
            res[e][c] = quant[e][c] << 1 | p_bits[e];
        }
    }
    res
}

fn interpolate(e0: u8, e1: u8, w: u32) -> u8 {
    ((e0 as u32 * (64 - w) + e1 as u32 * w + 32) >> 6) as u8
}

fn select_indices(quant: &[[u8; 4]; 2], p_bits: &[u8; 2], pixels: &[Color32; 16]) -> (u32, [u8; 16]) {
    let endpoints = unquantize(quant, p_bits);
    let mut palette = [Color32::default(); 16];
    for (p, &w) in palette.iter_mut().zip(BC7_WEIGHTS4.iter()) {
        for c in 0..4 {
            p[c] = interpolate(endpoints[0][c], endpoints[1][c], w);
        }
    }

    let mut total_err = 0;
    let mut indices = [0u8; 16];
    for (index, &pixel) in indices.iter_mut().zip(pixels.iter()) {
        let (i, err) = palette
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, color_distance(p, pixel)))
            .min_by_key(|&(_, err)| err)
            .unwrap_or((0, 0));
        *index = i as u8;
        total_err += err;
    }
    (total_err, indices)
}

#[cfg(test)]
pub(crate) fn decode_mode6_block(block: &[u8; BC7_BLOCK_SIZE]) -> [Color32; 16] {
    use crate::bitreader::BitReaderLsb;

    let r = &mut BitReaderLsb::new(block);
    assert_eq!(r.read_u8(7), 1 << 6);
    let mut quant = [[0u8; 4]; 2];
    for c in 0..4 {
        quant[0][c] = r.read_u8(7);
        quant[1][c] = r.read_u8(7);
    }
    let p_bits = [r.read_u8(1), r.read_u8(1)];
    let endpoints = unquantize(&quant, &p_bits);

    let mut pixels = [Color32::default(); 16];
    for (i, p) in pixels.iter_mut().enumerate() {
        let index = r.read_u8(if i == 0 { 3 } else { 4 });
        for c in 0..4 {
            p[c] = interpolate(endpoints[0][c], endpoints[1][c], BC7_WEIGHTS4[index as usize]);
        }
    }
    pixels
}

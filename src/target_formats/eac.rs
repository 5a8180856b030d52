//! ETC2 EAC single channel blocks. The same block bytes serve as the alpha
//! block of ETC2 RGBA8 and as an R11 block.

use crate::bitwriter::BitWriterLsb;

pub const EAC_BLOCK_SIZE: usize = 8;

const EAC_MODIFIERS_MIN_INDEX: usize = 3;
const EAC_MODIFIERS_MAX_INDEX: usize = 7;

// Table 13 is the only one containing a 0 modifier
const SOLID_TABLE_INDEX: u8 = 13;

#[rustfmt::skip]
static EAC_MODIFIERS: [[i8; 8]; 16] = [
    [ -3, -6,  -9, -15, 2, 5, 8, 14 ],
    [ -3, -7, -10, -13, 2, 6, 9, 12 ],
    [ -2, -5,  -8, -13, 1, 4, 7, 12 ],
    [ -2, -4,  -6, -13, 1, 3, 5, 12 ],
    [ -3, -6,  -8, -12, 2, 5, 7, 11 ],
    [ -3, -7,  -9, -11, 2, 6, 8, 10 ],
    [ -4, -7,  -8, -11, 3, 6, 7, 10 ],
    [ -3, -5,  -8, -11, 2, 4, 7, 10 ],
    [ -2, -6,  -8, -10, 1, 5, 7,  9 ],
    [ -2, -5,  -8, -10, 1, 4, 7,  9 ],
    [ -2, -4,  -8, -10, 1, 3, 7,  9 ],
    [ -2, -5,  -7, -10, 1, 4, 6,  9 ],
    [ -3, -4,  -7, -10, 2, 3, 6,  9 ],
    [ -1, -2,  -3, -10, 0, 1, 2,  9 ],
    [ -4, -6,  -8,  -9, 3, 5, 7,  8 ],
    [ -3, -5,  -7,  -9, 2, 4, 6,  8 ],
];

pub fn solid_block(value: u8) -> [u8; EAC_BLOCK_SIZE] {
    let mut block = [0u8; EAC_BLOCK_SIZE];
    let writer = &mut BitWriterLsb::new(&mut block);
    writer.write_u8(8, value);

    // Multiplier, doesn't matter, but has to be non-zero, so choosing 1
    writer.write_u8(8, (1 << 4) | SOLID_TABLE_INDEX);

    // Weight indices, 16x 3 bits, value 4 (0b100)
    for _ in 0..2 {
        writer.write_u8(8, 0b10010010);
        writer.write_u8(8, 0b01001001);
        writer.write_u8(8, 0b00100100);
    }
    block
}

/// Searches all modifier tables with a multiplier fitted to the value range
/// and keeps the one with the lowest squared error.
pub fn encode_block(values: &[u8; 16]) -> [u8; EAC_BLOCK_SIZE] {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    if min == max {
        return solid_block(min);
    }

    let mut best: Option<(u32, u8, u8, u8, u64)> = None;
    for (table_index, table) in EAC_MODIFIERS.iter().enumerate() {
        let mod_min = table[EAC_MODIFIERS_MIN_INDEX] as i32;
        let mod_max = table[EAC_MODIFIERS_MAX_INDEX] as i32;
        let span = mod_max - mod_min;
        let range = max as i32 - min as i32;

        let multiplier = ((range + span / 2) / span).clamp(1, 15);
        let base = (((min as i32 + max as i32) - (mod_min + mod_max) * multiplier) / 2).clamp(0, 255);

        let mut palette = [0u8; 8];
        for (p, &m) in palette.iter_mut().zip(table.iter()) {
            *p = (base + m as i32 * multiplier).clamp(0, 255) as u8;
        }

        let mut err = 0u32;
        let mut selectors = 0u64;
        for (i, &v) in values.iter().enumerate() {
            let (sel, e) = palette
                .iter()
                .enumerate()
                .map(|(s, &p)| (s, (p as i32 - v as i32).unsigned_abs()))
                .min_by_key(|&(_, e)| e)
                .unwrap_or((0, 0));
            err += e * e;

            // Pixels are stored column by column
            let x = i % 4;
            let y = i / 4;
            let id = x * 4 + y;
            selectors |= (sel as u64) << (45 - id * 3);
        }

        if best.map_or(true, |(best_err, ..)| err < best_err) {
            best = Some((err, base as u8, multiplier as u8, table_index as u8, selectors));
        }
    }

    let mut block = [0u8; EAC_BLOCK_SIZE];
    if let Some((_, base, multiplier, table_index, selectors)) = best {
        block[0] = base;
        block[1] = multiplier << 4 | table_index;
        block[2..].copy_from_slice(&selectors.to_be_bytes()[2..]);
    }
    block
}

#[cfg(test)]
pub(crate) fn decode_block(block: &[u8]) -> [u8; 16] {
    let base = block[0] as i32;
    let multiplier = (block[1] >> 4) as i32;
    let table = EAC_MODIFIERS[(block[1] & 0xF) as usize];
    let mut bytes = [0u8; 8];
    bytes[2..].copy_from_slice(&block[2..8]);
    let selectors = u64::from_be_bytes(bytes);

    let mut values = [0u8; 16];
    for (i, v) in values.iter_mut().enumerate() {
        let id = (i % 4) * 4 + i / 4;
        let sel = (selectors >> (45 - id * 3)) & 7;
        *v = (base + table[sel as usize] as i32 * multiplier).clamp(0, 255) as u8;
    }
    values
}

use alloc::{format, vec, vec::Vec};

use super::{
    huffman::{self, HuffmanDecodingTable},
    Result,
};
use crate::{bitreader::BitReaderLsb, color::Color32};

const COLOR5_PAL0_PREV_HI: u8 = 9;
const COLOR5_PAL1_PREV_LO: u8 = 10;
const COLOR5_PAL1_PREV_HI: u8 = 21;

/// Number of bits of a global selector modifier: 2 bits of clockwise
/// rotations (bits 0-1), a horizontal flip bit (bit 2, applied before the
/// rotation) and an invert bit (bit 3).
pub const GLOBAL_SELECTOR_MODIFIER_BITS: u32 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Endpoint {
    pub inten5: u8,
    pub color5: Color32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Selector {
    // Plain selectors (2-bits per value), one byte for each row
    selectors: [u8; 4],

    // Selectors in ETC1 format, ready to be written to an ETC1 texture
    pub etc1_bytes: [u8; 4],
}

impl Selector {
    pub fn from_rows(rows: [u8; 4]) -> Self {
        let mut selector = Selector::default();
        for (y, &row) in rows.iter().enumerate() {
            selector.set_row(y, row);
        }
        selector
    }

    // Returned selector value ranges from 0-3 and is a direct index into the intensity table.
    pub fn get_selector(&self, x: usize, y: usize) -> usize {
        let shift = 2 * x;
        ((self.selectors[y] >> shift) & 0b11) as usize
    }

    fn set_row(&mut self, y: usize, row: u8) {
        for x in 0..4 {
            self.set_selector(x, y, (row >> (x * 2)) & 3);
        }
    }

    fn set_selector(&mut self, x: usize, y: usize, val: u8) {
        // Pack the two-bit value into the byte for the appropriate row
        let shift = 2 * x;
        self.selectors[y] &= !(0b11 << shift);
        self.selectors[y] |= val << shift;

        // ETC1 stores a sign bit and a magnitude bit per pixel
        let mod_id: u8 = [0b11, 0b10, 0b00, 0b01][val as usize];

        // ETC1 indexes pixels from top to bottom within each column
        let pixel_id = x * 4 + y;

        // MS bit of pixel 0..8 goes to byte 1
        // MS bit of pixel 8..16 goes to byte 0
        let ms_byte_id = 1 - (pixel_id / 8);

        // LS bit of pixel 0..8 goes to byte 3
        // LS bit of pixel 8..16 goes to byte 2
        let ls_byte_id = ms_byte_id + 2;

        let bit_id = pixel_id % 8;

        self.etc1_bytes[ls_byte_id] &= !(1 << bit_id);
        self.etc1_bytes[ls_byte_id] |= (mod_id % 2) << bit_id;
        self.etc1_bytes[ms_byte_id] &= !(1 << bit_id);
        self.etc1_bytes[ms_byte_id] |= (mod_id / 2) << bit_id;
    }
}

/// Palette of 4x4 selector blocks that ETC1S files may reference instead of
/// storing their own selectors.
///
/// Every entry packs 16 two-bit selectors row by row, pixel (x, y) at bit
/// `2 * (x + 4 * y)`. Files address an entry by palette index plus a
/// modifier which rotates, flips or inverts it. The codebook is immutable,
/// share it between sessions with an `Arc`.
///
/// The palette and the modifier code (see [GLOBAL_SELECTOR_MODIFIER_BITS])
/// are supplied by the caller. This is not the palette built into the
/// reference Basis Universal encoder, and its modifiers are not encoded the
/// same way. Files referencing that palette fail in
/// [`Transcoder::start_transcoding`](crate::Transcoder::start_transcoding)
/// with [`CorruptCodebook`](crate::TranscodeError::CorruptCodebook). The
/// default codebook is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalSelectorCodebook {
    entries: Vec<u32>,
}

impl GlobalSelectorCodebook {
    pub fn new(entries: Vec<u32>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the row bytes of a palette entry after applying `modifier`,
    /// `None` if either is out of range.
    pub fn entry(&self, pal_index: usize, modifier: u32) -> Option<[u8; 4]> {
        if modifier >= 1 << GLOBAL_SELECTOR_MODIFIER_BITS {
            return None;
        }
        let word = *self.entries.get(pal_index)?;

        let mut grid = [[0u8; 4]; 4];
        for (y, row) in grid.iter_mut().enumerate() {
            for (x, sel) in row.iter_mut().enumerate() {
                *sel = (word >> (2 * (x + 4 * y)) & 3) as u8;
            }
        }

        if modifier & 0b100 != 0 {
            for row in grid.iter_mut() {
                row.reverse();
            }
        }

        for _ in 0..(modifier & 0b11) {
            let src = grid;
            for (y, row) in grid.iter_mut().enumerate() {
                for (x, sel) in row.iter_mut().enumerate() {
                    // Rotate 90 degrees clockwise
                    *sel = src[3 - x][y];
                }
            }
        }

        let invert = modifier & 0b1000 != 0;
        let mut rows = [0u8; 4];
        for (row_byte, row) in rows.iter_mut().zip(grid.iter()) {
            for (x, &sel) in row.iter().enumerate() {
                let sel = if invert { 3 - sel } else { sel };
                *row_byte |= sel << (2 * x);
            }
        }
        Some(rows)
    }
}

pub fn decode_endpoints(num_endpoints: usize, bytes: &[u8]) -> Result<Vec<Endpoint>> {
    let reader = &mut BitReaderLsb::new(bytes);

    let color5_delta_model0 = huffman::read_huffman_table(reader)?;
    let color5_delta_model1 = huffman::read_huffman_table(reader)?;
    let color5_delta_model2 = huffman::read_huffman_table(reader)?;
    let inten_delta_model = huffman::read_huffman_table(reader)?;
    let grayscale = reader.read_bool();

    // Assume previous endpoint color is (16, 16, 16), and the previous intensity is 0.
    let mut prev_color5 = Color32::new(16, 16, 16, 0);
    let mut prev_inten: u8 = 0;

    let mut endpoints: Vec<Endpoint> = vec![Endpoint::default(); num_endpoints];

    for endpoint in &mut endpoints {
        let inten_delta = inten_delta_model.decode_symbol(reader)?;
        endpoint.inten5 = (inten_delta as u8).wrapping_add(prev_inten) & 7;
        prev_inten = endpoint.inten5;

        let channel_count = if grayscale { 1 } else { 3 };
        for c in 0..channel_count {
            // The Huffman table used to decode the delta depends on the previous color's value
            let delta = match prev_color5[c] {
                0..=COLOR5_PAL0_PREV_HI => color5_delta_model0.decode_symbol(reader)?,
                COLOR5_PAL1_PREV_LO..=COLOR5_PAL1_PREV_HI => color5_delta_model1.decode_symbol(reader)?,
                _ => color5_delta_model2.decode_symbol(reader)?,
            };

            let v = prev_color5[c].wrapping_add(delta as u8) & 31;
            endpoint.color5[c] = v;
            prev_color5[c] = v;
        }

        if grayscale {
            endpoint.color5[1] = endpoint.color5[0];
            endpoint.color5[2] = endpoint.color5[0];
        }
    }

    if reader.overrun() {
        return Err("Endpoint codebook ends prematurely".into());
    }

    Ok(endpoints)
}

pub fn decode_selectors(
    num_selectors: usize,
    bytes: &[u8],
    global_codebook: &GlobalSelectorCodebook,
) -> Result<Vec<Selector>> {
    let reader = &mut BitReaderLsb::new(bytes);

    let mut selectors = Vec::with_capacity(num_selectors);

    let global = reader.read_bool();
    if global {
        let pal_bits = reader.read_u32(4) as usize;
        let mod_bits = reader.read_u32(4) as usize;
        let mod_model = read_optional_table(reader, mod_bits)?;

        for _ in 0..num_selectors {
            let pal_index = reader.read_u32(pal_bits) as usize;
            let mod_index = decode_optional(reader, mod_model.as_ref())?;
            selectors.push(global_entry(global_codebook, pal_index, mod_index)?);
        }
    } else if reader.read_bool() {
        // Hybrid: every selector is either a global palette reference or raw
        let pal_bits = reader.read_u32(4) as usize;
        let mod_bits = reader.read_u32(4) as usize;
        let uses_global_cb_bitflags_model = huffman::read_huffman_table(reader)?;
        let mod_model = read_optional_table(reader, mod_bits)?;

        // Each symbol holds the flags of the next 8 selectors
        let mut cur_uses_global = 0u32;
        for i in 0..num_selectors {
            if i % 8 == 0 {
                cur_uses_global = uses_global_cb_bitflags_model.decode_symbol(reader)? as u32;
            }
            let is_global = cur_uses_global & 1 != 0;
            cur_uses_global >>= 1;

            if is_global {
                let pal_index = reader.read_u32(pal_bits) as usize;
                let mod_index = decode_optional(reader, mod_model.as_ref())?;
                selectors.push(global_entry(global_codebook, pal_index, mod_index)?);
            } else {
                selectors.push(read_raw_selector(reader));
            }
        }
    } else if reader.read_bool() {
        for _ in 0..num_selectors {
            selectors.push(read_raw_selector(reader));
        }
    } else {
        let delta_selector_pal_model = huffman::read_huffman_table(reader)?;

        let mut prev_bytes = [0u8; 4];
        for i in 0..num_selectors {
            if i == 0 {
                // First selector is sent raw
                for prev_byte in prev_bytes.iter_mut() {
                    *prev_byte = reader.read_u8(8);
                }
            } else {
                // Subsequent selectors are sent with a simple form of byte-wise DPCM coding.
                for prev_byte in prev_bytes.iter_mut() {
                    let delta_byte = delta_selector_pal_model.decode_symbol(reader)?;
                    if delta_byte > 0xFF {
                        return Err(format!("Selector delta {} is not a byte", delta_byte));
                    }
                    *prev_byte ^= delta_byte as u8;
                }
            }
            selectors.push(Selector::from_rows(prev_bytes));
        }
    }

    if reader.overrun() {
        return Err("Selector codebook ends prematurely".into());
    }

    Ok(selectors)
}

fn read_raw_selector(reader: &mut BitReaderLsb) -> Selector {
    let mut rows = [0u8; 4];
    for row in rows.iter_mut() {
        *row = reader.read_u8(8);
    }
    Selector::from_rows(rows)
}

fn read_optional_table(reader: &mut BitReaderLsb, bits: usize) -> Result<Option<HuffmanDecodingTable>> {
    if bits == 0 {
        Ok(None)
    } else {
        huffman::read_huffman_table(reader).map(Some)
    }
}

fn decode_optional(reader: &mut BitReaderLsb, model: Option<&HuffmanDecodingTable>) -> Result<u32> {
    match model {
        Some(model) => Ok(model.decode_symbol(reader)? as u32),
        None => Ok(0),
    }
}

fn global_entry(codebook: &GlobalSelectorCodebook, pal_index: usize, mod_index: u32) -> Result<Selector> {
    codebook
        .entry(pal_index, mod_index)
        .map(Selector::from_rows)
        .ok_or_else(|| {
            format!(
                "Global selector {} with modifier {} is out of range, codebook has {} entries",
                pal_index,
                mod_index,
                codebook.len()
            )
        })
}

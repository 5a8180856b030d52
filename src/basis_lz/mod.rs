//! ETC1S (BasisLZ) codebooks and slice decoding.

use alloc::{format, string::String, vec, vec::Vec};
use core::ops::Index;

use crate::{
    basis::{Header, SliceDesc},
    bitreader::BitReaderLsb,
    color::{extend_n_to_8, Color32},
    mask,
};

mod codebook;
mod huffman;

pub use codebook::{GlobalSelectorCodebook, GLOBAL_SELECTOR_MODIFIER_BITS};
use codebook::{Endpoint, Selector};
use huffman::HuffmanDecodingTable;

pub(crate) type Result<T> = core::result::Result<T, String>;

const ENDPOINT_PRED_TOTAL_SYMBOLS: u16 = (4 * 4 * 4 * 4) + 1;
const ENDPOINT_PRED_REPEAT_LAST_SYMBOL: u16 = ENDPOINT_PRED_TOTAL_SYMBOLS - 1;
const ENDPOINT_PRED_MIN_REPEAT_COUNT: u32 = 3;
const ENDPOINT_PRED_COUNT_VLC_BITS: u32 = 4;

const NUM_ENDPOINT_PREDS: u8 = 3;
const CR_ENDPOINT_PRED_INDEX: u8 = NUM_ENDPOINT_PREDS - 1;

const MAX_SELECTOR_HISTORY_BUF_SIZE: u32 = 64;
const SELECTOR_HISTORY_BUF_RLE_COUNT_THRESH: u32 = 3;
const SELECTOR_HISTORY_BUF_RLE_COUNT_BITS: u32 = 6;
const SELECTOR_HISTORY_BUF_RLE_COUNT_TOTAL: u32 = 1 << SELECTOR_HISTORY_BUF_RLE_COUNT_BITS;

/// ETC1 intensity modifier tables
pub const INTENS: [[i16; 4]; 8] = [
    [-8, -2, 2, 8],
    [-17, -5, 5, 17],
    [-29, -9, 9, 29],
    [-42, -13, 13, 42],
    [-60, -18, 18, 60],
    [-80, -24, 24, 80],
    [-106, -33, 33, 106],
    [-183, -47, 47, 183],
];

#[derive(Clone, Copy, Debug)]
pub struct DecodedBlock {
    pub block_x: u32,
    pub block_y: u32,
    pub endpoint_index: u16,
    pub selector_index: u16,
}

/// Endpoint and selector indices of every block of the last decoded video
/// frame.
#[derive(Clone, Copy, Default)]
pub struct PrevFrameIndices {
    endpoint_index: u16,
    selector_index: u16,
}

/// Decoded codebooks and slice Huffman models of one ETC1S file.
pub struct Decoder {
    endpoint_pred_model: HuffmanDecodingTable,
    delta_endpoint_model: HuffmanDecodingTable,
    selector_model: HuffmanDecodingTable,
    selector_history_buf_rle_model: HuffmanDecodingTable,

    selector_history_buffer_size: u32,
    is_video: bool,

    endpoints: Vec<Endpoint>,
    selectors: Vec<Selector>,
}

impl Decoder {
    /// Decodes the endpoint codebook, the selector codebook and the slice
    /// Huffman tables.
    pub fn from_file_bytes(
        header: &Header,
        bytes: &[u8],
        is_video: bool,
        global_codebook: &GlobalSelectorCodebook,
    ) -> Result<Self> {
        if header.total_endpoints == 0 || header.total_selectors == 0 {
            return Err("ETC1S files need at least one endpoint and one selector".into());
        }

        let endpoints = codebook::decode_endpoints(
            header.total_endpoints as usize,
            section(bytes, header.endpoint_cb_file_ofs, header.endpoint_cb_file_size)?,
        )?;

        let selectors = codebook::decode_selectors(
            header.total_selectors as usize,
            section(bytes, header.selector_cb_file_ofs, header.selector_cb_file_size)?,
            global_codebook,
        )?;

        let reader = &mut BitReaderLsb::new(section(bytes, header.tables_file_ofs, header.tables_file_size)?);

        let endpoint_pred_model = huffman::read_huffman_table(reader)?;
        let delta_endpoint_model = huffman::read_huffman_table(reader)?;
        let selector_model = huffman::read_huffman_table(reader)?;
        let selector_history_buf_rle_model = huffman::read_huffman_table(reader)?;
        let selector_history_buffer_size = reader.read_u32(13);

        if reader.overrun() {
            return Err("Huffman tables end prematurely".into());
        }
        if selector_history_buffer_size > MAX_SELECTOR_HISTORY_BUF_SIZE {
            return Err(format!(
                "Selector history buffer size {} exceeds {}",
                selector_history_buffer_size, MAX_SELECTOR_HISTORY_BUF_SIZE
            ));
        }

        Ok(Self {
            endpoint_pred_model,
            delta_endpoint_model,
            selector_model,
            selector_history_buf_rle_model,
            selector_history_buffer_size,
            is_video,
            endpoints,
            selectors,
        })
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn selector_count(&self) -> usize {
        self.selectors.len()
    }

    /// ETC1 block with the same endpoint in both subblocks.
    pub fn etc1_block(&self, block: &DecodedBlock) -> [u8; 8] {
        let endpoint = self.endpoints[block.endpoint_index as usize];
        let selector = self.selectors[block.selector_index as usize];

        let mut res = [0u8; 8];
        // color_r: 5 | delta: 3
        res[0] = endpoint.color5[0] << 3;
        // color_g: 5 | delta: 3
        res[1] = endpoint.color5[1] << 3;
        // color_b: 5 | delta: 3
        res[2] = endpoint.color5[2] << 3;
        // codeword: 3 | codeword: 3 | diff: 1 | flip: 1
        res[3] = endpoint.inten5 << 5 | endpoint.inten5 << 2 | 0b10;
        // selector bits: 16 x 2 bits
        res[4..].copy_from_slice(&selector.etc1_bytes);
        res
    }

    /// Decodes the 16 pixels of a block in row-major order.
    pub fn block_pixels(&self, block: &DecodedBlock) -> [Color32; 16] {
        let endpoint = self.endpoints[block.endpoint_index as usize];
        let selector = self.selectors[block.selector_index as usize];

        let modifiers = INTENS[endpoint.inten5 as usize];
        let mut colors = [Color32::default(); 4];
        for (color, &modifier) in colors.iter_mut().zip(modifiers.iter()) {
            for c in 0..3 {
                let val = extend_n_to_8(endpoint.color5[c], 5) as i16 + modifier;
                color[c] = val.clamp(0, 255) as u8;
            }
            color[3] = 0xFF;
        }

        let mut pixels = [Color32::default(); 16];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = colors[selector.get_selector(i % 4, i / 4)];
        }
        pixels
    }

    /// Decodes all blocks of a slice in raster order and hands them to `f`.
    ///
    /// For video files `prev_frame` holds the indices of the previous frame
    /// at the same level. It is replaced by the indices of this frame when
    /// the slice decodes without error. I-frames ignore its contents,
    /// predicted frames fail without it.
    pub fn decode_blocks<F>(
        &self,
        slice_desc: &SliceDesc,
        bytes: &[u8],
        prev_frame: Option<&mut Vec<PrevFrameIndices>>,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(DecodedBlock),
    {
        let reader = {
            let start = slice_desc.file_ofs as usize;
            let len = slice_desc.file_size as usize;
            let data = bytes
                .get(start..start + len)
                .ok_or("Slice data is out of bounds")?;
            &mut BitReaderLsb::new(data)
        };

        let num_endpoints = self.endpoints.len() as u16;
        let num_selectors = self.selectors.len() as u16;

        let num_blocks_x = slice_desc.num_blocks_x as u32;
        let num_blocks_y = slice_desc.num_blocks_y as u32;
        let total_blocks = (num_blocks_x * num_blocks_y) as usize;

        // Indices of this frame, they replace `prev_frame` only once the whole slice decoded
        let mut frame: Option<Vec<PrevFrameIndices>> = if self.is_video {
            let prev = prev_frame
                .as_deref()
                .ok_or("Video slice decoded without frame state")?;
            if slice_desc.is_iframe() {
                Some(vec![PrevFrameIndices::default(); total_blocks])
            } else if prev.len() != total_blocks {
                return Err("Predicted frame without a matching preceding frame".into());
            } else {
                Some(prev.clone())
            }
        } else {
            None
        };

        #[derive(Clone, Copy, Default)]
        struct BlockPreds {
            endpoint_index: u16,
            pred_bits: u8,
        }
        // Array of per-block values used for endpoint index prediction (enough for 2 rows).
        let mut block_endpoint_preds: [Vec<BlockPreds>; 2] = [
            vec![BlockPreds::default(); num_blocks_x as usize],
            vec![BlockPreds::default(); num_blocks_x as usize],
        ];

        let selector_history_buf_first_symbol_index: u16 = num_selectors;
        let selector_history_buf_rle_symbol_index: u16 =
            self.selector_history_buffer_size as u16 + selector_history_buf_first_symbol_index;
        let mut cur_selector_rle_count: u32 = 0;

        let mut cur_pred_bits: u8 = 0;
        let mut prev_endpoint_pred_sym: u8 = 0;
        let mut endpoint_pred_repeat_count: u32 = 0;
        let mut prev_endpoint_index: u16 = 0;

        let mut selector_history_buf = ApproxMoveToFront::new(self.selector_history_buffer_size as usize);

        for block_y in 0..num_blocks_y {
            let cur_block_endpoint_pred_array = (block_y & 1) as usize;

            for block_x in 0..num_blocks_x {
                // Check if we're at the start of a 2x2 block group.
                if block_x & 1 == 0 {
                    if block_y & 1 == 0 {
                        // Even row and column, decode the predictor symbol of the whole 2x2 group
                        if endpoint_pred_repeat_count != 0 {
                            endpoint_pred_repeat_count -= 1;
                            cur_pred_bits = prev_endpoint_pred_sym;
                        } else {
                            let pred_bits_sym = self.endpoint_pred_model.decode_symbol(reader)?;
                            if pred_bits_sym == ENDPOINT_PRED_REPEAT_LAST_SYMBOL {
                                endpoint_pred_repeat_count = decode_vlc(reader, ENDPOINT_PRED_COUNT_VLC_BITS)?
                                    .checked_add(ENDPOINT_PRED_MIN_REPEAT_COUNT - 1)
                                    .filter(|&count| count as usize <= total_blocks)
                                    .ok_or("Endpoint predictor run is longer than the slice")?;
                                cur_pred_bits = prev_endpoint_pred_sym;
                            } else if pred_bits_sym < ENDPOINT_PRED_REPEAT_LAST_SYMBOL {
                                cur_pred_bits = pred_bits_sym as u8;
                                prev_endpoint_pred_sym = cur_pred_bits;
                            } else {
                                return Err(format!("Invalid endpoint predictor symbol {}", pred_bits_sym));
                            }
                        }

                        // Remember the prediction bits for the two blocks on the next row
                        block_endpoint_preds[cur_block_endpoint_pred_array ^ 1][block_x as usize].pred_bits =
                            cur_pred_bits >> 4;
                    } else {
                        cur_pred_bits = block_endpoint_preds[cur_block_endpoint_pred_array][block_x as usize].pred_bits;
                    }
                }

                let pred: u8 = cur_pred_bits & 3;
                cur_pred_bits >>= 2;

                let block_id = (block_x + block_y * num_blocks_x) as usize;

                let endpoint_index = match pred {
                    0 => {
                        // Reuse the left block's endpoint index
                        if block_x == 0 {
                            return Err(format!("Left endpoint prediction at block ({}, {})", block_x, block_y));
                        }
                        prev_endpoint_index
                    }
                    1 => {
                        // Reuse the upper block's endpoint index
                        if block_y == 0 {
                            return Err(format!("Upper endpoint prediction at block ({}, {})", block_x, block_y));
                        }
                        block_endpoint_preds[cur_block_endpoint_pred_array ^ 1][block_x as usize].endpoint_index
                    }
                    CR_ENDPOINT_PRED_INDEX if self.is_video => {
                        match frame.as_ref().and_then(|frame| frame.get(block_id)) {
                            Some(prev) => prev.endpoint_index,
                            None => return Err("Missing previous frame".into()),
                        }
                    }
                    CR_ENDPOINT_PRED_INDEX => {
                        // Reuse the upper left block's endpoint index
                        if block_x == 0 || block_y == 0 {
                            return Err(format!(
                                "Upper left endpoint prediction at block ({}, {})",
                                block_x, block_y
                            ));
                        }
                        block_endpoint_preds[cur_block_endpoint_pred_array ^ 1][block_x as usize - 1].endpoint_index
                    }
                    _ => {
                        // DPCM coded delta to the previously used endpoint index
                        let delta_sym = self.delta_endpoint_model.decode_symbol(reader)?;
                        if delta_sym >= num_endpoints {
                            return Err(format!("Endpoint delta {} out of range", delta_sym));
                        }

                        let mut endpoint_index = delta_sym as u32 + prev_endpoint_index as u32;

                        // Wrap around if the index goes beyond the end of the endpoint codebook
                        if endpoint_index >= num_endpoints as u32 {
                            endpoint_index -= num_endpoints as u32;
                        }

                        endpoint_index as u16
                    }
                };

                block_endpoint_preds[cur_block_endpoint_pred_array][block_x as usize].endpoint_index = endpoint_index;
                prev_endpoint_index = endpoint_index;

                let selector_index = if !self.is_video || pred != CR_ENDPOINT_PRED_INDEX {
                    let selector_sym: u16 = if cur_selector_rle_count > 0 {
                        cur_selector_rle_count -= 1;
                        num_selectors
                    } else {
                        let sym = self.selector_model.decode_symbol(reader)?;

                        if sym == selector_history_buf_rle_symbol_index {
                            let run_sym = self.selector_history_buf_rle_model.decode_symbol(reader)? as u32;

                            let run = if run_sym == SELECTOR_HISTORY_BUF_RLE_COUNT_TOTAL - 1 {
                                // Very long run
                                decode_vlc(reader, 7)?
                            } else {
                                run_sym
                            };
                            cur_selector_rle_count = run
                                .checked_add(SELECTOR_HISTORY_BUF_RLE_COUNT_THRESH)
                                .filter(|&count| count as usize <= total_blocks)
                                .ok_or("Selector history run is longer than the slice")?;

                            cur_selector_rle_count -= 1;

                            num_selectors
                        } else {
                            sym
                        }
                    };

                    if selector_sym >= num_selectors {
                        // Reference into the selector history buffer
                        let history_buf_index = (selector_sym - num_selectors) as usize;
                        if history_buf_index >= selector_history_buf.size() {
                            return Err(format!("Selector history index {} out of range", history_buf_index));
                        }

                        let index = selector_history_buf[history_buf_index];
                        if history_buf_index != 0 {
                            selector_history_buf.use_index(history_buf_index);
                        }
                        index
                    } else {
                        if self.selector_history_buffer_size > 0 {
                            selector_history_buf.add(selector_sym);
                        }
                        selector_sym
                    }
                } else {
                    match frame.as_ref().and_then(|frame| frame.get(block_id)) {
                        Some(prev) => prev.selector_index,
                        None => return Err("Missing previous frame".into()),
                    }
                };

                if let Some(slot) = frame.as_mut().and_then(|frame| frame.get_mut(block_id)) {
                    *slot = PrevFrameIndices {
                        endpoint_index,
                        selector_index,
                    };
                }

                if endpoint_index >= num_endpoints || selector_index >= num_selectors {
                    return Err(format!(
                        "Block ({}, {}) references endpoint {} and selector {}, codebooks have {} and {}",
                        block_x, block_y, endpoint_index, selector_index, num_endpoints, num_selectors
                    ));
                }

                f(DecodedBlock {
                    block_x,
                    block_y,
                    endpoint_index,
                    selector_index,
                });
            }
        }

        if reader.overrun() {
            return Err("Slice data ends prematurely".into());
        }

        if let (Some(prev), Some(frame)) = (prev_frame, frame) {
            *prev = frame;
        }

        Ok(())
    }
}

fn section(bytes: &[u8], ofs: u32, len: u32) -> Result<&[u8]> {
    let start = ofs as usize;
    bytes
        .get(start..start + len as usize)
        .ok_or_else(|| format!("Section at {} with {} bytes is out of bounds", ofs, len))
}

fn decode_vlc(reader: &mut BitReaderLsb, chunk_bits: u32) -> Result<u32> {
    let chunk_size = 1 << chunk_bits;
    let chunk_mask = mask!(chunk_bits);

    let mut v = 0;
    let mut ofs = 0;

    loop {
        let s = reader.read_u32(chunk_bits as usize + 1);
        v |= (s & chunk_mask) << ofs;
        ofs += chunk_bits;

        if (s & chunk_size) == 0 {
            break;
        }

        if ofs >= 32 || reader.overrun() {
            return Err("Invalid variable length code".into());
        }
    }

    Ok(v)
}

struct ApproxMoveToFront {
    values: Vec<u16>,
    rover: usize,
}

impl ApproxMoveToFront {
    fn new(n: usize) -> Self {
        Self {
            values: vec![0; n],
            rover: n / 2,
        }
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn add(&mut self, new_value: u16) {
        self.values[self.rover] = new_value;
        self.rover += 1;
        if self.rover == self.values.len() {
            self.rover = self.values.len() / 2;
        }
    }

    fn use_index(&mut self, index: usize) {
        self.values.swap(index / 2, index);
    }
}

impl Index<usize> for ApproxMoveToFront {
    type Output = u16;
    fn index(&self, i: usize) -> &Self::Output {
        &self.values[i]
    }
}

//! Builder for small synthetic `.basis` files.
//!
//! ETC1S files use flat Huffman tables. Blocks pick their endpoint through
//! DPCM deltas by default, or through any of the spatial and previous frame
//! predictors. Selectors are stored raw by default, the other selector
//! codebook encodings and the selector history buffer are optional.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LE};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub const HEADER_SIZE: usize = 77;
pub const SLICE_DESC_SIZE: usize = 23;

const SIG: u16 = 0x4273;
const VERSION: u16 = 0x13;

const FLAG_ETC1S: u16 = 1;
const FLAG_Y_FLIPPED: u16 = 2;
const FLAG_HAS_ALPHA_SLICES: u16 = 4;

const SLICE_HAS_ALPHA: u8 = 1;
const SLICE_IS_IFRAME: u8 = 2;

pub const TEX_TYPE_2D: u8 = 0;
pub const TEX_TYPE_VIDEO: u8 = 3;

pub const ENDPOINT_PRED_SYMBOLS: u32 = 257;
pub const ENDPOINT_PRED_REPEAT_LAST: u32 = ENDPOINT_PRED_SYMBOLS - 1;
pub const ENDPOINT_PRED_COUNT_VLC_BITS: usize = 4;
const ENDPOINT_PRED_MIN_REPEAT_COUNT: usize = 3;

pub const SELECTOR_RLE_SYMBOLS: u32 = 64;
pub const SELECTOR_RLE_VLC_BITS: usize = 7;
const SELECTOR_RLE_MIN_COUNT: usize = 3;

const GLOBAL_MODIFIER_SYMBOLS: u32 = 16;
const HYBRID_FLAG_SYMBOLS: u32 = 256;

/// Order in which the code length code sizes are stored
const CODELENGTH_CODE_ORDER: [u32; 21] = [17, 18, 19, 20, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15, 16];

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
pub struct TestEndpoint {
    pub color5: [u8; 3],
    pub inten: u8,
}

impl TestEndpoint {
    pub const fn new(r: u8, g: u8, b: u8, inten: u8) -> Self {
        Self {
            color5: [r, g, b],
            inten,
        }
    }

    pub const fn gray(v: u8, inten: u8) -> Self {
        Self::new(v, v, v, inten)
    }

    /// Colour of a pixel using selector `selector`.
    pub fn pixel(&self, selector: u8) -> [u8; 4] {
        let modifier = INTENS[self.inten as usize][selector as usize];
        let mut res = [255u8; 4];
        for c in 0..3 {
            let v = self.color5[c];
            let v8 = ((v << 3) | (v >> 2)) as i16;
            res[c] = (v8 + modifier).clamp(0, 255) as u8;
        }
        res
    }
}

/// Selector rows with every pixel set to `selector`.
pub fn uniform_selector(selector: u8) -> [u8; 4] {
    let row = selector * 0b0101_0101;
    [row; 4]
}

/// How a block finds its endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pred {
    Left,
    Upper,
    UpperLeft,
    /// Endpoint and selector of the same block in the previous video frame
    PrevFrame,
    Dpcm,
}

impl Pred {
    fn code(self) -> u32 {
        match self {
            Pred::Left => 0,
            Pred::Upper => 1,
            Pred::UpperLeft | Pred::PrevFrame => 2,
            Pred::Dpcm => 3,
        }
    }
}

/// Encoding of the selector codebook.
#[derive(Clone, Debug)]
pub enum SelectorCoding {
    Raw,
    /// First selector raw, every other one XORed with its predecessor
    Dpcm,
    /// Global palette index and modifier of every selector
    Global {
        pal_bits: u32,
        mod_bits: u32,
        refs: Vec<(u32, u32)>,
    },
    /// Global palette references, `None` for selectors stored raw
    Hybrid {
        pal_bits: u32,
        mod_bits: u32,
        refs: Vec<Option<(u32, u32)>>,
    },
}

#[derive(Clone, Debug)]
pub struct TestSlice {
    pub image_index: u32,
    pub level_index: u8,
    pub alpha: bool,
    pub iframe: bool,
    pub width: u16,
    pub height: u16,
    /// Endpoint and selector index of every block in raster order, blocks
    /// predicted from the previous frame take theirs from that frame
    pub blocks: Vec<(u16, u16)>,
    /// Predictor of every block in raster order, DPCM for all when `None`
    pub preds: Option<Vec<Pred>>,
}

impl TestSlice {
    pub fn solid(image_index: u32, level_index: u8, width: u16, height: u16, endpoint: u16, selector: u16) -> Self {
        let blocks = blocks_x(width) * blocks_y(height);
        Self {
            image_index,
            level_index,
            alpha: false,
            iframe: true,
            width,
            height,
            blocks: vec![(endpoint, selector); blocks],
            preds: None,
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<(u16, u16)>) -> Self {
        assert_eq!(blocks.len(), self.blocks.len());
        self.blocks = blocks;
        self
    }

    pub fn with_preds(mut self, preds: Vec<Pred>) -> Self {
        assert_eq!(preds.len(), self.blocks.len());
        self.preds = Some(preds);
        self
    }

    pub fn alpha(mut self) -> Self {
        self.alpha = true;
        self
    }

    /// Marks the slice as a predicted video frame.
    pub fn predicted(mut self) -> Self {
        self.iframe = false;
        self
    }

    /// Predicted video frame copying every block of the previous frame.
    pub fn repeat_frame(self) -> Self {
        let preds = vec![Pred::PrevFrame; self.blocks.len()];
        self.predicted().with_preds(preds)
    }

    pub fn num_blocks_x(&self) -> usize {
        blocks_x(self.width)
    }

    pub fn num_blocks_y(&self) -> usize {
        blocks_y(self.height)
    }

    fn pred(&self, block: usize) -> Pred {
        self.preds.as_ref().map_or(Pred::Dpcm, |preds| preds[block])
    }
}

fn blocks_x(width: u16) -> usize {
    (width as usize + 3) / 4
}

fn blocks_y(height: u16) -> usize {
    (height as usize + 3) / 4
}

#[derive(Clone, Debug)]
pub struct TestFile {
    pub tex_type: u8,
    pub y_flipped: bool,
    pub userdata: (u32, u32),
    pub us_per_frame: u32,
    pub total_images: Option<u32>,
    pub endpoints: Vec<TestEndpoint>,
    /// Grayscale endpoint codebook, endpoints must have equal channels
    pub grayscale: bool,
    /// Selector rows, also for selectors taken from the global palette
    pub selectors: Vec<[u8; 4]>,
    pub selector_coding: SelectorCoding,
    /// Selector history buffer size, 0 disables the history
    pub selector_history_size: u32,
    /// Code runs of equal predictor symbols with the repeat symbol
    pub pred_runs: bool,
    pub slices: Vec<TestSlice>,
}

impl TestFile {
    pub fn new(endpoints: Vec<TestEndpoint>, selectors: Vec<[u8; 4]>) -> Self {
        Self {
            tex_type: TEX_TYPE_2D,
            y_flipped: false,
            userdata: (0, 0),
            us_per_frame: 0,
            total_images: None,
            endpoints,
            grayscale: false,
            selectors,
            selector_coding: SelectorCoding::Raw,
            selector_history_size: 0,
            pred_runs: false,
            slices: Vec::new(),
        }
    }

    pub fn slice(mut self, slice: TestSlice) -> Self {
        self.slices.push(slice);
        self
    }

    pub fn video(mut self, us_per_frame: u32) -> Self {
        self.tex_type = TEX_TYPE_VIDEO;
        self.us_per_frame = us_per_frame;
        self
    }

    pub fn grayscale(mut self) -> Self {
        self.grayscale = true;
        self
    }

    pub fn selector_coding(mut self, coding: SelectorCoding) -> Self {
        self.selector_coding = coding;
        self
    }

    pub fn selector_history(mut self, size: u32) -> Self {
        self.selector_history_size = size;
        self
    }

    pub fn pred_runs(mut self) -> Self {
        self.pred_runs = true;
        self
    }

    fn is_video(&self) -> bool {
        self.tex_type == TEX_TYPE_VIDEO
    }

    pub fn build(&self) -> Vec<u8> {
        let endpoint_cb = self.endpoint_codebook();
        let selector_cb = self.selector_codebook();
        let tables = self.tables();

        let mut frames = HashMap::new();
        let payloads: Vec<Vec<u8>> = self
            .slices
            .iter()
            .map(|s| self.slice_payload(s, &mut frames))
            .collect();

        let mut flags = FLAG_ETC1S;
        if self.y_flipped {
            flags |= FLAG_Y_FLIPPED;
        }
        if self.slices.iter().any(|s| s.alpha) {
            flags |= FLAG_HAS_ALPHA_SLICES;
        }

        let mut layout = FileLayout::new(self.slices.len());
        let endpoint_ofs = layout.push(&endpoint_cb);
        let selector_ofs = layout.push(&selector_cb);
        let tables_ofs = layout.push(&tables);
        let slice_ofs: Vec<u32> = payloads.iter().map(|p| layout.push(p)).collect();

        let total_images = self
            .total_images
            .unwrap_or_else(|| self.slices.iter().map(|s| s.image_index + 1).max().unwrap_or(0));

        let mut bytes = layout.bytes;
        write_header(
            &mut bytes,
            &HeaderFields {
                total_slices: self.slices.len() as u32,
                total_images,
                tex_format: 0,
                flags,
                tex_type: self.tex_type,
                us_per_frame: self.us_per_frame,
                userdata: self.userdata,
                total_endpoints: self.endpoints.len() as u16,
                endpoint_cb: (endpoint_ofs, endpoint_cb.len() as u32),
                total_selectors: self.selectors.len() as u16,
                selector_cb: (selector_ofs, selector_cb.len() as u32),
                tables: (tables_ofs, tables.len() as u32),
            },
        );

        for (i, (slice, payload)) in self.slices.iter().zip(payloads.iter()).enumerate() {
            let mut flags = 0;
            if slice.alpha {
                flags |= SLICE_HAS_ALPHA;
            }
            if slice.iframe {
                flags |= SLICE_IS_IFRAME;
            }
            write_slice_desc(
                &mut bytes,
                i,
                &SliceFields {
                    image_index: slice.image_index,
                    level_index: slice.level_index,
                    flags,
                    width: slice.width,
                    height: slice.height,
                    file_ofs: slice_ofs[i],
                    file_size: payload.len() as u32,
                    crc: basisu_transcoder::crc16(payload, 0),
                },
            );
        }

        finish_checksums(&mut bytes);
        bytes
    }

    /// Tightly packed RGBA32 pixels of a slice made of `blocks`.
    pub fn expected_rgba(&self, width: u16, height: u16, blocks: &[(u16, u16)]) -> Vec<u8> {
        let (width, height) = (width as usize, height as usize);
        let nbx = blocks_x(width as u16);
        let mut res = vec![0u8; width * height * 4];
        for y in 0..height {
            for x in 0..width {
                let (endpoint, selector) = blocks[(y / 4) * nbx + x / 4];
                let row = self.selectors[selector as usize][y % 4];
                let sel = (row >> (2 * (x % 4))) & 3;
                let i = (y * width + x) * 4;
                res[i..i + 4].copy_from_slice(&self.endpoints[endpoint as usize].pixel(sel));
            }
        }
        res
    }

    fn endpoint_codebook(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        for _ in 0..3 {
            write_flat_table(&mut w, 32);
        }
        write_flat_table(&mut w, 8);
        w.write(1, self.grayscale as u32);

        let channels = if self.grayscale { 1 } else { 3 };
        let mut prev_color = [16u8; 3];
        let mut prev_inten = 0u8;
        for endpoint in &self.endpoints {
            if self.grayscale {
                assert!(endpoint.color5.iter().all(|&c| c == endpoint.color5[0]));
            }
            write_flat_symbol(&mut w, 8, (endpoint.inten.wrapping_sub(prev_inten) & 7) as u32);
            prev_inten = endpoint.inten;
            for c in 0..channels {
                write_flat_symbol(&mut w, 32, (endpoint.color5[c].wrapping_sub(prev_color[c]) & 31) as u32);
                prev_color[c] = endpoint.color5[c];
            }
        }
        w.finish()
    }

    fn selector_codebook(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        match &self.selector_coding {
            SelectorCoding::Global {
                pal_bits,
                mod_bits,
                refs,
            } => {
                assert_eq!(refs.len(), self.selectors.len());
                w.write(1, 1);
                write_global_params(&mut w, *pal_bits, *mod_bits);
                for &global_ref in refs {
                    write_global_ref(&mut w, *pal_bits, *mod_bits, global_ref);
                }
            }
            SelectorCoding::Hybrid {
                pal_bits,
                mod_bits,
                refs,
            } => {
                assert_eq!(refs.len(), self.selectors.len());
                w.write(1, 0);
                w.write(1, 1);
                w.write(4, *pal_bits);
                w.write(4, *mod_bits);
                write_flat_table(&mut w, HYBRID_FLAG_SYMBOLS);
                if *mod_bits != 0 {
                    write_flat_table(&mut w, GLOBAL_MODIFIER_SYMBOLS);
                }
                for (i, global_ref) in refs.iter().enumerate() {
                    if i % 8 == 0 {
                        let flags = refs[i..]
                            .iter()
                            .take(8)
                            .enumerate()
                            .filter(|(_, r)| r.is_some())
                            .fold(0, |flags, (bit, _)| flags | 1 << bit);
                        write_flat_symbol(&mut w, HYBRID_FLAG_SYMBOLS, flags);
                    }
                    match global_ref {
                        Some(global_ref) => write_global_ref(&mut w, *pal_bits, *mod_bits, *global_ref),
                        None => write_raw_selector(&mut w, &self.selectors[i]),
                    }
                }
            }
            SelectorCoding::Raw => {
                w.write(1, 0);
                w.write(1, 0);
                w.write(1, 1);
                for rows in &self.selectors {
                    write_raw_selector(&mut w, rows);
                }
            }
            SelectorCoding::Dpcm => {
                w.write(1, 0);
                w.write(1, 0);
                w.write(1, 0);
                write_flat_table(&mut w, 256);
                let mut prev = [0u8; 4];
                for (i, rows) in self.selectors.iter().enumerate() {
                    if i == 0 {
                        write_raw_selector(&mut w, rows);
                    } else {
                        for (prev_row, &row) in prev.iter().zip(rows.iter()) {
                            write_flat_symbol(&mut w, 256, (prev_row ^ row) as u32);
                        }
                    }
                    prev = *rows;
                }
            }
        }
        w.finish()
    }

    fn selector_symbols(&self) -> u32 {
        match self.selector_history_size {
            0 => self.selectors.len() as u32,
            size => self.selectors.len() as u32 + size + 1,
        }
    }

    fn tables(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        write_flat_table(&mut w, ENDPOINT_PRED_SYMBOLS);
        write_flat_table(&mut w, self.endpoints.len() as u32);
        write_flat_table(&mut w, self.selector_symbols());
        write_flat_table(&mut w, SELECTOR_RLE_SYMBOLS);
        w.write(13, self.selector_history_size);
        w.finish()
    }

    /// Endpoint and selector of every block after resolving the previous
    /// frame predictor, checks the spatial predictors against `blocks`.
    fn resolve_blocks(&self, slice: &TestSlice, prev_frame: Option<&Vec<(u16, u16)>>) -> Vec<(u16, u16)> {
        let nbx = slice.num_blocks_x();
        let mut blocks = slice.blocks.clone();
        for i in 0..blocks.len() {
            let (x, y) = (i % nbx, i / nbx);
            let neighbour = match slice.pred(i) {
                Pred::Left if x > 0 => Some(i - 1),
                Pred::Upper if y > 0 => Some(i - nbx),
                Pred::UpperLeft if x > 0 && y > 0 => Some(i - nbx - 1),
                _ => None,
            };
            if let Some(neighbour) = neighbour {
                assert_eq!(blocks[i].0, blocks[neighbour].0, "block {} does not match its predictor", i);
            }
            match slice.pred(i) {
                Pred::UpperLeft => assert!(!self.is_video()),
                Pred::PrevFrame => {
                    assert!(self.is_video());
                    if let Some(prev) = prev_frame {
                        blocks[i] = prev[i];
                    }
                }
                _ => {}
            }
        }
        blocks
    }

    fn slice_payload(&self, slice: &TestSlice, frames: &mut HashMap<(bool, u8), Vec<(u16, u16)>>) -> Vec<u8> {
        let num_endpoints = self.endpoints.len() as u32;
        let num_selectors = self.selectors.len() as u32;
        let (nbx, nby) = (slice.num_blocks_x(), slice.num_blocks_y());

        let key = (slice.alpha, slice.level_index);
        let prev_frame = frames.get(&key).filter(|prev| prev.len() == slice.blocks.len());
        let blocks = self.resolve_blocks(slice, prev_frame);
        frames.insert(key, blocks.clone());

        let group_codes = self.group_codes(slice);
        let codes_selector = |i: usize| !(self.is_video() && slice.pred(i) == Pred::PrevFrame);
        let coded_selectors: Vec<u16> = (0..blocks.len())
            .filter(|&i| codes_selector(i))
            .map(|i| blocks[i].1)
            .collect();
        let selector_codes = selector_codes(&coded_selectors, self.selector_history_size as usize);

        let mut w = BitWriter::new();
        let mut groups = group_codes.iter();
        let mut selectors = selector_codes.iter();
        let mut prev_endpoint = 0u32;
        for by in 0..nby {
            for bx in 0..nbx {
                if bx % 2 == 0 && by % 2 == 0 {
                    match groups.next() {
                        Some(GroupCode::Explicit(sym)) => write_flat_symbol(&mut w, ENDPOINT_PRED_SYMBOLS, *sym),
                        Some(GroupCode::RepeatLast(extra)) => {
                            write_flat_symbol(&mut w, ENDPOINT_PRED_SYMBOLS, ENDPOINT_PRED_REPEAT_LAST);
                            write_vlc(&mut w, ENDPOINT_PRED_COUNT_VLC_BITS, *extra);
                        }
                        Some(GroupCode::Repeated) | None => {}
                    }
                }

                let i = by * nbx + bx;
                let endpoint = blocks[i].0 as u32;
                if slice.pred(i) == Pred::Dpcm {
                    let delta = (endpoint + num_endpoints - prev_endpoint) % num_endpoints;
                    write_flat_symbol(&mut w, num_endpoints, delta);
                }
                prev_endpoint = endpoint;

                if codes_selector(i) {
                    match selectors.next() {
                        Some(SelectorCode::Literal(sym)) => write_flat_symbol(&mut w, self.selector_symbols(), *sym),
                        Some(SelectorCode::History(index)) => {
                            write_flat_symbol(&mut w, self.selector_symbols(), num_selectors + index)
                        }
                        Some(SelectorCode::Run(count)) => {
                            let rle_symbol = num_selectors + self.selector_history_size;
                            write_flat_symbol(&mut w, self.selector_symbols(), rle_symbol);
                            let extra = (count - SELECTOR_RLE_MIN_COUNT) as u32;
                            if extra < SELECTOR_RLE_SYMBOLS - 1 {
                                write_flat_symbol(&mut w, SELECTOR_RLE_SYMBOLS, extra);
                            } else {
                                write_flat_symbol(&mut w, SELECTOR_RLE_SYMBOLS, SELECTOR_RLE_SYMBOLS - 1);
                                write_vlc(&mut w, SELECTOR_RLE_VLC_BITS, extra);
                            }
                        }
                        Some(SelectorCode::InRun) | None => {}
                    }
                }
            }
        }
        w.finish()
    }

    /// Predictor symbol of every 2x2 block group in decoding order.
    fn group_codes(&self, slice: &TestSlice) -> Vec<GroupCode> {
        let (nbx, nby) = (slice.num_blocks_x(), slice.num_blocks_y());
        let mut syms = Vec::new();
        for gy in (0..nby).step_by(2) {
            for gx in (0..nbx).step_by(2) {
                let mut sym = 0;
                for (shift, (dx, dy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].iter().enumerate() {
                    let (x, y) = (gx + dx, gy + dy);
                    let pred = if x < nbx && y < nby {
                        slice.pred(y * nbx + x)
                    } else {
                        Pred::Dpcm
                    };
                    sym |= pred.code() << (2 * shift);
                }
                syms.push(sym);
            }
        }

        let mut codes = Vec::with_capacity(syms.len());
        let mut last_explicit = None;
        let mut i = 0;
        while i < syms.len() {
            let run = syms[i..].iter().take_while(|&&s| s == syms[i]).count();
            if self.pred_runs && last_explicit == Some(syms[i]) && run >= ENDPOINT_PRED_MIN_REPEAT_COUNT {
                codes.push(GroupCode::RepeatLast((run - ENDPOINT_PRED_MIN_REPEAT_COUNT) as u32));
                codes.extend(std::iter::repeat(GroupCode::Repeated).take(run - 1));
                i += run;
            } else {
                codes.push(GroupCode::Explicit(syms[i]));
                last_explicit = Some(syms[i]);
                i += 1;
            }
        }
        codes
    }
}

#[derive(Clone, Copy, Debug)]
enum GroupCode {
    Explicit(u32),
    /// Repeat symbol, the value is the run length minus the minimum count
    RepeatLast(u32),
    Repeated,
}

#[derive(Clone, Copy, Debug)]
enum SelectorCode {
    Literal(u32),
    History(u32),
    /// Run of the selector at the front of the history buffer
    Run(usize),
    InRun,
}

/// Chooses literals, history references and runs the way a decoder with a
/// history buffer of `history_size` entries reads them back.
fn selector_codes(selectors: &[u16], history_size: usize) -> Vec<SelectorCode> {
    let mut history = HistoryBuffer::new(history_size);
    let mut codes = Vec::with_capacity(selectors.len());
    let mut i = 0;
    while i < selectors.len() {
        let selector = selectors[i];
        if history_size > 0 {
            let front = history.values[0];
            let run = selectors[i..].iter().take_while(|&&s| s == front).count();
            if run >= SELECTOR_RLE_MIN_COUNT {
                codes.push(SelectorCode::Run(run));
                codes.extend(std::iter::repeat(SelectorCode::InRun).take(run - 1));
                i += run;
                continue;
            }
            if let Some(index) = history.values.iter().position(|&v| v == selector) {
                codes.push(SelectorCode::History(index as u32));
                if index != 0 {
                    history.use_index(index);
                }
                i += 1;
                continue;
            }
            history.add(selector);
        }
        codes.push(SelectorCode::Literal(selector as u32));
        i += 1;
    }
    codes
}

/// Same replacement order as the selector history of the decoder.
struct HistoryBuffer {
    values: Vec<u16>,
    rover: usize,
}

impl HistoryBuffer {
    fn new(size: usize) -> Self {
        Self {
            values: vec![0; size],
            rover: size / 2,
        }
    }

    fn add(&mut self, value: u16) {
        self.values[self.rover] = value;
        self.rover += 1;
        if self.rover == self.values.len() {
            self.rover = self.values.len() / 2;
        }
    }

    fn use_index(&mut self, index: usize) {
        self.values.swap(index / 2, index);
    }
}

fn write_raw_selector(w: &mut BitWriter, rows: &[u8; 4]) {
    for &row in rows {
        w.write(8, row as u32);
    }
}

fn write_global_params(w: &mut BitWriter, pal_bits: u32, mod_bits: u32) {
    w.write(4, pal_bits);
    w.write(4, mod_bits);
    if mod_bits != 0 {
        write_flat_table(w, GLOBAL_MODIFIER_SYMBOLS);
    }
}

fn write_global_ref(w: &mut BitWriter, pal_bits: u32, mod_bits: u32, (pal_index, modifier): (u32, u32)) {
    w.write(pal_bits as usize, pal_index);
    if mod_bits != 0 {
        write_flat_symbol(w, GLOBAL_MODIFIER_SYMBOLS, modifier);
    } else {
        assert_eq!(modifier, 0);
    }
}

/// UASTC file with a single image of `width` x `height` pixels and
/// arbitrary block data.
pub fn uastc_file(width: u16, height: u16) -> Vec<u8> {
    uastc_file_with_shared_payload(width, height, 1)
}

/// UASTC file with `total_slices` images whose slices all point at the
/// same payload.
pub fn uastc_file_with_shared_payload(width: u16, height: u16, total_slices: u32) -> Vec<u8> {
    let blocks = blocks_x(width) * blocks_y(height);
    let payload: Vec<u8> = (0..blocks * 16).map(|i| i as u8).collect();

    let mut layout = FileLayout::new(total_slices as usize);
    let slice_ofs = layout.push(&payload);
    let mut bytes = layout.bytes;
    write_header(
        &mut bytes,
        &HeaderFields {
            total_slices,
            total_images: total_slices,
            tex_format: 1,
            flags: 0,
            tex_type: TEX_TYPE_2D,
            us_per_frame: 0,
            userdata: (0, 0),
            total_endpoints: 0,
            endpoint_cb: (0, 0),
            total_selectors: 0,
            selector_cb: (0, 0),
            tables: (0, 0),
        },
    );
    for i in 0..total_slices {
        write_slice_desc(
            &mut bytes,
            i as usize,
            &SliceFields {
                image_index: i,
                level_index: 0,
                flags: SLICE_IS_IFRAME,
                width,
                height,
                file_ofs: slice_ofs,
                file_size: payload.len() as u32,
                crc: 0,
            },
        );
    }
    finish_checksums(&mut bytes);
    bytes
}

/// Recomputes the data and header CRC16 after editing a file.
pub fn finish_checksums(bytes: &mut [u8]) {
    let data_crc = basisu_transcoder::crc16(&bytes[HEADER_SIZE..], 0);
    LE::write_u16(&mut bytes[12..], data_crc);
    let header_crc = basisu_transcoder::crc16(&bytes[8..HEADER_SIZE], 0);
    LE::write_u16(&mut bytes[6..], header_crc);
}

/// Byte offset of a field of slice descriptor `slice_index`.
pub fn slice_desc_field(slice_index: usize, field_ofs: usize) -> usize {
    HEADER_SIZE + slice_index * SLICE_DESC_SIZE + field_ofs
}

/// Byte range of the payload of slice `slice_index`.
pub fn slice_payload_range(bytes: &[u8], slice_index: usize) -> Range<usize> {
    let ofs = LE::read_u32(&bytes[slice_desc_field(slice_index, 13)..]) as usize;
    let size = LE::read_u32(&bytes[slice_desc_field(slice_index, 17)..]) as usize;
    ofs..ofs + size
}

struct FileLayout {
    bytes: Vec<u8>,
}

impl FileLayout {
    fn new(total_slices: usize) -> Self {
        Self {
            bytes: vec![0u8; HEADER_SIZE + total_slices * SLICE_DESC_SIZE],
        }
    }

    fn push(&mut self, section: &[u8]) -> u32 {
        let ofs = self.bytes.len() as u32;
        self.bytes.extend_from_slice(section);
        ofs
    }
}

struct HeaderFields {
    total_slices: u32,
    total_images: u32,
    tex_format: u8,
    flags: u16,
    tex_type: u8,
    us_per_frame: u32,
    userdata: (u32, u32),
    total_endpoints: u16,
    endpoint_cb: (u32, u32),
    total_selectors: u16,
    selector_cb: (u32, u32),
    tables: (u32, u32),
}

fn write_header(bytes: &mut [u8], h: &HeaderFields) {
    let data_size = (bytes.len() - HEADER_SIZE) as u32;
    LE::write_u16(&mut bytes[0..], SIG);
    LE::write_u16(&mut bytes[2..], VERSION);
    LE::write_u16(&mut bytes[4..], HEADER_SIZE as u16);
    LE::write_u32(&mut bytes[8..], data_size);
    LE::write_u24(&mut bytes[14..], h.total_slices);
    LE::write_u24(&mut bytes[17..], h.total_images);
    bytes[20] = h.tex_format;
    LE::write_u16(&mut bytes[21..], h.flags);
    bytes[23] = h.tex_type;
    LE::write_u24(&mut bytes[24..], h.us_per_frame);
    LE::write_u32(&mut bytes[31..], h.userdata.0);
    LE::write_u32(&mut bytes[35..], h.userdata.1);
    LE::write_u16(&mut bytes[39..], h.total_endpoints);
    LE::write_u32(&mut bytes[41..], h.endpoint_cb.0);
    LE::write_u24(&mut bytes[45..], h.endpoint_cb.1);
    LE::write_u16(&mut bytes[48..], h.total_selectors);
    LE::write_u32(&mut bytes[50..], h.selector_cb.0);
    LE::write_u24(&mut bytes[54..], h.selector_cb.1);
    LE::write_u32(&mut bytes[57..], h.tables.0);
    LE::write_u32(&mut bytes[61..], h.tables.1);
    LE::write_u32(&mut bytes[65..], HEADER_SIZE as u32);
}

struct SliceFields {
    image_index: u32,
    level_index: u8,
    flags: u8,
    width: u16,
    height: u16,
    file_ofs: u32,
    file_size: u32,
    crc: u16,
}

fn write_slice_desc(bytes: &mut [u8], slice_index: usize, s: &SliceFields) {
    let d = &mut bytes[slice_desc_field(slice_index, 0)..];
    LE::write_u24(&mut d[0..], s.image_index);
    d[3] = s.level_index;
    d[4] = s.flags;
    LE::write_u16(&mut d[5..], s.width);
    LE::write_u16(&mut d[7..], s.height);
    LE::write_u16(&mut d[9..], blocks_x(s.width) as u16);
    LE::write_u16(&mut d[11..], blocks_y(s.height) as u16);
    LE::write_u32(&mut d[13..], s.file_ofs);
    LE::write_u32(&mut d[17..], s.file_size);
    LE::write_u16(&mut d[21..], s.crc);
}

/// LSB-first bit writer growing its buffer as needed.
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_pos: 0,
        }
    }

    pub fn write(&mut self, count: usize, value: u32) {
        for i in 0..count {
            let byte = self.bit_pos / 8;
            if byte == self.bytes.len() {
                self.bytes.push(0);
            }
            self.bytes[byte] |= (((value >> i) & 1) as u8) << (self.bit_pos % 8);
            self.bit_pos += 1;
        }
    }

    /// Returns the written bytes, never empty.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bytes.is_empty() {
            self.bytes.push(0);
        }
        self.bytes
    }
}

/// Code size of a table where all `symbols` symbols share one code size.
fn flat_code_size(symbols: u32) -> usize {
    let mut size = 1;
    while (1u32 << size) < symbols {
        size += 1;
    }
    size
}

/// Huffman table giving every one of `symbols` symbols the same code size.
fn write_flat_table(w: &mut BitWriter, symbols: u32) {
    let size = flat_code_size(symbols) as u32;
    w.write(14, symbols);
    w.write(5, CODELENGTH_CODE_ORDER.len() as u32);
    // Code lengths 0..=16 get 5 bit codes, run codes are unused
    for &code in CODELENGTH_CODE_ORDER.iter() {
        w.write(3, if code <= 16 { 5 } else { 0 });
    }
    for _ in 0..symbols {
        w.write(5, reverse_code(size, 5));
    }
}

/// Writes `symbol` of a table built by `write_flat_table`.
pub fn write_flat_symbol(w: &mut BitWriter, symbols: u32, symbol: u32) {
    assert!(symbol < symbols);
    let size = flat_code_size(symbols);
    w.write(size, reverse_code(symbol, size));
}

/// Variable length code made of `chunk_bits` wide chunks, each followed by
/// a continuation bit.
pub fn write_vlc(w: &mut BitWriter, chunk_bits: usize, mut value: u32) {
    loop {
        let chunk = value & ((1 << chunk_bits) - 1);
        value = value.checked_shr(chunk_bits as u32).unwrap_or(0);
        let more = value != 0;
        w.write(chunk_bits + 1, chunk | (more as u32) << chunk_bits);
        if !more {
            break;
        }
    }
}

fn reverse_code(code: u32, size: usize) -> u32 {
    code.reverse_bits() >> (32 - size)
}

/// Writes tightly packed RGBA32 pixels to a PNG file.
pub fn save_png<P: AsRef<Path>>(path: P, width: u32, height: u32, data: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let w = BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    Ok(())
}

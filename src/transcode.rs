//! Output layouts and block writing for slice transcodes.

use alloc::format;

use crate::{
    basis_lz::{DecodedBlock, Decoder},
    color::Color32,
    container::SliceInfo,
    format::{BlockFormat, DecodeFlags, RasterFormat},
    target_formats::{
        astc, atc, bc1, bc4, bc7, channel_values, eac,
        raster::{self, RasterTarget},
    },
    Result, TranscodeError,
};

/// Where and how a single slice is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SliceLayout {
    /// Bytes from the start of one output block to the next, 0 for the
    /// block size. Ignored by raster formats.
    pub block_stride: usize,
    /// Output row pitch in blocks, or in pixels for raster formats. 0 for
    /// the width of the slice.
    pub row_pitch: u32,
    /// Output rows of raster formats, 0 for the height of the slice.
    pub rows: u32,
    /// Channel read by single channel formats. Defaults to green for alpha
    /// slices and to red otherwise.
    pub channel0: Option<usize>,
    /// Second channel of two channel formats, defaults to green.
    pub channel1: Option<usize>,
}

/// Where and how a whole image level is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelLayout {
    /// Output row pitch in blocks, or in pixels for uncompressed formats.
    /// 0 for the width of the level.
    pub row_pitch: u32,
    /// Output rows of uncompressed formats, 0 for the height of the level.
    pub rows: u32,
    pub decode_flags: DecodeFlags,
}

/// Output geometry with the defaults applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputPlan {
    Blocks {
        block_size: usize,
        stride: usize,
        row_pitch: usize,
        num_blocks_x: usize,
        num_blocks_y: usize,
    },
    Raster {
        format: RasterFormat,
        target: RasterTarget,
        rows: u32,
    },
}

impl OutputPlan {
    pub(crate) fn new(format: BlockFormat, slice: &SliceInfo, layout: &SliceLayout) -> Result<Self> {
        if let Some(raster) = format.raster() {
            let row_pitch = if layout.row_pitch == 0 { slice.orig_width } else { layout.row_pitch };
            let rows = if layout.rows == 0 { slice.orig_height } else { layout.rows };
            if row_pitch < slice.orig_width || rows < slice.orig_height {
                return Err(TranscodeError::InvalidLayout(format!(
                    "{}x{} pixel output can't hold a {}x{} slice",
                    row_pitch, rows, slice.orig_width, slice.orig_height
                )));
            }
            return Ok(OutputPlan::Raster {
                format: raster,
                target: RasterTarget {
                    width: slice.orig_width,
                    height: slice.orig_height,
                    row_pitch,
                },
                rows,
            });
        }

        let block_size = format.bytes_per_block();
        let stride = if layout.block_stride == 0 { block_size } else { layout.block_stride };
        if stride < block_size {
            return Err(TranscodeError::InvalidLayout(format!(
                "Block stride {} is smaller than the {} byte {} block",
                stride,
                block_size,
                format.name()
            )));
        }
        Self::blocks(block_size, stride, layout.row_pitch, slice)
    }

    /// Block grid of `slice` with already resolved block size and stride.
    pub(crate) fn blocks(block_size: usize, stride: usize, row_pitch: u32, slice: &SliceInfo) -> Result<Self> {
        let row_pitch = if row_pitch == 0 { slice.num_blocks_x } else { row_pitch };
        if row_pitch < slice.num_blocks_x {
            return Err(TranscodeError::InvalidLayout(format!(
                "Row pitch of {} blocks can't hold {} blocks",
                row_pitch, slice.num_blocks_x
            )));
        }
        Ok(OutputPlan::Blocks {
            block_size,
            stride,
            row_pitch: row_pitch as usize,
            num_blocks_x: slice.num_blocks_x as usize,
            num_blocks_y: slice.num_blocks_y as usize,
        })
    }

    /// Bytes touched by the transcode, counted from the start of the output.
    pub(crate) fn required_size(&self) -> usize {
        match *self {
            OutputPlan::Blocks {
                block_size,
                stride,
                row_pitch,
                num_blocks_x,
                num_blocks_y,
            } => {
                if num_blocks_x == 0 || num_blocks_y == 0 {
                    return 0;
                }
                let last_block = row_pitch * (num_blocks_y - 1) + num_blocks_x - 1;
                last_block * stride + block_size
            }
            OutputPlan::Raster { format, target, rows } => {
                target.row_pitch as usize * rows as usize * format.bytes_per_pixel()
            }
        }
    }

    pub(crate) fn check_capacity(&self, output: &[u8]) -> Result<()> {
        let needed = self.required_size();
        if output.len() < needed {
            return Err(TranscodeError::BufferTooSmall {
                needed,
                actual: output.len(),
            });
        }
        Ok(())
    }

    fn block_range(&self, block_x: u32, block_y: u32) -> Option<core::ops::Range<usize>> {
        match *self {
            OutputPlan::Blocks {
                block_size,
                stride,
                row_pitch,
                ..
            } => {
                let start = (block_y as usize * row_pitch + block_x as usize) * stride;
                Some(start..start + block_size)
            }
            OutputPlan::Raster { .. } => None,
        }
    }

    /// Writes the same block to every block position.
    pub(crate) fn fill(&self, output: &mut [u8], block: &[u8]) {
        if let OutputPlan::Blocks {
            num_blocks_x,
            num_blocks_y,
            ..
        } = *self
        {
            for block_y in 0..num_blocks_y as u32 {
                for block_x in 0..num_blocks_x as u32 {
                    if let Some(range) = self.block_range(block_x, block_y) {
                        output[range].copy_from_slice(block);
                    }
                }
            }
        }
    }
}

/// Resolved format, geometry and channel selection of one slice transcode.
pub(crate) struct BlockWriter {
    format: BlockFormat,
    plan: OutputPlan,
    channel0: usize,
    channel1: usize,
}

impl BlockWriter {
    pub(crate) fn new(format: BlockFormat, slice: &SliceInfo, layout: &SliceLayout) -> Result<Self> {
        let plan = OutputPlan::new(format, slice, layout)?;
        let default_channel = if slice.alpha_flag { 1 } else { 0 };
        let channel0 = layout.channel0.unwrap_or(default_channel);
        let channel1 = layout.channel1.unwrap_or(1);
        if channel0 > 3 || channel1 > 3 {
            return Err(TranscodeError::InvalidLayout(format!(
                "Invalid channels {} and {}",
                channel0, channel1
            )));
        }
        Ok(Self {
            format,
            plan,
            channel0,
            channel1,
        })
    }

    pub(crate) fn plan(&self) -> &OutputPlan {
        &self.plan
    }

    /// Writes one decoded block. `alpha` replaces the alpha channel of the
    /// decoded pixels.
    pub(crate) fn write(&self, output: &mut [u8], decoder: &Decoder, block: &DecodedBlock, alpha: Option<&[u8; 16]>) {
        if self.format == BlockFormat::Etc1 {
            if let Some(range) = self.plan.block_range(block.block_x, block.block_y) {
                output[range].copy_from_slice(&decoder.etc1_block(block));
            }
            return;
        }

        let mut pixels = decoder.block_pixels(block);
        if let Some(alpha) = alpha {
            for (p, &a) in pixels.iter_mut().zip(alpha.iter()) {
                p[3] = a;
            }
        }
        self.write_pixels(output, &pixels, block.block_x, block.block_y);
    }

    fn write_pixels(&self, output: &mut [u8], pixels: &[Color32; 16], block_x: u32, block_y: u32) {
        let range = match self.plan {
            OutputPlan::Raster { format, target, .. } => {
                raster::write_block(format, pixels, self.channel0, output, &target, block_x, block_y);
                return;
            }
            OutputPlan::Blocks { .. } => match self.plan.block_range(block_x, block_y) {
                Some(range) => range,
                None => return,
            },
        };
        let dst = &mut output[range];

        let (ch0, ch1) = (self.channel0, self.channel1);
        match self.format {
            BlockFormat::Etc2EacA8 | BlockFormat::EacR11 => {
                dst.copy_from_slice(&eac::encode_block(&channel_values(pixels, ch0)));
            }
            BlockFormat::Etc2EacRg11 => {
                dst[..8].copy_from_slice(&eac::encode_block(&channel_values(pixels, ch0)));
                dst[8..].copy_from_slice(&eac::encode_block(&channel_values(pixels, ch1)));
            }
            BlockFormat::Bc1 => dst.copy_from_slice(&bc1::encode_block(pixels)),
            BlockFormat::Bc4 => dst.copy_from_slice(&bc4::encode_block(&channel_values(pixels, ch0))),
            BlockFormat::Bc5 => {
                dst[..8].copy_from_slice(&bc4::encode_block(&channel_values(pixels, ch0)));
                dst[8..].copy_from_slice(&bc4::encode_block(&channel_values(pixels, ch1)));
            }
            BlockFormat::Bc7 => dst.copy_from_slice(&bc7::encode_block(pixels)),
            BlockFormat::Astc4x4 => dst.copy_from_slice(&astc::encode_block(pixels)),
            BlockFormat::AtcRgb => dst.copy_from_slice(&atc::encode_rgb_block(pixels)),
            // Written from the codebook directly, see `write`
            BlockFormat::Etc1 => {}
            // Rejected before decoding
            BlockFormat::Pvrtc1Rgb
            | BlockFormat::Pvrtc1Rgba
            | BlockFormat::Pvrtc2Rgb
            | BlockFormat::Pvrtc2Rgba
            | BlockFormat::Fxt1Rgb
            | BlockFormat::Raster(_) => {}
        }
    }
}

/// Block which decodes to a fully opaque alpha channel, for alpha halves
/// of files without alpha slices.
pub(crate) fn opaque_alpha_block(format: BlockFormat) -> Option<[u8; 8]> {
    match format {
        BlockFormat::Etc2EacA8 | BlockFormat::EacR11 => Some(eac::solid_block(255)),
        BlockFormat::Bc4 => Some(bc4::solid_block(255)),
        _ => None,
    }
}

/// Two channel format writing both halves of an interleaved pair from one
/// slice.
pub(crate) fn two_channel_format(format: BlockFormat) -> Option<BlockFormat> {
    match format {
        BlockFormat::Bc4 => Some(BlockFormat::Bc5),
        BlockFormat::EacR11 => Some(BlockFormat::Etc2EacRg11),
        _ => None,
    }
}

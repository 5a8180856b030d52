//! Output formats and how each composite format is assembled from slices.

use core::convert::TryFrom;
use core::ops::BitOr;

use crate::basis::TexFormat;
use crate::target_formats::{
    astc::ASTC_BLOCK_SIZE, atc::ATC_RGB_BLOCK_SIZE, bc1::BC1_BLOCK_SIZE, bc4::BC4_BLOCK_SIZE, bc7::BC7_BLOCK_SIZE,
    eac::EAC_BLOCK_SIZE,
};

pub use crate::target_formats::raster::RasterFormat;

/// Low level format written by a single slice transcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockFormat {
    Etc1,
    /// ETC2 EAC alpha block, the alpha half of ETC2 RGBA8
    Etc2EacA8,
    EacR11,
    Bc1,
    Bc4,
    /// Two BC4 blocks, from the two selected channels of one slice
    Bc5,
    /// Two R11 blocks, from the two selected channels of one slice
    Etc2EacRg11,
    Bc7,
    Astc4x4,
    AtcRgb,
    Pvrtc1Rgb,
    Pvrtc1Rgba,
    Pvrtc2Rgb,
    Pvrtc2Rgba,
    Fxt1Rgb,
    Raster(RasterFormat),
}

impl BlockFormat {
    /// Size of one block, or of one pixel for raster formats.
    pub const fn bytes_per_block(self) -> usize {
        match self {
            BlockFormat::Etc1 => 8,
            BlockFormat::Etc2EacA8 | BlockFormat::EacR11 => EAC_BLOCK_SIZE,
            BlockFormat::Bc1 => BC1_BLOCK_SIZE,
            BlockFormat::Bc4 => BC4_BLOCK_SIZE,
            BlockFormat::Bc5 => 2 * BC4_BLOCK_SIZE,
            BlockFormat::Etc2EacRg11 => 2 * EAC_BLOCK_SIZE,
            BlockFormat::Bc7 => BC7_BLOCK_SIZE,
            BlockFormat::Astc4x4 => ASTC_BLOCK_SIZE,
            BlockFormat::AtcRgb => ATC_RGB_BLOCK_SIZE,
            BlockFormat::Pvrtc1Rgb | BlockFormat::Pvrtc1Rgba => 8,
            BlockFormat::Pvrtc2Rgb | BlockFormat::Pvrtc2Rgba => 8,
            BlockFormat::Fxt1Rgb => 16,
            BlockFormat::Raster(raster) => raster.bytes_per_pixel(),
        }
    }

    pub const fn block_width(self) -> u32 {
        match self {
            BlockFormat::Fxt1Rgb => 8,
            BlockFormat::Raster(_) => 1,
            _ => 4,
        }
    }

    pub const fn block_height(self) -> u32 {
        match self {
            BlockFormat::Raster(_) => 1,
            _ => 4,
        }
    }

    pub const fn raster(self) -> Option<RasterFormat> {
        match self {
            BlockFormat::Raster(raster) => Some(raster),
            _ => None,
        }
    }

    /// Whether this crate can write the format.
    pub const fn has_encoder(self) -> bool {
        !matches!(
            self,
            BlockFormat::Pvrtc1Rgb
                | BlockFormat::Pvrtc1Rgba
                | BlockFormat::Pvrtc2Rgb
                | BlockFormat::Pvrtc2Rgba
                | BlockFormat::Fxt1Rgb
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            BlockFormat::Etc1 => "ETC1",
            BlockFormat::Etc2EacA8 => "ETC2 EAC A8",
            BlockFormat::EacR11 => "EAC R11",
            BlockFormat::Bc1 => "BC1",
            BlockFormat::Bc4 => "BC4",
            BlockFormat::Bc5 => "BC5",
            BlockFormat::Etc2EacRg11 => "EAC RG11",
            BlockFormat::Bc7 => "BC7",
            BlockFormat::Astc4x4 => "ASTC 4x4",
            BlockFormat::AtcRgb => "ATC RGB",
            BlockFormat::Pvrtc1Rgb => "PVRTC1 RGB",
            BlockFormat::Pvrtc1Rgba => "PVRTC1 RGBA",
            BlockFormat::Pvrtc2Rgb => "PVRTC2 RGB",
            BlockFormat::Pvrtc2Rgba => "PVRTC2 RGBA",
            BlockFormat::Fxt1Rgb => "FXT1 RGB",
            BlockFormat::Raster(RasterFormat::Rgba32) => "RGBA32",
            BlockFormat::Raster(RasterFormat::Rgb32) => "RGB32",
            BlockFormat::Raster(RasterFormat::A32) => "A32",
            BlockFormat::Raster(RasterFormat::Rgb565) => "RGB565",
            BlockFormat::Raster(RasterFormat::Bgr565) => "BGR565",
            BlockFormat::Raster(RasterFormat::Rgba4444Color) => "RGBA4444 color",
            BlockFormat::Raster(RasterFormat::Rgba4444Alpha) => "RGBA4444 alpha",
            BlockFormat::Raster(RasterFormat::Rgba4444ColorOpaque) => "RGBA4444 opaque color",
        }
    }
}

/// GPU facing output formats, numbered like `basist::transcoder_texture_format`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscoderTextureFormat {
    Etc1Rgb = 0,
    Etc2Rgba = 1,
    Bc1Rgb = 2,
    Bc3Rgba = 3,
    Bc4R = 4,
    Bc5Rg = 5,
    Bc7Rgba = 6,
    Pvrtc1Rgb = 8,
    Pvrtc1Rgba = 9,
    AstcRgba = 10,
    AtcRgb = 11,
    AtcRgba = 12,
    Rgba32 = 13,
    Rgb565 = 14,
    Bgr565 = 15,
    Rgba4444 = 16,
    Fxt1Rgb = 17,
    Pvrtc2Rgb = 18,
    Pvrtc2Rgba = 19,
    EacR11 = 20,
    EacRg11 = 21,
}

/// How the colour and alpha slices of an image level end up in the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlicePairing {
    /// Only the colour slice is transcoded.
    Single,
    /// Every output block is a colour block and an alpha block at the given
    /// byte offsets.
    Interleaved { color_offset: usize, alpha_offset: usize },
    /// Raster output, the alpha slice is written over the colour pixels.
    Merged,
    /// Both slices are decoded and encoded together.
    Joint,
}

/// Where the second channel comes from when the file has no alpha slices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaFallback {
    /// Fully opaque alpha.
    Opaque,
    /// A channel of the colour slice.
    ColorChannel(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatCapability {
    pub color: BlockFormat,
    pub alpha: Option<BlockFormat>,
    pub pairing: SlicePairing,
    pub alpha_fallback: AlphaFallback,
    pub requires_pow2: bool,
}

impl FormatCapability {
    const fn single(color: BlockFormat) -> Self {
        Self {
            color,
            alpha: None,
            pairing: SlicePairing::Single,
            alpha_fallback: AlphaFallback::Opaque,
            requires_pow2: false,
        }
    }

    const fn joint(color: BlockFormat) -> Self {
        Self {
            pairing: SlicePairing::Joint,
            ..Self::single(color)
        }
    }

    const fn interleaved(color: BlockFormat, alpha: BlockFormat, color_offset: usize, alpha_offset: usize) -> Self {
        Self {
            color,
            alpha: Some(alpha),
            pairing: SlicePairing::Interleaved {
                color_offset,
                alpha_offset,
            },
            alpha_fallback: AlphaFallback::Opaque,
            requires_pow2: false,
        }
    }

    const fn merged(color: RasterFormat, alpha: RasterFormat) -> Self {
        Self {
            color: BlockFormat::Raster(color),
            alpha: Some(BlockFormat::Raster(alpha)),
            pairing: SlicePairing::Merged,
            alpha_fallback: AlphaFallback::Opaque,
            requires_pow2: false,
        }
    }

    const fn pow2(self) -> Self {
        Self {
            requires_pow2: true,
            ..self
        }
    }

    const fn with_fallback(self, alpha_fallback: AlphaFallback) -> Self {
        Self { alpha_fallback, ..self }
    }

    /// Whether every block format involved can be written.
    pub const fn has_encoder(&self) -> bool {
        self.color.has_encoder()
            && match self.alpha {
                Some(alpha) => alpha.has_encoder(),
                None => true,
            }
    }
}

impl TranscoderTextureFormat {
    pub const ALL: [TranscoderTextureFormat; 21] = [
        TranscoderTextureFormat::Etc1Rgb,
        TranscoderTextureFormat::Etc2Rgba,
        TranscoderTextureFormat::Bc1Rgb,
        TranscoderTextureFormat::Bc3Rgba,
        TranscoderTextureFormat::Bc4R,
        TranscoderTextureFormat::Bc5Rg,
        TranscoderTextureFormat::Bc7Rgba,
        TranscoderTextureFormat::Pvrtc1Rgb,
        TranscoderTextureFormat::Pvrtc1Rgba,
        TranscoderTextureFormat::AstcRgba,
        TranscoderTextureFormat::AtcRgb,
        TranscoderTextureFormat::AtcRgba,
        TranscoderTextureFormat::Rgba32,
        TranscoderTextureFormat::Rgb565,
        TranscoderTextureFormat::Bgr565,
        TranscoderTextureFormat::Rgba4444,
        TranscoderTextureFormat::Fxt1Rgb,
        TranscoderTextureFormat::Pvrtc2Rgb,
        TranscoderTextureFormat::Pvrtc2Rgba,
        TranscoderTextureFormat::EacR11,
        TranscoderTextureFormat::EacRg11,
    ];

    pub const fn capability(self) -> FormatCapability {
        use BlockFormat as B;
        use FormatCapability as C;
        use TranscoderTextureFormat as T;
        match self {
            T::Etc1Rgb => C::single(B::Etc1),
            T::Etc2Rgba => C::interleaved(B::Etc1, B::Etc2EacA8, 8, 0),
            T::Bc1Rgb => C::single(B::Bc1),
            T::Bc3Rgba => C::interleaved(B::Bc1, B::Bc4, 8, 0),
            T::Bc4R => C::single(B::Bc4),
            T::Bc5Rg => C::interleaved(B::Bc4, B::Bc4, 0, 8).with_fallback(AlphaFallback::ColorChannel(1)),
            T::Bc7Rgba => C::joint(B::Bc7),
            T::Pvrtc1Rgb => C::single(B::Pvrtc1Rgb).pow2(),
            T::Pvrtc1Rgba => C::joint(B::Pvrtc1Rgba).pow2(),
            T::AstcRgba => C::joint(B::Astc4x4),
            T::AtcRgb => C::single(B::AtcRgb),
            T::AtcRgba => C::interleaved(B::AtcRgb, B::Bc4, 8, 0),
            T::Rgba32 => C::merged(RasterFormat::Rgba32, RasterFormat::A32),
            T::Rgb565 => C::single(B::Raster(RasterFormat::Rgb565)),
            T::Bgr565 => C::single(B::Raster(RasterFormat::Bgr565)),
            T::Rgba4444 => C::merged(RasterFormat::Rgba4444ColorOpaque, RasterFormat::Rgba4444Alpha),
            T::Fxt1Rgb => C::single(B::Fxt1Rgb),
            T::Pvrtc2Rgb => C::single(B::Pvrtc2Rgb),
            T::Pvrtc2Rgba => C::joint(B::Pvrtc2Rgba),
            T::EacR11 => C::single(B::EacR11),
            T::EacRg11 => {
                C::interleaved(B::EacR11, B::EacR11, 0, 8).with_fallback(AlphaFallback::ColorChannel(1))
            }
        }
    }

    /// Size of one output block, or of one pixel for uncompressed formats.
    pub const fn bytes_per_block_or_pixel(self) -> usize {
        let cap = self.capability();
        match (cap.pairing, cap.alpha) {
            (SlicePairing::Interleaved { .. }, Some(alpha)) => {
                cap.color.bytes_per_block() + alpha.bytes_per_block()
            }
            _ => cap.color.bytes_per_block(),
        }
    }

    pub const fn block_width(self) -> u32 {
        self.capability().color.block_width()
    }

    pub const fn block_height(self) -> u32 {
        self.capability().color.block_height()
    }

    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            TranscoderTextureFormat::Etc2Rgba
                | TranscoderTextureFormat::Bc3Rgba
                | TranscoderTextureFormat::Bc7Rgba
                | TranscoderTextureFormat::Pvrtc1Rgba
                | TranscoderTextureFormat::AstcRgba
                | TranscoderTextureFormat::AtcRgba
                | TranscoderTextureFormat::Rgba32
                | TranscoderTextureFormat::Rgba4444
                | TranscoderTextureFormat::Pvrtc2Rgba
        )
    }

    pub const fn is_uncompressed(self) -> bool {
        matches!(
            self,
            TranscoderTextureFormat::Rgba32
                | TranscoderTextureFormat::Rgb565
                | TranscoderTextureFormat::Bgr565
                | TranscoderTextureFormat::Rgba4444
        )
    }

    /// Whether files with `tex_format` slices can be transcoded to this
    /// format.
    pub const fn is_supported_for(self, tex_format: TexFormat) -> bool {
        matches!(tex_format, TexFormat::ETC1S) && self.capability().has_encoder()
    }
}

impl TryFrom<u32> for TranscoderTextureFormat {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        TranscoderTextureFormat::ALL
            .iter()
            .copied()
            .find(|&f| f as u32 == value)
            .ok_or(value)
    }
}

/// Flags of [crate::LevelLayout], numbered like `basist::basisu_decode_flags`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DecodeFlags(u32);

impl DecodeFlags {
    pub const NONE: DecodeFlags = DecodeFlags(0);

    /// Transcode the alpha slice instead of the colour slice when writing a
    /// format without alpha.
    pub const TRANSCODE_ALPHA_DATA_TO_OPAQUE_FORMATS: DecodeFlags = DecodeFlags(4);

    pub const fn from_bits(bits: u32) -> Self {
        DecodeFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: DecodeFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DecodeFlags {
    type Output = DecodeFlags;

    fn bitor(self, rhs: DecodeFlags) -> DecodeFlags {
        DecodeFlags(self.0 | rhs.0)
    }
}

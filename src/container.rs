//! Parsed view of a `.basis` file: header, slice table and image levels.

use alloc::{format, vec, vec::Vec};
use core::convert::TryFrom;

use crate::{
    basis::{Header, SliceDesc, TexFormat, TextureType},
    validate::{in_bounds, read_header},
    Result, TranscodeError,
};

/// One compressed slice, the colour or alpha data of one image level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceInfo {
    pub orig_width: u32,
    pub orig_height: u32,
    /// Width padded to whole blocks
    pub width: u32,
    /// Height padded to whole blocks
    pub height: u32,
    pub num_blocks_x: u32,
    pub num_blocks_y: u32,
    pub total_blocks: u32,
    pub compressed_size: u32,
    pub slice_index: u32,
    pub image_index: u32,
    pub level_index: u32,
    pub unpacked_slice_crc16: u16,
    pub alpha_flag: bool,
    pub iframe_flag: bool,
    pub file_ofs: u32,
}

impl SliceInfo {
    fn new(slice_index: u32, desc: &SliceDesc) -> Self {
        let num_blocks_x = desc.num_blocks_x as u32;
        let num_blocks_y = desc.num_blocks_y as u32;
        Self {
            orig_width: desc.orig_width as u32,
            orig_height: desc.orig_height as u32,
            width: num_blocks_x * 4,
            height: num_blocks_y * 4,
            num_blocks_x,
            num_blocks_y,
            total_blocks: num_blocks_x * num_blocks_y,
            compressed_size: desc.file_size,
            slice_index,
            image_index: desc.image_index,
            level_index: desc.level_index as u32,
            unpacked_slice_crc16: desc.slice_data_crc16,
            alpha_flag: desc.has_alpha(),
            iframe_flag: desc.is_iframe(),
            file_ofs: desc.file_ofs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageLevelDesc {
    pub orig_width: u32,
    pub orig_height: u32,
    pub total_blocks: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageLevelInfo {
    pub image_index: u32,
    pub level_index: u32,
    pub orig_width: u32,
    pub orig_height: u32,
    pub width: u32,
    pub height: u32,
    pub num_blocks_x: u32,
    pub num_blocks_y: u32,
    pub total_blocks: u32,
    pub first_slice_index: u32,
    pub alpha_flag: bool,
    pub iframe_flag: bool,
}

/// Image summary, dimensions are those of level 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub image_index: u32,
    pub total_levels: u32,
    pub orig_width: u32,
    pub orig_height: u32,
    pub width: u32,
    pub height: u32,
    pub num_blocks_x: u32,
    pub num_blocks_y: u32,
    pub total_blocks: u32,
    pub first_slice_index: u32,
    pub alpha_flag: bool,
    pub iframe_flag: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileInfo<'c> {
    pub version: u32,
    /// Header plus slice table
    pub total_header_size: u32,
    pub total_selectors: u32,
    pub selector_codebook_size: u32,
    pub total_endpoints: u32,
    pub endpoint_codebook_size: u32,
    pub tables_size: u32,
    /// Sum of the compressed slice sizes, payloads may overlap so this can
    /// exceed the file size
    pub slices_size: u64,
    pub texture_type: TextureType,
    pub us_per_frame: u32,
    pub userdata: (u32, u32),
    pub total_images: u32,
    pub y_flipped: bool,
    pub etc1s: bool,
    pub has_alpha_slices: bool,
    pub tex_format: TexFormat,
    pub slices: &'c [SliceInfo],
    /// Level count of every image
    pub image_mipmap_levels: &'c [u32],
}

/// Values identifying one file, used to tell whether a session was started
/// for the same file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContainerKey {
    header_crc16: u16,
    data_crc16: u16,
    data_size: u32,
    total_slices: u32,
}

/// A parsed `.basis` file borrowing its encoded bytes.
#[derive(Clone, Debug)]
pub struct Container<'a> {
    bytes: &'a [u8],
    header: Header,
    texture_type: TextureType,
    tex_format: TexFormat,
    slice_descs: Vec<SliceDesc>,
    slices: Vec<SliceInfo>,
    image_levels: Vec<u32>,
}

impl<'a> Container<'a> {
    /// Parses the header and the slice table. Codebooks are not decoded.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header = read_header(bytes)?;

        let texture_type = TextureType::try_from(header.tex_type)
            .map_err(|t| TranscodeError::malformed(format!("Unknown texture type {}", t)))?;
        let tex_format = TexFormat::try_from(header.tex_format)
            .map_err(|f| TranscodeError::malformed(format!("Unknown texture format {}", f)))?;

        if tex_format == TexFormat::ETC1S {
            let sections = [
                ("Endpoint codebook", header.endpoint_cb_file_ofs, header.endpoint_cb_file_size),
                ("Selector codebook", header.selector_cb_file_ofs, header.selector_cb_file_size),
                ("Huffman tables", header.tables_file_ofs, header.tables_file_size),
            ];
            for &(name, ofs, size) in sections.iter() {
                if !in_bounds(bytes.len(), ofs, size as u64) {
                    return Err(TranscodeError::malformed(format!(
                        "{} at {} with {} bytes is out of bounds",
                        name, ofs, size
                    )));
                }
            }
        }

        let slice_count = header.total_slices as usize;
        let mut slice_descs = Vec::with_capacity(slice_count);
        let mut slices = Vec::with_capacity(slice_count);
        let mut image_levels = vec![0u32; header.total_images as usize];

        for i in 0..slice_count {
            let start = header.slice_desc_file_ofs as usize + i * SliceDesc::FILE_SIZE;
            let desc = SliceDesc::from_bytes(&bytes[start..]);

            if !in_bounds(bytes.len(), desc.file_ofs, desc.file_size as u64) {
                return Err(TranscodeError::malformed(format!(
                    "Slice {} data at {} with {} bytes is out of bounds",
                    i, desc.file_ofs, desc.file_size
                )));
            }
            if desc.image_index >= header.total_images {
                return Err(TranscodeError::malformed(format!(
                    "Slice {} belongs to image {}, file has {} images",
                    i, desc.image_index, header.total_images
                )));
            }
            let expected_blocks_x = (desc.orig_width as u32 + 3) / 4;
            let expected_blocks_y = (desc.orig_height as u32 + 3) / 4;
            if desc.num_blocks_x as u32 != expected_blocks_x || desc.num_blocks_y as u32 != expected_blocks_y {
                return Err(TranscodeError::malformed(format!(
                    "Slice {} is {}x{} pixels but has {}x{} blocks",
                    i, desc.orig_width, desc.orig_height, desc.num_blocks_x, desc.num_blocks_y
                )));
            }

            let levels = &mut image_levels[desc.image_index as usize];
            *levels = (*levels).max(desc.level_index as u32 + 1);

            slices.push(SliceInfo::new(i as u32, &desc));
            slice_descs.push(desc);
        }

        if tex_format == TexFormat::ETC1S && header.has_alpha_slices() {
            if slice_count % 2 != 0 {
                return Err(TranscodeError::malformed(format!(
                    "File has alpha slices but an odd slice count {}",
                    slice_count
                )));
            }
            for pair in slices.chunks_exact(2) {
                let (color, alpha) = (&pair[0], &pair[1]);
                if color.alpha_flag
                    || !alpha.alpha_flag
                    || color.image_index != alpha.image_index
                    || color.level_index != alpha.level_index
                    || (color.orig_width, color.orig_height) != (alpha.orig_width, alpha.orig_height)
                {
                    return Err(TranscodeError::malformed(format!(
                        "Slices {} and {} are not a colour and alpha pair",
                        color.slice_index, alpha.slice_index
                    )));
                }
            }
        }

        Ok(Self {
            bytes,
            header,
            texture_type,
            tex_format,
            slice_descs,
            slices,
            image_levels,
        })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn userdata(&self) -> (u32, u32) {
        (self.header.userdata0, self.header.userdata1)
    }

    pub fn total_images(&self) -> u32 {
        self.header.total_images
    }

    pub fn tex_format(&self) -> TexFormat {
        self.tex_format
    }

    pub fn has_alpha_slices(&self) -> bool {
        self.header.has_alpha_slices()
    }

    pub fn is_video(&self) -> bool {
        self.texture_type == TextureType::VideoFrames
    }

    pub fn y_flipped(&self) -> bool {
        self.header.has_y_flipped()
    }

    pub fn slices(&self) -> &[SliceInfo] {
        &self.slices
    }

    pub(crate) fn slice_desc(&self, slice_index: usize) -> Option<&SliceDesc> {
        self.slice_descs.get(slice_index)
    }

    pub(crate) fn key(&self) -> ContainerKey {
        ContainerKey {
            header_crc16: self.header.header_crc16,
            data_crc16: self.header.data_crc16,
            data_size: self.header.data_size,
            total_slices: self.header.total_slices,
        }
    }

    /// Number of mip levels of `image_index`, 0 for unknown images.
    pub fn total_image_levels(&self, image_index: u32) -> u32 {
        self.image_levels.get(image_index as usize).copied().unwrap_or(0)
    }

    /// Index of the first slice of the given image level whose alpha flag
    /// equals `alpha`.
    pub fn find_slice(&self, image_index: u32, level_index: u32, alpha: bool) -> Option<usize> {
        self.slices
            .iter()
            .position(|s| s.image_index == image_index && s.level_index == level_index && s.alpha_flag == alpha)
    }

    fn first_slice(&self, image_index: u32, level_index: u32) -> Option<&SliceInfo> {
        self.find_slice(image_index, level_index, false)
            .or_else(|| {
                // UASTC files with alpha flag every slice
                self.find_slice(image_index, level_index, true)
            })
            .map(|i| &self.slices[i])
    }

    pub fn image_level_desc(&self, image_index: u32, level_index: u32) -> Option<ImageLevelDesc> {
        let slice = self.first_slice(image_index, level_index)?;
        Some(ImageLevelDesc {
            orig_width: slice.orig_width,
            orig_height: slice.orig_height,
            total_blocks: slice.total_blocks,
        })
    }

    pub fn image_level_info(&self, image_index: u32, level_index: u32) -> Option<ImageLevelInfo> {
        let slice = self.first_slice(image_index, level_index)?;
        Some(ImageLevelInfo {
            image_index,
            level_index,
            orig_width: slice.orig_width,
            orig_height: slice.orig_height,
            width: slice.width,
            height: slice.height,
            num_blocks_x: slice.num_blocks_x,
            num_blocks_y: slice.num_blocks_y,
            total_blocks: slice.total_blocks,
            first_slice_index: slice.slice_index,
            alpha_flag: self.has_alpha_slices(),
            iframe_flag: slice.iframe_flag,
        })
    }

    pub fn image_info(&self, image_index: u32) -> Option<ImageInfo> {
        let level = self.image_level_info(image_index, 0)?;
        Some(ImageInfo {
            image_index,
            total_levels: self.total_image_levels(image_index),
            orig_width: level.orig_width,
            orig_height: level.orig_height,
            width: level.width,
            height: level.height,
            num_blocks_x: level.num_blocks_x,
            num_blocks_y: level.num_blocks_y,
            total_blocks: level.total_blocks,
            first_slice_index: level.first_slice_index,
            alpha_flag: level.alpha_flag,
            iframe_flag: level.iframe_flag,
        })
    }

    pub fn file_info(&self) -> FileInfo<'_> {
        let header = &self.header;
        FileInfo {
            version: header.ver as u32,
            total_header_size: (Header::FILE_SIZE + self.slices.len() * SliceDesc::FILE_SIZE) as u32,
            total_selectors: header.total_selectors as u32,
            selector_codebook_size: header.selector_cb_file_size,
            total_endpoints: header.total_endpoints as u32,
            endpoint_codebook_size: header.endpoint_cb_file_size,
            tables_size: header.tables_file_size,
            slices_size: self.slices.iter().map(|s| s.compressed_size as u64).sum(),
            texture_type: self.texture_type,
            us_per_frame: header.us_per_frame,
            userdata: self.userdata(),
            total_images: header.total_images,
            y_flipped: self.y_flipped(),
            etc1s: header.is_etc1s(),
            has_alpha_slices: self.has_alpha_slices(),
            tex_format: self.tex_format,
            slices: &self.slices,
            image_mipmap_levels: &self.image_levels,
        }
    }
}

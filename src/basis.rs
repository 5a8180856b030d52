use core::convert::TryFrom;

use crate::bytereader::ByteReaderLe;

/// basis_file_header::m_tex_type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureType {
    /// Arbitrary array of 2D images, each may have its own resolution and mip count
    Type2D = 0,
    /// Array of 2D images sharing resolution and mip count
    Type2DArray = 1,
    /// Cubemap faces in X+, X-, Y+, Y-, Z+, Z- order, image count divisible by 6
    CubemapArray = 2,
    VideoFrames = 3,
    /// Z dimension is the image count
    Volume = 4,
}

impl TryFrom<u8> for TextureType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TextureType::Type2D),
            1 => Ok(TextureType::Type2DArray),
            2 => Ok(TextureType::CubemapArray),
            3 => Ok(TextureType::VideoFrames),
            4 => Ok(TextureType::Volume),
            other => Err(other),
        }
    }
}

/// basis_file_header::m_tex_format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexFormat {
    ETC1S = 0,
    UASTC4x4 = 1,
}

impl TryFrom<u8> for TexFormat {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TexFormat::ETC1S),
            1 => Ok(TexFormat::UASTC4x4),
            other => Err(other),
        }
    }
}

// basis_slice_desc::flags
pub enum SliceDescFlags {
    HasAlpha = 1,
    FrameIsIFrame = 2,
}

// basis_file_header::m_flags
pub enum HeaderFlags {
    ETC1S = 1,
    YFlipped = 2,
    HasAlphaSlices = 4,
}

pub const SIG: u16 = 0x4273;

/// The only container version this transcoder understands.
pub const SUPPORTED_VERSION: u16 = 0x13;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
    pub sig: u16,                  // 2 byte file signature
    pub ver: u16,                  // File version
    pub header_size: u16,          // Header size in bytes, sizeof(basis_file_header) or 0x4D
    pub header_crc16: u16,         // CRC16 of the remaining header data

    pub data_size: u32,            // The total size of all data after the header
    pub data_crc16: u16,           // The CRC16 of all data after the header

    pub total_slices: u32, /*24*/  // The number of compressed slices
    pub total_images: u32, /*24*/  // The total # of images

    pub tex_format: u8,            // enum TexFormat
    pub flags: u16,                // enum HeaderFlags
    pub tex_type: u8,              // enum TextureType
    pub us_per_frame: u32, /*24*/  // Video: microseconds per frame

    pub reserved: u32,
    pub userdata0: u32,
    pub userdata1: u32,

    pub total_endpoints: u16,               // ETC1S: The number of endpoints in the endpoint codebook
    pub endpoint_cb_file_ofs: u32,          // ETC1S: The compressed endpoint codebook's file offset relative to the header
    pub endpoint_cb_file_size: u32, /*24*/  // ETC1S: The compressed endpoint codebook's size in bytes

    pub total_selectors: u16,               // ETC1S: The number of selectors in the selector codebook
    pub selector_cb_file_ofs: u32,          // ETC1S: The compressed selector codebook's file offset relative to the header
    pub selector_cb_file_size: u32, /*24*/  // ETC1S: The compressed selector codebook's size in bytes

    pub tables_file_ofs: u32,               // ETC1S: The file offset of the compressed Huffman codelength tables
    pub tables_file_size: u32,              // ETC1S: The file size in bytes of the compressed Huffman codelength tables

    pub slice_desc_file_ofs: u32,           // The file offset to the slice description array, usually follows the header
    pub extended_file_ofs: u32,
    pub extended_file_size: u32,
}

impl Header {
    pub const FILE_SIZE: usize = 77;

    /// Offset of the first byte covered by the header CRC16.
    pub const CRC_START: usize = 8;

    pub fn check_size(buf: &[u8]) -> bool {
        buf.len() >= Self::FILE_SIZE
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        assert!(Self::check_size(buf));
        let r = &mut ByteReaderLe::new(buf);
        Self {
            sig: r.read_u16(),
            ver: r.read_u16(),
            header_size: r.read_u16(),
            header_crc16: r.read_u16(),

            data_size: r.read_u32(),
            data_crc16: r.read_u16(),

            total_slices: r.read_u24(),
            total_images: r.read_u24(),

            tex_format: r.read_u8(),
            flags: r.read_u16(),
            tex_type: r.read_u8(),
            us_per_frame: r.read_u24(),

            reserved: r.read_u32(),
            userdata0: r.read_u32(),
            userdata1: r.read_u32(),

            total_endpoints: r.read_u16(),
            endpoint_cb_file_ofs: r.read_u32(),
            endpoint_cb_file_size: r.read_u24(),

            total_selectors: r.read_u16(),
            selector_cb_file_ofs: r.read_u32(),
            selector_cb_file_size: r.read_u24(),

            tables_file_ofs: r.read_u32(),
            tables_file_size: r.read_u32(),

            slice_desc_file_ofs: r.read_u32(),
            extended_file_ofs: r.read_u32(),
            extended_file_size: r.read_u32(),
        }
    }

    pub fn has_alpha_slices(&self) -> bool {
        self.flags & HeaderFlags::HasAlphaSlices as u16 != 0
    }

    pub fn has_y_flipped(&self) -> bool {
        self.flags & HeaderFlags::YFlipped as u16 != 0
    }

    pub fn is_etc1s(&self) -> bool {
        self.flags & HeaderFlags::ETC1S as u16 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceDesc {
    pub image_index: u32, /*24*/
    pub level_index: u8,
    pub flags: u8,

    pub orig_width: u16,
    pub orig_height: u16,

    pub num_blocks_x: u16,
    pub num_blocks_y: u16,

    pub file_ofs: u32,
    pub file_size: u32,

    pub slice_data_crc16: u16,
}

impl SliceDesc {
    pub const FILE_SIZE: usize = 23;

    pub fn check_size(buf: &[u8]) -> bool {
        buf.len() >= Self::FILE_SIZE
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        assert!(Self::check_size(buf));
        let r = &mut ByteReaderLe::new(buf);
        Self {
            image_index: r.read_u24(),
            level_index: r.read_u8(),
            flags: r.read_u8(),
            orig_width: r.read_u16(),
            orig_height: r.read_u16(),
            num_blocks_x: r.read_u16(),
            num_blocks_y: r.read_u16(),
            file_ofs: r.read_u32(),
            file_size: r.read_u32(),
            slice_data_crc16: r.read_u16(),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.flags & SliceDescFlags::HasAlpha as u8 != 0
    }

    pub fn is_iframe(&self) -> bool {
        self.flags & SliceDescFlags::FrameIsIFrame as u8 != 0
    }
}

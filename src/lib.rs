#![cfg_attr(not(feature = "std"), no_std)]
#![warn(clippy::all)]

//! Basis Universal `.basis` container parser and transcoder.
//!
//! [Container] parses a file without decoding anything, [validate_header]
//! and [validate_file_checksums] check it. A [Transcoder] session decodes
//! the ETC1S codebooks of a file once in [Transcoder::start_transcoding]
//! and then writes slices or whole image levels into GPU block formats or
//! raw pixels.

extern crate alloc;

use alloc::{sync::Arc, vec::Vec};

mod basis;
mod basis_lz;
mod bitreader;
mod bitwriter;
mod bytereader;
mod color;
mod container;
mod error;
mod format;
mod session;
mod target_formats;
mod transcode;
mod validate;

pub use basis::{Header, SliceDesc, TexFormat, TextureType};
pub use basis_lz::{GlobalSelectorCodebook, GLOBAL_SELECTOR_MODIFIER_BITS};
pub use container::{Container, FileInfo, ImageInfo, ImageLevelDesc, ImageLevelInfo, SliceInfo};
pub use error::{ChecksumRegion, TranscodeError};
pub use format::{
    AlphaFallback, BlockFormat, DecodeFlags, FormatCapability, RasterFormat, SlicePairing, TranscoderTextureFormat,
};
pub use session::{SessionState, Transcoder};
pub use transcode::{LevelLayout, SliceLayout};
pub use validate::{check_file_checksums, validate_file_checksums, validate_header};

pub type Result<T> = core::result::Result<T, TranscodeError>;

pub struct Image<T> {
    pub w: u32,
    pub h: u32,
    pub data: Vec<T>,
}

/// Verifies the checksums of an ETC1S file and decodes the first level of
/// every image to RGBA32.
///
/// Files referencing the global selector codebook need a [Transcoder]
/// created with that codebook instead.
pub fn decode_to_rgba(bytes: &[u8]) -> Result<Vec<Image<u8>>> {
    check_file_checksums(bytes, true)?;
    let container = Container::parse(bytes)?;

    let mut transcoder = Transcoder::new(Arc::new(GlobalSelectorCodebook::default()));
    transcoder.start_transcoding(&container)?;

    let mut images = Vec::with_capacity(container.total_images() as usize);
    for image_index in 0..container.total_images() {
        let desc = container
            .image_level_desc(image_index, 0)
            .ok_or(TranscodeError::SliceNotFound {
                image_index,
                level_index: 0,
                alpha: false,
            })?;
        let data =
            transcoder.transcode_image_level_to_vec(&container, image_index, 0, TranscoderTextureFormat::Rgba32)?;
        images.push(Image {
            w: desc.orig_width,
            h: desc.orig_height,
            data,
        });
    }
    Ok(images)
}

/// CRC16 used by `.basis` headers, `crc` is the running value of a
/// previous call or 0.
pub fn crc16(r: &[u8], mut crc: u16) -> u16 {
    crc = !crc;
    for &b in r {
        let q: u16 = (b as u16) ^ (crc >> 8);
        let k: u16 = (q >> 4) ^ q;
        crc = (((crc << 8) ^ k) ^ (k << 5)) ^ (k << 12);
    }
    !crc
}

#[doc(hidden)]
#[macro_export]
macro_rules! mask {
    ($size:expr) => {
        !(!($size ^ $size)).checked_shl($size as u32).unwrap_or(0)
    };
}

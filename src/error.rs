use alloc::string::String;
use thiserror::Error;

use crate::basis::TexFormat;

/// Errors reported by the container parser, the validator and the transcoder.
///
/// Every failure is returned to the immediate caller, nothing is retried
/// internally. Malformed input stays malformed, calling again with the same
/// bytes yields the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    /// The header or the slice table is inconsistent with the buffer.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// The ETC1S endpoint/selector codebooks or the slice Huffman tables
    /// could not be decoded. The session stays unusable for this file.
    #[error("Corrupt codebook: {0}")]
    CorruptCodebook(String),

    /// A slice payload could not be decoded with the session's codebooks.
    #[error("Corrupt slice {slice_index}: {reason}")]
    CorruptSlice { slice_index: usize, reason: String },

    #[error("Transcoding was not started, call start_transcoding first")]
    NotStarted,

    #[error("Transcoding was already started for a different file")]
    AlreadyStarted,

    #[error("No slice found for image {image_index}, level {level_index} (alpha: {alpha})")]
    SliceNotFound {
        image_index: u32,
        level_index: u32,
        alpha: bool,
    },

    #[error("Slice index {index} out of range, file has {total} slices")]
    InvalidSliceIndex { index: usize, total: usize },

    #[error("Output buffer too small: need {needed} bytes, but only {actual} bytes available")]
    BufferTooSmall { needed: usize, actual: usize },

    /// Row pitch or row count smaller than the slice it has to hold.
    #[error("Invalid output layout: {0}")]
    InvalidLayout(String),

    #[error("Format requires power of two dimensions, got {width}x{height}")]
    UnsupportedDimension { width: u32, height: u32 },

    #[error("No encoder available for {0}")]
    UnsupportedFormat(&'static str),

    #[error("Transcoding {0:?} slices is not supported")]
    UnsupportedTexFormat(TexFormat),

    #[error("{0} CRC16 mismatch")]
    ChecksumMismatch(ChecksumRegion),
}

/// Part of the file covered by a failed checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumRegion {
    Header,
    Data,
}

impl core::fmt::Display for ChecksumRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChecksumRegion::Header => write!(f, "Header"),
            ChecksumRegion::Data => write!(f, "Data"),
        }
    }
}

impl TranscodeError {
    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        TranscodeError::MalformedHeader(reason.into())
    }

    pub(crate) fn corrupt_slice<S: Into<String>>(slice_index: usize, reason: S) -> Self {
        TranscodeError::CorruptSlice {
            slice_index,
            reason: reason.into(),
        }
    }
}

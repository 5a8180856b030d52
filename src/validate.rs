//! Header sanity checks and CRC16 validation.

use alloc::format;

use crate::{
    basis::{Header, SliceDesc, SIG, SUPPORTED_VERSION},
    crc16, ChecksumRegion, Result, TranscodeError,
};

/// Returns true when `ofs..ofs + size` lies within a buffer of `len` bytes.
pub(crate) fn in_bounds(len: usize, ofs: u32, size: u64) -> bool {
    ofs as u64 + size <= len as u64
}

/// Reads the header and checks everything that doesn't need to look past
/// it: signature, version, sizes and counts.
pub(crate) fn read_header(bytes: &[u8]) -> Result<Header> {
    if !Header::check_size(bytes) {
        return Err(TranscodeError::malformed(format!(
            "Expected at least {} byte header, got {} bytes",
            Header::FILE_SIZE,
            bytes.len()
        )));
    }

    let header = Header::from_bytes(bytes);

    if header.sig != SIG {
        return Err(TranscodeError::malformed("Sig mismatch, not a Basis Universal file"));
    }
    if header.ver != SUPPORTED_VERSION {
        return Err(TranscodeError::malformed(format!(
            "Unsupported file version 0x{:X}, expected 0x{:X}",
            header.ver, SUPPORTED_VERSION
        )));
    }
    if header.header_size as usize != Header::FILE_SIZE {
        return Err(TranscodeError::malformed(format!(
            "File specified unexpected header size, expected {}, got {}",
            Header::FILE_SIZE,
            header.header_size
        )));
    }
    if !in_bounds(bytes.len(), Header::FILE_SIZE as u32, header.data_size as u64) {
        return Err(TranscodeError::malformed(format!(
            "Header declares {} data bytes, only {} available",
            header.data_size,
            bytes.len() - Header::FILE_SIZE
        )));
    }
    if header.total_slices == 0 || header.total_images == 0 {
        return Err(TranscodeError::malformed(format!(
            "File has {} slices and {} images",
            header.total_slices, header.total_images
        )));
    }
    if header.total_images > header.total_slices {
        return Err(TranscodeError::malformed(format!(
            "File has more images ({}) than slices ({})",
            header.total_images, header.total_slices
        )));
    }

    let slice_table_size = header.total_slices as u64 * SliceDesc::FILE_SIZE as u64;
    if !in_bounds(bytes.len(), header.slice_desc_file_ofs, slice_table_size) {
        return Err(TranscodeError::malformed(format!(
            "Slice table at {} with {} entries is out of bounds",
            header.slice_desc_file_ofs, header.total_slices
        )));
    }

    Ok(header)
}

/// Quick structural check of the header. Doesn't compute any checksums.
pub fn validate_header(bytes: &[u8]) -> bool {
    read_header(bytes).is_ok()
}

/// Checks the header CRC16 and, when `full` is set, the CRC16 of all data
/// following the header, which covers the codebooks and every slice payload.
pub fn check_file_checksums(bytes: &[u8], full: bool) -> Result<()> {
    let header = read_header(bytes)?;

    if crc16(&bytes[Header::CRC_START..Header::FILE_SIZE], 0) != header.header_crc16 {
        return Err(TranscodeError::ChecksumMismatch(ChecksumRegion::Header));
    }

    if full {
        let data = &bytes[Header::FILE_SIZE..Header::FILE_SIZE + header.data_size as usize];
        if crc16(data, 0) != header.data_crc16 {
            return Err(TranscodeError::ChecksumMismatch(ChecksumRegion::Data));
        }
    }

    Ok(())
}

pub fn validate_file_checksums(bytes: &[u8], full: bool) -> bool {
    check_file_checksums(bytes, full).is_ok()
}

#![no_std]

extern crate alloc;

use alloc::{sync::Arc, vec::Vec};

use basisu_transcoder::{Container, GlobalSelectorCodebook, Result, Transcoder, TranscoderTextureFormat};

/// Transcodes the first level of every image to BC7.
pub fn transcode_to_bc7(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    basisu_transcoder::check_file_checksums(bytes, true)?;
    let container = Container::parse(bytes)?;
    let mut transcoder = Transcoder::new(Arc::new(GlobalSelectorCodebook::default()));
    transcoder.start_transcoding(&container)?;
    (0..container.total_images())
        .map(|image| transcoder.transcode_image_level_to_vec(&container, image, 0, TranscoderTextureFormat::Bc7Rgba))
        .collect()
}

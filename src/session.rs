//! Transcoding sessions.

use alloc::{sync::Arc, vec, vec::Vec};

use log::{debug, trace};

use crate::{
    basis::TexFormat,
    basis_lz::{DecodedBlock, Decoder, GlobalSelectorCodebook, PrevFrameIndices},
    container::{Container, ContainerKey},
    format::{AlphaFallback, DecodeFlags, SlicePairing, TranscoderTextureFormat},
    target_formats::channel_values,
    transcode::{opaque_alpha_block, two_channel_format, BlockWriter, LevelLayout, OutputPlan, SliceLayout},
    BlockFormat, Result, TranscodeError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    CodebooksReady,
    Stopped,
}

/// Codebooks and video state of the file a session was started for.
struct ReadyState {
    key: ContainerKey,
    /// `None` for UASTC files, which have no codebooks
    decoder: Option<Decoder>,
    /// Previous frame indices, per alpha flag and level
    video: [Vec<Vec<PrevFrameIndices>>; 2],
}

/// Transcoding session for one file at a time.
///
/// `start_transcoding` decodes the codebooks of a file once, after which any
/// number of slices and image levels of that file can be transcoded.
/// Sessions are not shared between threads while transcoding, create one
/// session per thread instead. The global selector codebook is shared.
pub struct Transcoder {
    global_codebook: Arc<GlobalSelectorCodebook>,
    ready: Option<ReadyState>,
    stopped: bool,
}

impl Transcoder {
    pub fn new(global_codebook: Arc<GlobalSelectorCodebook>) -> Self {
        Self {
            global_codebook,
            ready: None,
            stopped: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.ready, self.stopped) {
            (Some(_), _) => SessionState::CodebooksReady,
            (None, true) => SessionState::Stopped,
            (None, false) => SessionState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Decodes the codebooks of `container`. Starting again for the same
    /// file is a no-op, starting for a different file requires
    /// [Transcoder::stop_transcoding] first. On failure the session is left
    /// as it was.
    pub fn start_transcoding(&mut self, container: &Container) -> Result<()> {
        let key = container.key();
        if let Some(ready) = &self.ready {
            if ready.key == key {
                return Ok(());
            }
            return Err(TranscodeError::AlreadyStarted);
        }

        let decoder = match container.tex_format() {
            TexFormat::ETC1S => {
                let decoder = Decoder::from_file_bytes(
                    container.header(),
                    container.bytes(),
                    container.is_video(),
                    &self.global_codebook,
                )
                .map_err(TranscodeError::CorruptCodebook)?;
                debug!(
                    "Decoded ETC1S codebooks: {} endpoints, {} selectors",
                    decoder.endpoint_count(),
                    decoder.selector_count()
                );
                Some(decoder)
            }
            TexFormat::UASTC4x4 => None,
        };

        self.ready = Some(ReadyState {
            key,
            decoder,
            video: [Vec::new(), Vec::new()],
        });
        debug!("Transcoding started, {} slices", container.slices().len());
        Ok(())
    }

    /// Releases the codebooks. Always succeeds.
    pub fn stop_transcoding(&mut self) {
        if self.ready.take().is_some() {
            debug!("Transcoding stopped");
        }
        self.stopped = true;
    }

    fn ready_for(&mut self, container: &Container) -> Result<&mut ReadyState> {
        match self.ready.as_mut() {
            Some(ready) if ready.key == container.key() => Ok(ready),
            _ => Err(TranscodeError::NotStarted),
        }
    }

    /// Decodes every block of a slice and hands it to `f` together with the
    /// decoder it was decoded with.
    fn decode_slice<F>(&mut self, container: &Container, slice_index: usize, mut f: F) -> Result<()>
    where
        F: FnMut(&Decoder, &DecodedBlock),
    {
        let ready = self.ready_for(container)?;
        let desc = container
            .slice_desc(slice_index)
            .ok_or(TranscodeError::InvalidSliceIndex {
                index: slice_index,
                total: container.slices().len(),
            })?;
        let decoder = ready
            .decoder
            .as_ref()
            .ok_or(TranscodeError::UnsupportedTexFormat(container.tex_format()))?;

        let prev_frame = if container.is_video() {
            let levels = &mut ready.video[desc.has_alpha() as usize];
            let level = desc.level_index as usize;
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            Some(&mut levels[level])
        } else {
            None
        };

        decoder
            .decode_blocks(desc, container.bytes(), prev_frame, |block| f(decoder, &block))
            .map_err(|reason| TranscodeError::corrupt_slice(slice_index, reason))?;

        trace!(
            "Decoded slice {} ({}x{} blocks)",
            slice_index,
            desc.num_blocks_x,
            desc.num_blocks_y
        );
        Ok(())
    }

    /// Transcodes one slice into a single block or raster format.
    ///
    /// The output capacity is checked before anything is written.
    pub fn transcode_slice(
        &mut self,
        container: &Container,
        slice_index: usize,
        format: BlockFormat,
        output: &mut [u8],
        layout: &SliceLayout,
    ) -> Result<()> {
        self.ready_for(container)?;
        if container.slice_desc(slice_index).is_none() {
            return Err(TranscodeError::InvalidSliceIndex {
                index: slice_index,
                total: container.slices().len(),
            });
        }
        if container.tex_format() != TexFormat::ETC1S {
            return Err(TranscodeError::UnsupportedTexFormat(container.tex_format()));
        }
        if !format.has_encoder() {
            return Err(TranscodeError::UnsupportedFormat(format.name()));
        }
        self.write_slice(container, slice_index, format, output, layout, None)
    }

    fn write_slice(
        &mut self,
        container: &Container,
        slice_index: usize,
        format: BlockFormat,
        output: &mut [u8],
        layout: &SliceLayout,
        alpha: Option<&[[u8; 16]]>,
    ) -> Result<()> {
        let slice = container.slices()[slice_index];
        let writer = BlockWriter::new(format, &slice, layout)?;
        writer.plan().check_capacity(output)?;

        let num_blocks_x = slice.num_blocks_x;
        self.decode_slice(container, slice_index, |decoder, block| {
            let block_alpha = alpha.and_then(|alpha| alpha.get((block.block_y * num_blocks_x + block.block_x) as usize));
            writer.write(output, decoder, block, block_alpha);
        })
    }

    /// Transcodes one level of an image into a GPU format, combining its
    /// colour and alpha slices as the format requires. Files without alpha
    /// slices get opaque alpha.
    ///
    /// `layout.row_pitch` is in blocks, or in pixels for uncompressed
    /// formats. The whole output is checked for capacity before anything is
    /// written.
    pub fn transcode_image_level(
        &mut self,
        container: &Container,
        image_index: u32,
        level_index: u32,
        format: TranscoderTextureFormat,
        output: &mut [u8],
        layout: &LevelLayout,
    ) -> Result<()> {
        self.ready_for(container)?;
        if container.tex_format() != TexFormat::ETC1S {
            return Err(TranscodeError::UnsupportedTexFormat(container.tex_format()));
        }

        let cap = format.capability();

        let color_index = container
            .find_slice(image_index, level_index, false)
            .ok_or(TranscodeError::SliceNotFound {
                image_index,
                level_index,
                alpha: false,
            })?;
        let alpha_index = if container.has_alpha_slices() {
            let index = container
                .find_slice(image_index, level_index, true)
                .ok_or(TranscodeError::SliceNotFound {
                    image_index,
                    level_index,
                    alpha: true,
                })?;
            Some(index)
        } else {
            None
        };

        let slice = container.slices()[color_index];
        if cap.requires_pow2 && !(slice.orig_width.is_power_of_two() && slice.orig_height.is_power_of_two()) {
            return Err(TranscodeError::UnsupportedDimension {
                width: slice.orig_width,
                height: slice.orig_height,
            });
        }
        if !cap.color.has_encoder() {
            return Err(TranscodeError::UnsupportedFormat(cap.color.name()));
        }
        if let Some(alpha) = cap.alpha.filter(|a| !a.has_encoder()) {
            return Err(TranscodeError::UnsupportedFormat(alpha.name()));
        }

        let composite_size = format.bytes_per_block_or_pixel();
        let plan = if cap.color.raster().is_some() {
            let raster_layout = SliceLayout {
                row_pitch: layout.row_pitch,
                rows: layout.rows,
                ..SliceLayout::default()
            };
            OutputPlan::new(cap.color, &slice, &raster_layout)?
        } else {
            OutputPlan::blocks(composite_size, composite_size, layout.row_pitch, &slice)?
        };
        plan.check_capacity(output)?;

        let slice_layout = SliceLayout {
            block_stride: if cap.color.raster().is_some() { 0 } else { composite_size },
            row_pitch: layout.row_pitch,
            rows: layout.rows,
            channel0: None,
            channel1: None,
        };

        trace!(
            "Transcoding image {} level {} to {:?}, slices {} and {:?}",
            image_index,
            level_index,
            format,
            color_index,
            alpha_index
        );

        match cap.pairing {
            SlicePairing::Single => {
                let alpha_to_opaque = layout
                    .decode_flags
                    .contains(DecodeFlags::TRANSCODE_ALPHA_DATA_TO_OPAQUE_FORMATS);
                let source = match alpha_index {
                    Some(alpha_index) if alpha_to_opaque && !format.has_alpha() => alpha_index,
                    _ => color_index,
                };
                self.write_slice(container, source, cap.color, output, &slice_layout, None)
            }
            SlicePairing::Interleaved {
                color_offset,
                alpha_offset,
            } => {
                let alpha_format = cap.alpha.unwrap_or(cap.color);
                match (alpha_index, cap.alpha_fallback) {
                    (Some(alpha_index), _) => {
                        self.write_slice(
                            container,
                            color_index,
                            cap.color,
                            output.get_mut(color_offset..).unwrap_or_default(),
                            &slice_layout,
                            None,
                        )?;
                        self.write_slice(
                            container,
                            alpha_index,
                            alpha_format,
                            output.get_mut(alpha_offset..).unwrap_or_default(),
                            &slice_layout,
                            None,
                        )
                    }
                    (None, AlphaFallback::ColorChannel(channel)) => {
                        let paired = two_channel_format(cap.color).unwrap_or(cap.color);
                        let paired_layout = SliceLayout {
                            channel1: Some(channel),
                            ..slice_layout
                        };
                        self.write_slice(container, color_index, paired, output, &paired_layout, None)
                    }
                    (None, AlphaFallback::Opaque) => {
                        self.write_slice(
                            container,
                            color_index,
                            cap.color,
                            output.get_mut(color_offset..).unwrap_or_default(),
                            &slice_layout,
                            None,
                        )?;
                        if let Some(block) = opaque_alpha_block(alpha_format) {
                            let alpha_output = output.get_mut(alpha_offset..).unwrap_or_default();
                            let alpha_plan = OutputPlan::blocks(block.len(), composite_size, layout.row_pitch, &slice)?;
                            alpha_plan.check_capacity(alpha_output)?;
                            alpha_plan.fill(alpha_output, &block);
                        }
                        Ok(())
                    }
                }
            }
            SlicePairing::Merged => {
                self.write_slice(container, color_index, cap.color, output, &slice_layout, None)?;
                match (alpha_index, cap.alpha) {
                    (Some(alpha_index), Some(alpha_format)) => {
                        self.write_slice(container, alpha_index, alpha_format, output, &slice_layout, None)
                    }
                    _ => Ok(()),
                }
            }
            SlicePairing::Joint => {
                let alpha = match alpha_index {
                    Some(alpha_index) => {
                        let num_blocks_x = slice.num_blocks_x;
                        let mut values = vec![[0xFFu8; 16]; slice.total_blocks as usize];
                        self.decode_slice(container, alpha_index, |decoder, block| {
                            let id = (block.block_y * num_blocks_x + block.block_x) as usize;
                            if let Some(v) = values.get_mut(id) {
                                *v = channel_values(&decoder.block_pixels(block), 1);
                            }
                        })?;
                        Some(values)
                    }
                    None => None,
                };
                self.write_slice(
                    container,
                    color_index,
                    cap.color,
                    output,
                    &slice_layout,
                    alpha.as_deref(),
                )
            }
        }
    }

    /// Size of the output [Transcoder::transcode_image_level] writes with a
    /// default layout, `None` if the image level doesn't exist.
    pub fn image_level_output_size(
        container: &Container,
        image_index: u32,
        level_index: u32,
        format: TranscoderTextureFormat,
    ) -> Option<usize> {
        let level = container.image_level_info(image_index, level_index)?;
        let size = if format.is_uncompressed() {
            level.orig_width as usize * level.orig_height as usize
        } else {
            let block_w = format.block_width();
            let block_h = format.block_height();
            let blocks_x = (level.orig_width + block_w - 1) / block_w;
            let blocks_y = (level.orig_height + block_h - 1) / block_h;
            blocks_x as usize * blocks_y as usize
        };
        Some(size * format.bytes_per_block_or_pixel())
    }

    /// Transcodes an image level into a newly allocated, tightly packed
    /// buffer.
    pub fn transcode_image_level_to_vec(
        &mut self,
        container: &Container,
        image_index: u32,
        level_index: u32,
        format: TranscoderTextureFormat,
    ) -> Result<Vec<u8>> {
        self.ready_for(container)?;
        let size = Self::image_level_output_size(container, image_index, level_index, format).ok_or(
            TranscodeError::SliceNotFound {
                image_index,
                level_index,
                alpha: false,
            },
        )?;
        let mut output = vec![0u8; size];
        self.transcode_image_level(
            container,
            image_index,
            level_index,
            format,
            &mut output,
            &LevelLayout::default(),
        )?;
        Ok(output)
    }
}

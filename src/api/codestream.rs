// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The codestream phase: basic info, full headers and ICC, the optional
//! preview frame, and the per-frame Header -> TOC -> Full -> FullOutput
//! stage machine.

use crate::api::convert;
use crate::api::decoder::{Decoder, FrameStage, Stage};
use crate::api::sections::Sections;
use crate::api::signature::{check_signature, Signature};
use crate::api::{events, DataType, Event};
use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::frame::{FrameContext, OutputTarget, SectionStatus};
use crate::headers::frame_header::{FrameHeader, FrameHeaderNonserialized, FrameType};
use crate::headers::image_metadata::ImageMetadata;
use crate::headers::size::Size;
use crate::headers::toc::Toc;
use crate::headers::transform_data::CustomTransformData;
use crate::headers::JxlHeader;
use crate::image::{Image, ImageBundle};
use crate::util::tracing_wrappers::*;

fn out_of_bounds(a: usize, b: usize, size: usize) -> bool {
    match a.checked_add(b) {
        Some(pos) => pos > size,
        None => true,
    }
}

/// Skips the codestream signature at the start of the window, rejecting
/// nested containers.
fn skip_codestream_signature(codestream: &[u8]) -> Result<usize> {
    let mut pos = 0;
    match check_signature(codestream, &mut pos) {
        Signature::NotEnoughBytes => Err(Error::OutOfBounds(2)),
        Signature::Container => Err(Error::InvalidSignature(0, 0)),
        Signature::Invalid => {
            let b0 = codestream.first().copied().unwrap_or(0);
            let b1 = codestream.get(1).copied().unwrap_or(0);
            Err(Error::InvalidSignature(b0, b1))
        }
        Signature::Codestream => Ok(pos),
    }
}

impl<'data> Decoder<'data> {
    /// Decodes as much of the codestream window as possible, returning the
    /// next event. `codestream` always starts at codestream byte 0.
    pub(super) fn process_codestream(&mut self, codestream: &[u8]) -> Result<Event> {
        // The basic info is needed no matter which events are wanted.
        if !self.got_basic_info {
            match self.read_basic_info(codestream) {
                Ok(()) => {}
                Err(e) if e.is_transient() => return Ok(Event::NeedMoreInput),
                Err(e) => return Err(e),
            }
        }

        if self.events_wanted & events::BASIC_INFO != 0 {
            self.events_wanted &= !events::BASIC_INFO;
            return Ok(Event::BasicInfo);
        }

        if !self.got_all_headers {
            match self.read_all_headers(codestream) {
                Ok(()) => {}
                Err(e) if e.is_transient() => return Ok(Event::NeedMoreInput),
                Err(e) => return Err(e),
            }
        }

        if self.events_wanted & events::COLOR_ENCODING != 0 {
            self.events_wanted &= !events::COLOR_ENCODING;
            return Ok(Event::ColorEncoding);
        }

        if self.events_wanted & events::EXTENSIONS != 0 {
            self.events_wanted &= !events::EXTENSIONS;
            if self.metadata.as_ref().unwrap().extensions != 0 {
                return Ok(Event::Extensions);
            }
        }

        self.post_headers = true;

        if !self.got_preview_image {
            if let Some(event) = self.process_preview(codestream)? {
                return Ok(event);
            }
        }

        self.process_frames(codestream)
    }

    fn read_basic_info(&mut self, codestream: &[u8]) -> Result<()> {
        let pos = skip_codestream_signature(codestream)?;
        let mut br = BitReader::new(&codestream[pos..]);
        let size = Size::read(&mut br)?;
        let metadata = ImageMetadata::read_with_mode(&mut br, true)?;
        self.limits
            .check_size(size.xsize() as u64, size.ysize() as u64)?;
        self.image_size = Some(size);
        self.metadata = Some(metadata);
        self.got_basic_info = true;
        self.basic_info_size_hint = 0;
        Ok(())
    }

    /// Reads all codestream headers (but not frame headers): the size and
    /// metadata bundles again, the transform data, then the ICC payload if
    /// the color encoding advertises one. The bit offset of everything
    /// before the ICC is recorded so retries skip straight to it.
    fn read_all_headers(&mut self, codestream: &[u8]) -> Result<()> {
        let pos = skip_codestream_signature(codestream)?;
        let mut br = BitReader::new(&codestream[pos..]);

        if self.header_except_icc_bits != 0 {
            // Headers were decoded already.
            br.skip_bits(self.header_except_icc_bits)?;
        } else {
            let _ = Size::read(&mut br)?;
            let metadata = ImageMetadata::read(&mut br)?;
            let _ = CustomTransformData::read(&mut br, metadata.xyb_encoded)?;
            // The full parse supersedes the basic-fields-only one.
            self.metadata = Some(metadata);
            self.header_except_icc_bits = br.total_bits_read();
        }

        if self.metadata.as_ref().unwrap().color_encoding.want_icc {
            self.icc_reader.process(&mut br, self.limits.max_icc_size)?;
            self.icc_profile = Some(self.icc_reader.take());
        }

        self.got_all_headers = true;
        br.jump_to_byte_boundary()?;
        self.frame_start = pos + br.total_bits_read() / 8;
        Ok(())
    }

    fn frame_nonserialized(&self, is_preview: bool) -> FrameHeaderNonserialized {
        let metadata = self.metadata.as_ref().unwrap();
        let (img_width, img_height) = if is_preview {
            let preview = metadata.preview.as_ref().unwrap();
            (preview.xsize(), preview.ysize())
        } else {
            let size = self.image_size.as_ref().unwrap();
            (size.xsize(), size.ysize())
        };
        FrameHeaderNonserialized {
            xyb_encoded: metadata.xyb_encoded,
            num_extra_channels: metadata.num_extra_channels() as u32,
            have_animation: metadata.have_animation(),
            have_timecodes: metadata
                .animation
                .as_ref()
                .is_some_and(|a| a.have_timecodes),
            img_width,
            img_height,
            is_preview,
        }
    }

    /// Parses a frame header and its TOC from `codestream[pos..]`,
    /// returning the header, TOC, their combined byte size, and the total
    /// frame size.
    fn parse_frame_header(
        &self,
        codestream: &[u8],
        pos: usize,
        is_preview: bool,
    ) -> Result<(FrameHeader, Toc, usize, usize)> {
        let mut br = BitReader::new(&codestream[pos..]);
        let nonserialized = self.frame_nonserialized(is_preview);
        let header = FrameHeader::read(&mut br, &nonserialized)?;
        let (xsize, ysize) = header.upsampled_size();
        self.limits.check_size(xsize, ysize)?;
        let toc = Toc::read(&mut br, header.num_toc_entries())?;
        debug_assert_eq!(br.total_bits_read() % 8, 0);
        let header_size = br.total_bits_read() / 8;
        let frame_size = header_size
            .checked_add(toc.total_size()?)
            .ok_or(Error::TocSizeOverflow)?;
        Ok((header, toc, header_size, frame_size))
    }

    fn new_frame_bundle(&self, header: &FrameHeader) -> Result<ImageBundle> {
        let metadata = self.metadata.as_ref().unwrap();
        let channels = metadata.color_encoding.channels();
        let (w, h) = (header.width() as usize, header.height() as usize);
        let mut bundle = ImageBundle::new(w, h, channels)?;
        for _ in 0..metadata.num_extra_channels() {
            bundle.extra.push(Image::new(w, h)?);
        }
        Ok(bundle)
    }

    /// Parses (and if subscribed, decodes) the preview frame, leaving
    /// `frame_start` at the first regular frame.
    fn process_preview(&mut self, codestream: &[u8]) -> Result<Option<Event>> {
        let parse_preview = self.events_wanted
            & (events::PREVIEW_IMAGE | events::FRAME | events::FULL_IMAGE)
            != 0;
        if !self.metadata.as_ref().unwrap().have_preview() || !parse_preview {
            // No preview or no interest in pixels: nothing to do here.
            self.got_preview_image = true;
            return Ok(None);
        }
        let want_preview = self.events_wanted & events::PREVIEW_IMAGE != 0;
        let pos = self.frame_start;
        if pos >= codestream.len() {
            return Ok(Some(Event::NeedMoreInput));
        }
        let (header, toc, header_size, frame_size) =
            match self.parse_frame_header(codestream, pos, true) {
                Ok(parsed) => parsed,
                Err(e) if e.is_transient() => return Ok(Some(Event::NeedMoreInput)),
                Err(e) => return Err(e),
            };
        if out_of_bounds(pos, frame_size, codestream.len()) {
            return Ok(Some(Event::NeedMoreInput));
        }
        if want_preview {
            if !self.preview_out_buffer_set {
                return Ok(Some(Event::NeedPreviewOutBuffer));
            }
            let mut bundle = self.new_frame_bundle(&header)?;
            let offsets = toc.offsets()?;
            let sizes = toc.sizes();
            let context = FrameContext {
                frame_header: &header,
                metadata: self.metadata.as_ref().unwrap(),
                section_offsets: offsets.clone(),
                section_sizes: sizes.clone(),
                is_preview: true,
            };
            let factory = self.codec_factory.as_ref().ok_or(Error::NoFrameCodec)?;
            let mut codec = factory.make_codec(&context, self.runner.as_ref())?;
            let mut section_mgr = Sections::new(offsets, sizes, frame_size, header_size)?;
            let window = &codestream[pos..pos + frame_size];
            let mut batch = section_mgr.gather(window);
            let mut status = vec![SectionStatus::Pending; batch.len()];
            match codec.process_sections(&mut batch, &mut status, &mut bundle, None) {
                Ok(()) => {}
                Err(Error::OutOfBounds(_)) => return Err(Error::SectionTooShort),
                Err(e) => return Err(e),
            }
            Sections::close(&batch, &status)?;
            if !section_mgr.all_received() {
                // The whole frame is in the window, so every section must
                // have been handed over.
                return Err(Error::SectionTooShort);
            }
            codec.finalize_frame(&mut bundle)?;
            let format = self.preview_out_format.unwrap();
            let orientation = self.output_orientation();
            if let Some(buffer) = self.preview_out.as_mut() {
                convert::convert_image(&bundle, &format, orientation, buffer)?;
            }
        }
        // The first regular frame begins right after the preview frame.
        self.frame_start += frame_size;
        self.got_preview_image = true;
        if want_preview {
            return Ok(Some(Event::PreviewImage));
        }
        Ok(None)
    }

    fn process_frames(&mut self, codestream: &[u8]) -> Result<Event> {
        loop {
            if self.events_wanted & (events::FULL_IMAGE | events::FRAME) == 0 {
                break;
            }
            if self.frame_stage == FrameStage::Header && self.is_last_total {
                break;
            }

            if self.frame_stage == FrameStage::Header {
                let pos = self.frame_start - self.codestream_pos;
                if pos >= codestream.len() {
                    return Ok(Event::NeedMoreInput);
                }
                let (header, toc, header_size, frame_size) =
                    match self.parse_frame_header(codestream, pos, false) {
                        Ok(parsed) => parsed,
                        Err(e) if e.is_transient() => return Ok(Event::NeedMoreInput),
                        Err(e) => return Err(e),
                    };
                let saved_as = header.saved_as();

                // Last frame in the entire codestream.
                self.is_last_total = header.is_last;
                // Last frame of the current composite still.
                self.is_last_of_still = self.is_last_total || header.duration > 0;

                let internal_frame_index = self.internal_frames;
                let external_frame_index = self.external_frames;
                if self.is_last_of_still {
                    self.external_frames += 1;
                }
                self.internal_frames += 1;

                self.frame_header = Some(header);
                self.frame_toc = Some(toc);
                self.frame_header_size = header_size;
                self.frame_size = frame_size;
                self.frame_stage = FrameStage::Toc;

                if self.skip_frames > 0 {
                    self.skipping_frame = true;
                    if self.is_last_of_still {
                        self.skip_frames -= 1;
                    }
                } else {
                    self.skipping_frame = false;
                }

                if external_frame_index >= self.frame_external_to_internal.len() {
                    self.frame_external_to_internal.push(internal_frame_index);
                }
                if internal_frame_index >= self.deps.len() {
                    // References are unknown until the frame is finalized,
                    // so the tracker starts them at the pessimistic 0xff.
                    self.deps.push_frame(saved_as);
                }

                if self.skipping_frame {
                    let header = self.frame_header.as_ref().unwrap();
                    // Whether any future frame could read this one, either
                    // through a save slot or as a DC frame.
                    let mut referenceable = header.can_be_referenced()
                        || header.frame_type == FrameType::DCFrame;
                    if self
                        .frame_required
                        .get(internal_frame_index)
                        .is_some_and(|required| !required)
                    {
                        referenceable = false;
                    }
                    if !referenceable {
                        // Nothing can depend on this frame: skip it with
                        // zero decoding.
                        self.frame_stage = FrameStage::Header;
                        self.frame_start += self.frame_size;
                        continue;
                    }
                }

                if self.events_wanted & events::FRAME != 0
                    && self.is_last_of_still
                    && !self.skipping_frame
                {
                    // Only the last of a composite still carries the
                    // caller-visible animation information.
                    return Ok(Event::Frame);
                }
            }

            if self.frame_stage == FrameStage::Toc {
                if self.events_wanted & events::FULL_IMAGE != 0 {
                    let header = self.frame_header.as_ref().unwrap();
                    let bundle = self.new_frame_bundle(header)?;
                    let toc = self.frame_toc.as_ref().unwrap();
                    let offsets = toc.offsets()?;
                    let sizes = toc.sizes();
                    let context = FrameContext {
                        frame_header: header,
                        metadata: self.metadata.as_ref().unwrap(),
                        section_offsets: offsets.clone(),
                        section_sizes: sizes.clone(),
                        is_preview: false,
                    };
                    let factory = self.codec_factory.as_ref().ok_or(Error::NoFrameCodec)?;
                    let codec = factory.make_codec(&context, self.runner.as_ref())?;
                    let section_mgr =
                        Sections::new(offsets, sizes, self.frame_size, self.frame_header_size)?;
                    self.ib = Some(bundle);
                    self.frame_codec = Some(codec);
                    self.sections = Some(section_mgr);
                    self.frame_dec_in_progress = true;
                    self.frame_stage = FrameStage::Full;
                }
                // Without a FullImage subscription the pixel stages do not
                // run and the loop moves on to the next frame below.
            }

            let mut return_full_image = false;

            if self.frame_stage == FrameStage::Full {
                if self.events_wanted & events::FULL_IMAGE != 0
                    && !self.image_out_buffer_set
                    && self.is_last_of_still
                    && !self.skipping_frame
                {
                    return Ok(Event::NeedImageOutBuffer);
                }

                let pos = self.frame_start - self.codestream_pos;
                if pos >= codestream.len() {
                    return Ok(Event::NeedMoreInput);
                }
                let window = &codestream[pos..];

                if let Some(cap) = self.limits.cpu_limit_base() {
                    let header = self.frame_header.as_ref().unwrap();
                    let num_pixels = header.width() as u64 * header.height() as u64;
                    self.used_cpu = self
                        .used_cpu
                        .checked_add(num_pixels)
                        .ok_or(Error::CpuBudgetExceeded)?;
                    if self.used_cpu > cap {
                        return Err(Error::CpuBudgetExceeded);
                    }
                }

                let mut batch = self.sections.as_mut().unwrap().gather(window);
                let mut status = vec![SectionStatus::Pending; batch.len()];
                if !batch.is_empty() {
                    let orientation = self.output_orientation();
                    let undo_orientation = !self.keep_orientation;
                    let direct_eligible = self.is_last_of_still
                        && !self.skipping_frame
                        && self.image_out_buffer_set
                        && self
                            .extra_channel_output
                            .iter()
                            .all(|slot| slot.is_none());
                    let format = self.image_out_format;
                    let codec = self.frame_codec.as_mut().unwrap();
                    let bundle = self.ib.as_mut().unwrap();
                    let output = match format {
                        // Raw 8-bit RGB(A) buffers can be filled by the
                        // frame decoder directly.
                        Some(format)
                            if direct_eligible
                                && self.image_out.is_some()
                                && format.data_type == DataType::U8
                                && format.num_channels >= 3 =>
                        {
                            let size = self.image_size.as_ref().unwrap();
                            let (ow, _) = convert::oriented_size(
                                orientation,
                                size.xsize() as usize,
                                size.ysize() as usize,
                            );
                            Some(OutputTarget::Rgb8 {
                                buffer: self.image_out.as_mut().unwrap(),
                                stride: convert::stride_for(ow, &format),
                                rgba: format.num_channels == 4,
                                undo_orientation,
                            })
                        }
                        // Native-endian float callbacks can be streamed
                        // scanline by scanline.
                        Some(format)
                            if direct_eligible
                                && self.image_out_callback.is_some()
                                && format.data_type == DataType::F32
                                && format.num_channels >= 3
                                && format.endianness.is_little()
                                    == cfg!(target_endian = "little") =>
                        {
                            Some(OutputTarget::Scanlines(
                                &mut **self.image_out_callback.as_mut().unwrap(),
                            ))
                        }
                        _ => None,
                    };
                    match codec.process_sections(&mut batch, &mut status, bundle, output) {
                        Ok(()) => {}
                        // We only hand over complete sections; running out
                        // of one means the stream lied about its size.
                        Err(Error::OutOfBounds(_)) => return Err(Error::SectionTooShort),
                        Err(e) => return Err(e),
                    }
                    Sections::close(&batch, &status)?;
                }

                let section_mgr = self.sections.as_ref().unwrap();
                if !section_mgr.all_received() {
                    trace!(
                        "frame incomplete, roughly {} bytes to the next section",
                        section_mgr.missing_hint(window.len())
                    );
                    return Ok(Event::NeedMoreInput);
                }

                let internal_index = self.internal_frames - 1;
                let codec = self.frame_codec.as_mut().unwrap();
                // Overwrite even if this frame was skipped before with the
                // pessimistic mask: only now the true value is known.
                self.deps.set_references(internal_index, codec.references());
                codec.finalize_frame(self.ib.as_mut().unwrap())?;
                self.frame_dec_in_progress = false;
                self.frame_stage = FrameStage::FullOutput;
            }

            if self.frame_stage == FrameStage::FullOutput && self.is_last_of_still {
                if self.events_wanted & events::FULL_IMAGE != 0 {
                    self.events_wanted &= !events::FULL_IMAGE;
                    return_full_image = true;
                }
                // Re-arm the per-frame events for the next still.
                self.events_wanted |=
                    self.orig_events_wanted & (events::FULL_IMAGE | events::FRAME);

                if return_full_image && self.image_out_buffer_set && !self.skipping_frame {
                    let orientation = self.output_orientation();
                    let format = self.image_out_format.unwrap();
                    let direct = self
                        .frame_codec
                        .as_ref()
                        .is_some_and(|codec| codec.uses_direct_output());
                    if !direct {
                        let bundle = self.ib.as_ref().unwrap();
                        if let Some(buffer) = self.image_out.as_mut() {
                            convert::convert_image(bundle, &format, orientation, buffer)?;
                        } else if let Some(callback) = self.image_out_callback.as_mut() {
                            convert::convert_to_sink(bundle, &format, orientation, &mut **callback)?;
                        }
                    }
                    self.image_out_buffer_set = false;

                    let bundle = self.ib.as_ref().unwrap();
                    for (i, slot) in self.extra_channel_output.iter_mut().enumerate() {
                        let Some((format, buffer)) = slot.as_mut() else {
                            continue;
                        };
                        let plane = bundle
                            .extra
                            .get(i)
                            .ok_or(Error::InvalidExtraChannelIndex(i))?;
                        convert::convert_extra_channel(plane, format, orientation, buffer)?;
                    }
                }
            }

            // The pixels have been output or are not needed; drop the
            // per-frame objects and move to the next frame header.
            self.ib = None;
            self.frame_codec = None;
            self.sections = None;
            self.frame_toc = None;
            self.frame_stage = FrameStage::Header;
            self.frame_start += self.frame_size;

            if return_full_image && !self.skipping_frame {
                return Ok(Event::FullImage);
            }
        }

        self.stage = Stage::Finished;
        // Nothing more to do.
        Ok(Event::Success)
    }
}

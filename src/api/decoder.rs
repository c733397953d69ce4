// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::api::convert::{self, buffer_size, oriented_size};
use crate::api::dependencies::FrameDependencyTracker;
use crate::api::sections::Sections;
use crate::api::{events, PixelFormat};
use crate::error::{Error, Result};
use crate::frame::{
    FrameCodec, FrameCodecFactory, ImageOutSink, ParallelRunner, SequentialRunner,
};
use crate::headers::frame_header::FrameHeader;
use crate::headers::image_metadata::{ImageMetadata, Orientation};
use crate::headers::size::Size;
use crate::headers::toc::Toc;
use crate::icc::IccReader;
use crate::image::ImageBundle;

/// Worst-case bytes before the codestream in a container (signature box,
/// file-type box, codestream box header) plus the worst-case basic-info
/// prefix of the codestream itself.
pub(super) const INITIAL_BASIC_INFO_SIZE_HINT: usize = 48 + 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stage {
    /// Decoder created, no `process_input` call yet.
    Inited,
    /// Running `process_input` calls.
    Started,
    /// Everything done, nothing left to process.
    Finished,
    /// Error occurred, decoder object no longer usable.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FrameStage {
    /// Must parse the frame header; `frame_start` is already set up.
    Header,
    /// Must set up the frame decoder from the parsed header and TOC.
    Toc,
    /// Must decode sections into pixels.
    Full,
    /// Must hand the finished pixels to the caller.
    FullOutput,
}

/// Resource ceilings, enforced at basic-info and frame-header time. The
/// CPU budget is derived: every frame accounts its pixel count, and the
/// running sum may not exceed five times the memory budget.
#[derive(Debug, Clone, Default)]
pub struct DecoderLimits {
    /// Maximum `xsize * ysize` of the image and of any frame.
    pub memory_limit_base: Option<u64>,
    /// Maximum ICC payload size in bytes.
    pub max_icc_size: Option<u64>,
}

impl DecoderLimits {
    pub(super) fn cpu_limit_base(&self) -> Option<u64> {
        self.memory_limit_base.map(|base| base.saturating_mul(5))
    }

    pub(super) fn check_size(&self, xsize: u64, ysize: u64) -> Result<()> {
        let Some(limit) = self.memory_limit_base else {
            return Ok(());
        };
        if xsize == 0 || ysize == 0 {
            return Ok(());
        }
        let num_pixels = xsize.checked_mul(ysize).ok_or(Error::ImageSizeTooLarge(xsize, ysize))?;
        if num_pixels > limit {
            return Err(Error::ImageSizeTooLarge(xsize, ysize));
        }
        Ok(())
    }
}

/// Basic information about the image, available once the basic-info event
/// has fired.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicInfo {
    pub xsize: u32,
    pub ysize: u32,
    pub bits_per_sample: u32,
    pub exponent_bits_per_sample: u32,
    pub uses_original_profile: bool,
    pub have_container: bool,
    pub have_preview: bool,
    pub preview_xsize: u32,
    pub preview_ysize: u32,
    pub have_animation: bool,
    pub tps_numerator: u32,
    pub tps_denominator: u32,
    pub num_loops: u32,
    pub have_timecodes: bool,
    pub orientation: Orientation,
    pub num_color_channels: u32,
    pub num_extra_channels: u32,
    pub alpha_bits: u32,
    pub alpha_exponent_bits: u32,
    pub alpha_premultiplied: bool,
    pub intensity_target: f32,
}

/// Per-frame information exposed while a frame is being processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub duration: u32,
    pub timecode: u32,
    pub name: String,
    pub is_last: bool,
}

pub(super) struct JbrdParser {
    pub(super) parsing: bool,
    pub(super) remaining: usize,
    pub(super) data: Vec<u8>,
}

impl JbrdParser {
    fn new() -> JbrdParser {
        JbrdParser {
            parsing: false,
            remaining: 0,
            data: Vec::new(),
        }
    }

    pub(super) fn start(&mut self, contents_size: usize) {
        self.parsing = true;
        self.remaining = contents_size;
        self.data.clear();
    }
}

/// The streaming decoder front-end. Accepts arbitrarily chunked input via
/// [`Decoder::set_input`] / [`Decoder::release_input`] and produces
/// [`Event`]s from [`Decoder::process_input`], never blocking: an input
/// shortage is reported as [`Event::NeedMoreInput`] and the caller resumes
/// with more bytes.
pub struct Decoder<'data> {
    // Collaborators.
    pub(super) runner: Box<dyn ParallelRunner>,
    runner_set: bool,
    pub(super) codec_factory: Option<Box<dyn FrameCodecFactory>>,
    pub(super) limits: DecoderLimits,
    pub(super) used_cpu: u64,

    pub(super) stage: Stage,

    // Progression latches.
    pub(super) got_signature: bool,
    pub(super) have_container: bool,
    pub(super) first_codestream_seen: bool,
    pub(super) last_codestream_seen: bool,
    pub(super) got_basic_info: bool,
    pub(super) header_except_icc_bits: usize,
    pub(super) got_all_headers: bool,
    pub(super) post_headers: bool,
    pub(super) icc_reader: IccReader,
    pub(super) icc_profile: Option<Vec<u8>>,
    pub(super) got_preview_image: bool,

    // Container bookkeeping. `file_pos` is the absolute offset of the
    // first byte of the held input window.
    pub(super) file_pos: usize,
    pub(super) box_begin: usize,
    pub(super) box_end: usize,
    pub(super) skip_box: bool,
    pub(super) codestream_begin: usize,
    pub(super) codestream_end: usize,
    pub(super) next_jxlp_index: u32,

    // Settings.
    pub(super) keep_orientation: bool,
    pub(super) events_wanted: u32,
    pub(super) orig_events_wanted: u32,
    pub(super) basic_info_size_hint: usize,

    // Parsed headers.
    pub(super) image_size: Option<Size>,
    pub(super) metadata: Option<ImageMetadata>,

    // Output buffers, owned here until the caller takes them back.
    pub(super) preview_out: Option<Vec<u8>>,
    pub(super) preview_out_format: Option<PixelFormat>,
    pub(super) preview_out_buffer_set: bool,
    pub(super) image_out: Option<Vec<u8>>,
    pub(super) image_out_format: Option<PixelFormat>,
    pub(super) image_out_buffer_set: bool,
    pub(super) image_out_callback: Option<Box<dyn ImageOutSink + 'data>>,
    pub(super) extra_channel_output: Vec<Option<(PixelFormat, Vec<u8>)>>,

    // Frame state. All of these are `None` while `frame_stage` is Header.
    pub(super) ib: Option<ImageBundle>,
    pub(super) frame_codec: Option<Box<dyn FrameCodec>>,
    pub(super) sections: Option<Sections>,
    pub(super) frame_dec_in_progress: bool,
    pub(super) frame_header: Option<FrameHeader>,
    pub(super) frame_toc: Option<Toc>,
    pub(super) frame_header_size: usize,

    pub(super) frame_start: usize,
    pub(super) frame_size: usize,
    pub(super) frame_stage: FrameStage,
    pub(super) is_last_of_still: bool,
    pub(super) is_last_total: bool,
    pub(super) skip_frames: usize,
    pub(super) skipping_frame: bool,
    pub(super) internal_frames: usize,
    pub(super) external_frames: usize,
    pub(super) deps: FrameDependencyTracker,
    pub(super) frame_external_to_internal: Vec<usize>,
    pub(super) frame_required: Vec<bool>,

    // Owned codestream buffer, used only in streaming mode.
    pub(super) codestream: Vec<u8>,
    pub(super) codestream_pos: usize,

    pub(super) jbrd: JbrdParser,
    pub(super) jbrd_data: Option<Vec<u8>>,

    // Caller-held input window.
    pub(super) input: &'data [u8],
    pub(super) input_set: bool,
}

impl<'data> Decoder<'data> {
    pub fn new() -> Decoder<'data> {
        Decoder {
            runner: Box::new(SequentialRunner),
            runner_set: false,
            codec_factory: None,
            limits: DecoderLimits::default(),
            used_cpu: 0,
            stage: Stage::Inited,
            got_signature: false,
            have_container: false,
            first_codestream_seen: false,
            last_codestream_seen: false,
            got_basic_info: false,
            header_except_icc_bits: 0,
            got_all_headers: false,
            post_headers: false,
            icc_reader: IccReader::new(),
            icc_profile: None,
            got_preview_image: false,
            file_pos: 0,
            box_begin: 0,
            box_end: 0,
            skip_box: false,
            codestream_begin: 0,
            codestream_end: 0,
            next_jxlp_index: 0,
            keep_orientation: false,
            events_wanted: 0,
            orig_events_wanted: 0,
            basic_info_size_hint: INITIAL_BASIC_INFO_SIZE_HINT,
            image_size: None,
            metadata: None,
            preview_out: None,
            preview_out_format: None,
            preview_out_buffer_set: false,
            image_out: None,
            image_out_format: None,
            image_out_buffer_set: false,
            image_out_callback: None,
            extra_channel_output: Vec::new(),
            ib: None,
            frame_codec: None,
            sections: None,
            frame_dec_in_progress: false,
            frame_header: None,
            frame_toc: None,
            frame_header_size: 0,
            frame_start: 0,
            frame_size: 0,
            frame_stage: FrameStage::Header,
            is_last_of_still: false,
            is_last_total: false,
            skip_frames: 0,
            skipping_frame: false,
            internal_frames: 0,
            external_frames: 0,
            deps: FrameDependencyTracker::new(),
            frame_external_to_internal: Vec::new(),
            frame_required: Vec::new(),
            codestream: Vec::new(),
            codestream_pos: 0,
            jbrd: JbrdParser::new(),
            jbrd_data: None,
            input: &[],
            input_set: false,
        }
    }

    pub fn with_limits(limits: DecoderLimits) -> Decoder<'data> {
        let mut dec = Decoder::new();
        dec.limits = limits;
        dec
    }

    /// Restores the decoder to its freshly-created state. The thread pool,
    /// codec factory, limits and event subscription survive only in the
    /// sense that the caller must re-apply the subscription; collaborators
    /// stay installed.
    pub fn reset(&mut self) {
        let runner = std::mem::replace(&mut self.runner, Box::new(SequentialRunner));
        let runner_set = self.runner_set;
        let codec_factory = self.codec_factory.take();
        let limits = self.limits.clone();
        *self = Decoder::new();
        self.runner = runner;
        self.runner_set = runner_set;
        self.codec_factory = codec_factory;
        self.limits = limits;
    }

    /// Restarts from byte 0 while keeping the subscription, the
    /// keep-orientation setting, the accumulated skip count bookkeeping and
    /// the learned frame-dependency tables.
    pub fn rewind(&mut self) {
        let keep_orientation = self.keep_orientation;
        let events_wanted = self.orig_events_wanted;
        let deps = std::mem::take(&mut self.deps);
        let frame_external_to_internal = std::mem::take(&mut self.frame_external_to_internal);
        let frame_required = std::mem::take(&mut self.frame_required);
        self.reset();
        self.keep_orientation = keep_orientation;
        self.events_wanted = events_wanted;
        self.orig_events_wanted = events_wanted;
        self.deps = deps;
        self.frame_external_to_internal = frame_external_to_internal;
        self.frame_required = frame_required;
    }

    /// Subscribes to a set of informative events. Only possible before the
    /// first `process_input` call.
    pub fn subscribe_events(&mut self, events_wanted: u32) -> Result<()> {
        if self.stage != Stage::Inited {
            return Err(Error::AlreadyStarted);
        }
        if events_wanted & 0x3f != 0 || events_wanted & !events::ALL != 0 {
            return Err(Error::InvalidEventSubscription);
        }
        self.events_wanted = events_wanted;
        self.orig_events_wanted = events_wanted;
        Ok(())
    }

    /// Keeps the pixel data in the orientation the codestream stores it
    /// in, instead of applying the EXIF orientation. Must be set before
    /// decoding starts.
    pub fn set_keep_orientation(&mut self, keep_orientation: bool) -> Result<()> {
        if self.stage != Stage::Inited {
            return Err(Error::AlreadyStarted);
        }
        self.keep_orientation = keep_orientation;
        Ok(())
    }

    /// Installs the caller's thread pool for section decoding.
    pub fn set_parallel_runner(
        &mut self,
        runner: Box<dyn ParallelRunner>,
    ) -> Result<()> {
        if self.runner_set {
            return Err(Error::RunnerAlreadySet);
        }
        self.runner = runner;
        self.runner_set = true;
        Ok(())
    }

    /// Installs the inner frame decoder. Required before any `FullImage`
    /// or `PreviewImage` pixels can be produced.
    pub fn set_frame_codec_factory(&mut self, factory: Box<dyn FrameCodecFactory>) {
        self.codec_factory = Some(factory);
    }

    /// Makes `data` the held input window. The decoder records the
    /// absolute position; between `process_input` calls the caller may
    /// swap the buffer via `release_input` + `set_input`.
    pub fn set_input(&mut self, data: &'data [u8]) -> Result<()> {
        if self.input_set {
            return Err(Error::InputAlreadySet);
        }
        self.input = data;
        self.input_set = true;
        Ok(())
    }

    /// Releases the held input and returns how many of its bytes were not
    /// yet consumed; the caller resumes from there.
    pub fn release_input(&mut self) -> usize {
        let remaining = self.input.len();
        self.input = &[];
        self.input_set = false;
        remaining
    }

    /// Lower bound on how many bytes are needed before basic info can be
    /// produced; zero once it is known.
    pub fn size_hint_basic_info(&self) -> usize {
        if self.got_basic_info {
            0
        } else {
            self.basic_info_size_hint
        }
    }

    /// Skip the next `amount` still frames. The count accumulates: frames
    /// already skipped cannot be un-skipped, so the amount only grows.
    pub fn skip_frames(&mut self, amount: usize) {
        self.skip_frames += amount;

        self.frame_required.clear();
        let next_frame = self.external_frames + self.skip_frames;

        // A frame that has been seen before a rewind.
        if let Some(&internal_index) = self.frame_external_to_internal.get(next_frame) {
            if internal_index < self.deps.len() {
                let deps = self.deps.dependencies(internal_index);
                self.frame_required = vec![false; internal_index + 1];
                for dep in deps {
                    self.frame_required[dep] = true;
                }
            }
        }
    }

    pub fn basic_info(&self) -> Option<BasicInfo> {
        if !self.got_basic_info {
            return None;
        }
        let size = self.image_size.as_ref()?;
        let metadata = self.metadata.as_ref()?;
        let (mut xsize, mut ysize) = (size.xsize(), size.ysize());
        let mut orientation = metadata.orientation;
        if !self.keep_orientation {
            if orientation.is_transposing() {
                std::mem::swap(&mut xsize, &mut ysize);
            }
            orientation = Orientation::Identity;
        }
        let alpha = metadata.alpha_channel();
        let (preview_xsize, preview_ysize) = metadata
            .preview
            .as_ref()
            .map(|p| (p.xsize(), p.ysize()))
            .unwrap_or((0, 0));
        let animation = metadata.animation.as_ref();
        Some(BasicInfo {
            xsize,
            ysize,
            bits_per_sample: metadata.bit_depth.bits_per_sample(),
            exponent_bits_per_sample: metadata.bit_depth.exponent_bits_per_sample(),
            uses_original_profile: !metadata.xyb_encoded,
            have_container: self.have_container,
            have_preview: metadata.have_preview(),
            preview_xsize,
            preview_ysize,
            have_animation: metadata.have_animation(),
            tps_numerator: animation.map_or(0, |a| a.tps_numerator),
            tps_denominator: animation.map_or(0, |a| a.tps_denominator),
            num_loops: animation.map_or(0, |a| a.num_loops),
            have_timecodes: animation.is_some_and(|a| a.have_timecodes),
            orientation,
            num_color_channels: if metadata.color_encoding.is_gray() { 1 } else { 3 },
            num_extra_channels: metadata.num_extra_channels() as u32,
            alpha_bits: alpha.map_or(0, |a| a.bit_depth.bits_per_sample()),
            alpha_exponent_bits: alpha.map_or(0, |a| a.bit_depth.exponent_bits_per_sample()),
            alpha_premultiplied: alpha.is_some_and(|a| a.alpha_associated()),
            intensity_target: metadata.tone_mapping.intensity_target,
        })
    }

    /// The encoded color space, unless the image carries an ICC profile.
    pub fn color_encoding(&self) -> Result<&crate::headers::color_encoding::ColorEncoding> {
        let metadata = self.metadata.as_ref().ok_or(Error::OutOfBounds(1))?;
        if !self.got_all_headers {
            return Err(Error::OutOfBounds(1));
        }
        if metadata.color_encoding.want_icc {
            return Err(Error::WantIcc);
        }
        Ok(&metadata.color_encoding)
    }

    /// The raw embedded ICC profile bytes, when the image has one.
    pub fn icc_profile(&self) -> Result<&[u8]> {
        if !self.got_all_headers {
            return Err(Error::OutOfBounds(1));
        }
        self.icc_profile.as_deref().ok_or(Error::NoIcc)
    }

    pub fn extra_channel_info(
        &self,
        index: usize,
    ) -> Result<&crate::headers::extra_channels::ExtraChannelInfo> {
        let metadata = self.metadata.as_ref().ok_or(Error::OutOfBounds(1))?;
        metadata
            .extra_channel_info
            .get(index)
            .ok_or(Error::InvalidExtraChannelIndex(index))
    }

    pub fn extra_channel_name(&self, index: usize) -> Result<&str> {
        Ok(&self.extra_channel_info(index)?.name)
    }

    /// Header of the frame currently being processed; not available while
    /// the next frame header has not been parsed yet.
    pub fn frame_header(&self) -> Result<FrameInfo> {
        let header = self.frame_header.as_ref();
        match (header, self.frame_stage) {
            (Some(header), stage) if stage != FrameStage::Header => Ok(FrameInfo {
                duration: header.duration,
                timecode: header.timecode,
                name: header.name.clone(),
                is_last: header.is_last,
            }),
            _ => Err(Error::NoBufferNeeded("frame header")),
        }
    }

    pub fn frame_name(&self) -> Result<String> {
        Ok(self.frame_header()?.name)
    }

    /// The jbrd box payload, once `JpegReconstruction` has fired.
    pub fn jpeg_reconstruction_data(&self) -> Option<&[u8]> {
        self.jbrd_data.as_deref()
    }

    /// True once the decoder has moved past the codestream headers and
    /// into pixel data.
    pub fn post_headers(&self) -> bool {
        self.post_headers
    }

    fn oriented_image_size(&self) -> Result<(usize, usize)> {
        let size = self.image_size.as_ref().ok_or(Error::OutOfBounds(1))?;
        let orientation = self.output_orientation();
        Ok(oriented_size(
            orientation,
            size.xsize() as usize,
            size.ysize() as usize,
        ))
    }

    pub(super) fn output_orientation(&self) -> Orientation {
        if self.keep_orientation {
            Orientation::Identity
        } else {
            self.metadata
                .as_ref()
                .map(|m| m.orientation)
                .unwrap_or(Orientation::Identity)
        }
    }

    fn check_format(&self, format: &PixelFormat) -> Result<()> {
        if format.num_channels > 4 {
            return Err(Error::TooManyChannels);
        }
        let metadata = self.metadata.as_ref().ok_or(Error::OutOfBounds(1))?;
        if format.num_channels < 3 && !metadata.color_encoding.is_gray() {
            return Err(Error::GrayscaleForColorImage);
        }
        Ok(())
    }

    /// Minimum size of an image output buffer for `format`.
    pub fn image_out_buffer_size(&self, format: &PixelFormat) -> Result<usize> {
        if !self.got_basic_info {
            return Err(Error::OutOfBounds(1));
        }
        self.check_format(format)?;
        let (xsize, ysize) = self.oriented_image_size()?;
        Ok(buffer_size(xsize, ysize, format))
    }

    /// Minimum size of a preview output buffer for `format`.
    pub fn preview_out_buffer_size(&self, format: &PixelFormat) -> Result<usize> {
        if !self.got_basic_info {
            return Err(Error::OutOfBounds(1));
        }
        self.check_format(format)?;
        let metadata = self.metadata.as_ref().ok_or(Error::OutOfBounds(1))?;
        let preview = metadata
            .preview
            .as_ref()
            .ok_or(Error::NoBufferNeeded("preview"))?;
        let (xsize, ysize) = oriented_size(
            self.output_orientation(),
            preview.xsize() as usize,
            preview.ysize() as usize,
        );
        Ok(buffer_size(xsize, ysize, format))
    }

    /// Minimum size of an extra-channel output buffer for `format`.
    pub fn extra_channel_buffer_size(
        &self,
        format: &PixelFormat,
        index: usize,
    ) -> Result<usize> {
        if !self.got_basic_info || self.orig_events_wanted & events::FULL_IMAGE == 0 {
            return Err(Error::NoBufferNeeded("extra channel"));
        }
        self.extra_channel_info(index)?;
        let format = PixelFormat {
            num_channels: 1,
            ..*format
        };
        let (xsize, ysize) = self.oriented_image_size()?;
        Ok(buffer_size(xsize, ysize, &format))
    }

    /// Hands the decoder a buffer for the final image pixels. The decoder
    /// keeps it until the frame is output; retrieve it afterwards with
    /// [`Decoder::take_image_out_buffer`].
    pub fn set_image_out_buffer(&mut self, format: &PixelFormat, buffer: Vec<u8>) -> Result<()> {
        if !self.got_basic_info || self.orig_events_wanted & events::FULL_IMAGE == 0 {
            return Err(Error::NoBufferNeeded("image out"));
        }
        if self.image_out_buffer_set && self.image_out_callback.is_some() {
            return Err(Error::OutputModeConflict);
        }
        let min_size = self.image_out_buffer_size(format)?;
        if buffer.len() < min_size {
            return Err(Error::BufferTooSmall(buffer.len(), min_size));
        }
        self.image_out = Some(buffer);
        self.image_out_format = Some(*format);
        self.image_out_buffer_set = true;
        Ok(())
    }

    /// Streams final pixels to a float scanline callback instead of a
    /// buffer. Only the f32 sample type is supported on this path.
    pub fn set_image_out_callback(
        &mut self,
        format: &PixelFormat,
        callback: Box<dyn ImageOutSink + 'data>,
    ) -> Result<()> {
        if self.image_out_buffer_set && self.image_out.is_some() {
            return Err(Error::OutputModeConflict);
        }
        if format.data_type != crate::api::DataType::F32 {
            return Err(Error::NoBufferNeeded("image out callback"));
        }
        self.check_format(format)?;
        self.image_out_callback = Some(callback);
        self.image_out_format = Some(*format);
        self.image_out_buffer_set = true;
        Ok(())
    }

    /// Retrieves the image buffer after a `FullImage` event.
    pub fn take_image_out_buffer(&mut self) -> Option<Vec<u8>> {
        self.image_out.take()
    }

    pub fn set_preview_out_buffer(
        &mut self,
        format: &PixelFormat,
        buffer: Vec<u8>,
    ) -> Result<()> {
        if !self.got_basic_info
            || self.metadata.as_ref().is_none_or(|m| !m.have_preview())
            || self.orig_events_wanted & events::PREVIEW_IMAGE == 0
        {
            return Err(Error::NoBufferNeeded("preview out"));
        }
        let min_size = self.preview_out_buffer_size(format)?;
        if buffer.len() < min_size {
            return Err(Error::BufferTooSmall(buffer.len(), min_size));
        }
        self.preview_out = Some(buffer);
        self.preview_out_format = Some(*format);
        self.preview_out_buffer_set = true;
        Ok(())
    }

    pub fn take_preview_out_buffer(&mut self) -> Option<Vec<u8>> {
        self.preview_out.take()
    }

    pub fn set_extra_channel_buffer(
        &mut self,
        format: &PixelFormat,
        buffer: Vec<u8>,
        index: usize,
    ) -> Result<()> {
        let min_size = self.extra_channel_buffer_size(format, index)?;
        if buffer.len() < min_size {
            return Err(Error::BufferTooSmall(buffer.len(), min_size));
        }
        let num_extra = self.metadata.as_ref().map_or(0, |m| m.num_extra_channels());
        if self.extra_channel_output.len() < num_extra {
            self.extra_channel_output.resize_with(num_extra, || None);
        }
        let format = PixelFormat {
            num_channels: 1,
            ..*format
        };
        self.extra_channel_output[index] = Some((format, buffer));
        Ok(())
    }

    pub fn take_extra_channel_buffer(&mut self, index: usize) -> Option<Vec<u8>> {
        self.extra_channel_output
            .get_mut(index)?
            .take()
            .map(|(_, buffer)| buffer)
    }

    /// Best-effort early output of the frame currently being decoded, per
    /// the restricted conditions: an image buffer is set, DC is decoded,
    /// the frame is VarDCT and there are no extra channels. Produces a
    /// lossy preview of the in-flight frame; any violated precondition is
    /// an error with no side effects.
    pub fn flush_image(&mut self) -> Result<()> {
        if !self.image_out_buffer_set || self.image_out.is_none() {
            return Err(Error::CannotFlush("no image out buffer set"));
        }
        let Some(sections) = self.sections.as_ref() else {
            return Err(Error::CannotFlush("no frame in progress"));
        };
        if sections.num_received() == 0 {
            return Err(Error::CannotFlush("no sections received"));
        }
        if !self.frame_dec_in_progress {
            return Err(Error::CannotFlush("no frame decode in progress"));
        }
        let codec = self
            .frame_codec
            .as_mut()
            .ok_or(Error::CannotFlush("no frame decode in progress"))?;
        if !codec.has_decoded_dc() {
            return Err(Error::CannotFlush("DC is not decoded yet"));
        }
        let header = self
            .frame_header
            .as_ref()
            .ok_or(Error::CannotFlush("no frame in progress"))?;
        if header.encoding != crate::headers::frame_header::Encoding::VarDCT {
            return Err(Error::CannotFlush("frame is not VarDCT"));
        }
        let metadata = self.metadata.as_ref().ok_or(Error::OutOfBounds(1))?;
        if metadata.num_extra_channels() > 0 {
            return Err(Error::CannotFlush("image has extra channels"));
        }
        let bundle = self
            .ib
            .as_mut()
            .ok_or(Error::CannotFlush("no frame in progress"))?;
        codec.flush(bundle, None)?;
        if codec.uses_direct_output() {
            return Ok(());
        }
        let format = self.image_out_format.as_ref().unwrap();
        let orientation = if self.keep_orientation {
            Orientation::Identity
        } else {
            metadata.orientation
        };
        convert::convert_image(bundle, format, orientation, self.image_out.as_mut().unwrap())
    }
}

impl Default for Decoder<'_> {
    fn default() -> Self {
        Decoder::new()
    }
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The contract between the streaming front-end and the per-frame inner
//! decoder. The inner decoder (entropy decoding, dequantization, render
//! pipeline) is a collaborator behind [`FrameCodec`]; the front-end only
//! slices the stream into complete sections and drives the stages.

use crate::bit_reader::BitReader;
use crate::error::Result;
use crate::headers::frame_header::FrameHeader;
use crate::headers::image_metadata::ImageMetadata;
use crate::image::ImageBundle;

/// Outcome of handing one section to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionStatus {
    /// Not processed in this batch.
    #[default]
    Pending,
    /// Some data was used but the section needs a later batch to finish.
    Partial,
    /// Fully decoded.
    Done,
    /// Deliberately not decoded (e.g. an unneeded pass).
    Skipped,
}

/// One complete section, addressed by its TOC index, with a bit reader
/// over exactly the section's bytes.
pub struct SectionInfo<'a> {
    pub id: usize,
    pub br: BitReader<'a>,
}

/// Scanline sink for the streaming float output path.
pub trait ImageOutSink {
    /// Receives `pixels` (interleaved samples) for the run starting at
    /// `(x, y)`.
    fn write_scanline(&mut self, x: usize, y: usize, pixels: &[f32]);
}

/// Direct output fast paths the driver may offer to the codec, bypassing
/// the generic conversion stage.
pub enum OutputTarget<'buf, 'sink> {
    /// Interleaved 8-bit RGB(A) raster owned by the caller.
    Rgb8 {
        buffer: &'buf mut [u8],
        stride: usize,
        rgba: bool,
        undo_orientation: bool,
    },
    /// Native-endian float scanline callback.
    Scanlines(&'sink mut dyn ImageOutSink),
}

/// Everything the codec needs to set up one frame.
pub struct FrameContext<'a> {
    pub frame_header: &'a FrameHeader,
    pub metadata: &'a ImageMetadata,
    pub section_offsets: Vec<usize>,
    pub section_sizes: Vec<usize>,
    pub is_preview: bool,
}

/// The per-frame inner decoder, treated as a black box. Implementations
/// must accept sections in any order and in any batching.
pub trait FrameCodec {
    fn num_sections(&self) -> usize;
    fn section_offsets(&self) -> &[usize];
    fn section_sizes(&self) -> &[usize];

    /// Decodes a batch of complete sections. `bundle` is the frame's pixel
    /// storage; `output` is a fast path that, when accepted earlier via
    /// [`FrameCodec::uses_direct_output`], receives pixels directly.
    fn process_sections(
        &mut self,
        sections: &mut [SectionInfo<'_>],
        status: &mut [SectionStatus],
        bundle: &mut ImageBundle,
        output: Option<OutputTarget<'_, '_>>,
    ) -> Result<()>;

    /// True once enough sections are in to render a DC approximation.
    fn has_decoded_dc(&self) -> bool;

    /// Best-effort render of everything decoded so far into `bundle` or
    /// the direct output.
    fn flush(
        &mut self,
        bundle: &mut ImageBundle,
        output: Option<OutputTarget<'_, '_>>,
    ) -> Result<()>;

    /// Bitmask of the storage slots this frame actually read, valid after
    /// all sections were processed.
    fn references(&self) -> u8;

    /// Completes the frame: blending, reference-frame saving, final
    /// writes to `bundle`.
    fn finalize_frame(&mut self, bundle: &mut ImageBundle) -> Result<()>;

    /// Whether the codec wrote pixels through a direct [`OutputTarget`],
    /// making the conversion stage unnecessary.
    fn uses_direct_output(&self) -> bool {
        false
    }
}

/// Creates one [`FrameCodec`] per frame; injected by the caller since the
/// inner decoder is out of the front-end's scope.
pub trait FrameCodecFactory {
    fn make_codec(
        &self,
        context: &FrameContext<'_>,
        runner: &dyn ParallelRunner,
    ) -> Result<Box<dyn FrameCodec>>;
}

/// Seam for the caller-provided thread pool used by section decoding.
pub trait ParallelRunner {
    /// Invokes `op` for every index in `0..count`, possibly concurrently.
    fn run(&self, count: usize, op: &(dyn Fn(usize) + Sync));
}

/// Runs everything on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialRunner;

impl ParallelRunner for SequentialRunner {
    fn run(&self, count: usize, op: &(dyn Fn(usize) + Sync)) {
        for i in 0..count {
            op(i);
        }
    }
}

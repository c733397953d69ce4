// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

/// Decoding errors.
///
/// `OutOfBounds` is special: it reports a read past the end of the window
/// that is currently being filled, and carries a lower bound on the number
/// of additional bytes needed. The streaming driver translates it into
/// [`crate::api::Event::NeedMoreInput`]; every other variant is a format
/// violation that taints the decoder until a reset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Read out of bounds, need at least {0} more bytes")]
    OutOfBounds(usize),
    #[error("Non-zero padding bits")]
    NonZeroPadding,
    #[error("Invalid signature {0:02x}{1:02x}")]
    InvalidSignature(u8, u8),
    #[error("Invalid ISO-BMFF box")]
    InvalidBox,
    #[error("Box size overflows the file offset")]
    BoxSizeOverflow,
    #[error("jxlp box too small to contain its index")]
    JxlpBoxTooSmall,
    #[error("jxlp box {0} out of order, expected {1}")]
    JxlpIndexOutOfOrder(u32, u32),
    #[error("Unbounded box is a non-final codestream part")]
    UnboundedIntermediateBox,
    #[error("No codestream box found in container")]
    NoCodestreamBox,
    #[error("Invalid exponent_bits_per_sample: {0}")]
    InvalidExponent(u32),
    #[error("Invalid mantissa_bits: {0}")]
    InvalidMantissa(i32),
    #[error("Invalid bits_per_sample: {0}")]
    InvalidBitsPerSample(u32),
    #[error("Invalid enum value {0} for {1}")]
    InvalidEnum(u32, &'static str),
    #[error("Value of dim_shift {0} is too large")]
    DimShiftTooLarge(u32),
    #[error("Float is NaN or Inf")]
    FloatNaNOrInf,
    #[error("Invalid gamma value: {0}")]
    InvalidGamma(f32),
    #[error("Invalid intensity_target: {0}")]
    InvalidIntensityTarget(f32),
    #[error("Invalid min_nits: {0}")]
    InvalidMinNits(f32),
    #[error("Invalid linear_below {1}, relative_to_max_display is {0}")]
    InvalidLinearBelow(bool, f32),
    #[error("Invalid color encoding description: {0}")]
    InvalidDescription(String),
    #[error("Invalid non-UTF-8 name in header")]
    InvalidName,
    #[error("Image size too large: {0}x{1}")]
    ImageSizeTooLarge(u64, u64),
    #[error("Invalid image size: {0}x{1}")]
    InvalidImageSize(u64, u64),
    #[error("CPU budget exceeded")]
    CpuBudgetExceeded,
    #[error("ICC profile is too large: {0} bytes")]
    IccTooLarge(u64),
    #[error("No ICC profile present")]
    NoIcc,
    #[error("Color profile is an ICC profile, not an encoded color space")]
    WantIcc,
    #[error("Permuted TOC requires the entropy-coded permutation decoder")]
    PermutedTocUnsupported,
    #[error("Invalid TOC: sum of entries overflows")]
    TocSizeOverflow,
    #[error("Section {0} out of frame bounds")]
    SectionOutOfBounds(usize),
    #[error("Handed-off section read out of bounds")]
    SectionTooShort,
    #[error("Invalid extra channel upsampling: upsampling {0}, dim_shift {1}, ec_upsampling {2}")]
    InvalidEcUpsampling(u32, u32, u32),
    #[error("num_ds {0} must be smaller than num_passes {1}")]
    NumPassesTooLarge(u32, u32),
    #[error("Invalid jbrd box payload")]
    InvalidJbrdBox,
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    // Usage violations: reported at the entry point, decoder stage unchanged.
    #[error("Input buffer already set, call release_input first")]
    InputAlreadySet,
    #[error("Cannot subscribe to non-informative events")]
    InvalidEventSubscription,
    #[error("Operation only valid before the first process_input call")]
    AlreadyStarted,
    #[error("Decoder is in the error state, reset it to continue")]
    DecoderTainted,
    #[error("Decoder already finished, reset it to decode again")]
    DecoderFinished,
    #[error("No {0} buffer needed at this time")]
    NoBufferNeeded(&'static str),
    #[error("Output buffer too small: {0} < {1}")]
    BufferTooSmall(usize, usize),
    #[error("Cannot switch between image-out buffer and callback")]
    OutputModeConflict,
    #[error("Grayscale output not possible for a color image")]
    GrayscaleForColorImage,
    #[error("More than 4 channels not supported")]
    TooManyChannels,
    #[error("Invalid extra channel index {0}")]
    InvalidExtraChannelIndex(usize),
    #[error("Parallel runner already set")]
    RunnerAlreadySet,
    #[error("No frame codec factory installed")]
    NoFrameCodec,
    #[error("Frame codec reported an error: {0}")]
    FrameCodecFailed(String),
    #[error("Cannot flush: {0}")]
    CannotFlush(&'static str),
    // PNM codec errors.
    #[error("PNM: {0}")]
    PnmParse(&'static str),
    #[error("PNM: bad MaxVal")]
    PnmBadMaxVal,
    #[error("PNM: cannot store alpha")]
    PnmAlphaUnsupported,
    #[error("Cannot encode color image as PBM")]
    PnmColorAsPbm,
    #[error("PNM cannot have more than 16 bits")]
    PnmTooManyBits,
    #[error("PNM: mismatch between file and color_space hint")]
    PnmHintMismatch,
    #[error("Y4M: {0}")]
    Y4mParse(&'static str),
    #[error("Failed to read ICC file {0}: {1}")]
    IccFileRead(String, String),
    #[error("Header does not fit in the {0}-byte scratch")]
    HeaderTooLarge(usize),
}

impl Error {
    /// True for the transient input-shortage kind, false for everything
    /// that permanently taints the decoder.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::OutOfBounds(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

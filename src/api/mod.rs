// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The streaming decoder front-end: push bytes in, get events out.

mod codestream;
mod convert;
mod decoder;
mod dependencies;
mod process;
mod sections;
pub mod signature;


pub use decoder::{BasicInfo, Decoder, DecoderLimits, FrameInfo};
pub use signature::{check_signature, Signature};

use crate::error::Error;

/// Informative events a caller can subscribe to, as a bitmask. The low six
/// bits are reserved for the status-like events and cannot be subscribed.
pub mod events {
    pub const BASIC_INFO: u32 = 0x40;
    pub const EXTENSIONS: u32 = 0x80;
    pub const COLOR_ENCODING: u32 = 0x100;
    pub const PREVIEW_IMAGE: u32 = 0x200;
    pub const FRAME: u32 = 0x400;
    pub const FULL_IMAGE: u32 = 0x1000;
    pub const JPEG_RECONSTRUCTION: u32 = 0x2000;

    pub const ALL: u32 = BASIC_INFO
        | EXTENSIONS
        | COLOR_ENCODING
        | PREVIEW_IMAGE
        | FRAME
        | FULL_IMAGE
        | JPEG_RECONSTRUCTION;
}

/// What a `process_input` call produced. Informative events are delivered
/// at most once per image (or per frame, for the per-frame ones) and in
/// canonical order; the remaining variants are suspension points or
/// terminal states.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BasicInfo,
    Extensions,
    ColorEncoding,
    PreviewImage,
    Frame,
    FullImage,
    JpegReconstruction,
    NeedMoreInput,
    NeedPreviewOutBuffer,
    NeedImageOutBuffer,
    Success,
    Error(Error),
}

impl Event {
    /// The subscription bit for informative events, 0 otherwise.
    pub fn mask_bit(&self) -> u32 {
        match self {
            Event::BasicInfo => events::BASIC_INFO,
            Event::Extensions => events::EXTENSIONS,
            Event::ColorEncoding => events::COLOR_ENCODING,
            Event::PreviewImage => events::PREVIEW_IMAGE,
            Event::Frame => events::FRAME,
            Event::FullImage => events::FULL_IMAGE,
            Event::JpegReconstruction => events::JPEG_RECONSTRUCTION,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    U16,
    F16,
    F32,
}

impl DataType {
    pub fn bits_per_sample(&self) -> usize {
        match self {
            DataType::U8 => 8,
            DataType::U16 | DataType::F16 => 16,
            DataType::F32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample() / 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Native,
    Little,
    Big,
}

impl Endianness {
    pub fn is_little(&self) -> bool {
        match self {
            Endianness::Little => true,
            Endianness::Big => false,
            Endianness::Native => cfg!(target_endian = "little"),
        }
    }
}

/// Caller-requested pixel layout for an output buffer or callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub num_channels: u32,
    pub data_type: DataType,
    pub endianness: Endianness,
    /// Row alignment in bytes; values above 1 round the stride up.
    pub align: usize,
}

impl PixelFormat {
    pub fn new(num_channels: u32, data_type: DataType) -> PixelFormat {
        PixelFormat {
            num_channels,
            data_type,
            endianness: Endianness::Native,
            align: 0,
        }
    }
}

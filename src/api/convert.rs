// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Converts a decoded frame bundle into the caller's pixel layout:
//! orientation, interleaving, sample type and endianness.

use half::f16;

use crate::api::{DataType, PixelFormat};
use crate::error::{Error, Result};
use crate::frame::ImageOutSink;
use crate::headers::image_metadata::Orientation;
use crate::image::{Image, ImageBundle};

/// Row stride in bytes for an oriented width, rounded up to the format's
/// alignment.
pub fn stride_for(oriented_xsize: usize, format: &PixelFormat) -> usize {
    let bits = format.data_type.bits_per_sample() * format.num_channels as usize;
    let mut stride = (oriented_xsize * bits).div_ceil(8);
    if format.align > 1 {
        stride = stride.div_ceil(format.align) * format.align;
    }
    stride
}

/// Minimum buffer size for an oriented image in the given format.
pub fn buffer_size(
    oriented_xsize: usize,
    oriented_ysize: usize,
    format: &PixelFormat,
) -> usize {
    stride_for(oriented_xsize, format) * oriented_ysize
}

/// Maps an oriented coordinate back to the source coordinate.
fn source_coord(
    orientation: Orientation,
    ox: usize,
    oy: usize,
    w: usize,
    h: usize,
) -> (usize, usize) {
    match orientation {
        Orientation::Identity => (ox, oy),
        Orientation::FlipHorizontal => (w - 1 - ox, oy),
        Orientation::Rotate180 => (w - 1 - ox, h - 1 - oy),
        Orientation::FlipVertical => (ox, h - 1 - oy),
        Orientation::Transpose => (oy, ox),
        Orientation::Rotate90 => (oy, h - 1 - ox),
        Orientation::AntiTranspose => (w - 1 - oy, h - 1 - ox),
        Orientation::Rotate270 => (w - 1 - oy, ox),
    }
}

/// Oriented dimensions for a source of `w x h`.
pub fn oriented_size(orientation: Orientation, w: usize, h: usize) -> (usize, usize) {
    if orientation.is_transposing() {
        (h, w)
    } else {
        (w, h)
    }
}

fn write_sample(format: &PixelFormat, value: f32, out: &mut [u8]) {
    match format.data_type {
        DataType::U8 => {
            out[0] = (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        }
        DataType::U16 => {
            let v = (value.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16;
            let bytes = if format.endianness.is_little() {
                v.to_le_bytes()
            } else {
                v.to_be_bytes()
            };
            out[..2].copy_from_slice(&bytes);
        }
        DataType::F16 => {
            let v = f16::from_f32(value).to_bits();
            let bytes = if format.endianness.is_little() {
                v.to_le_bytes()
            } else {
                v.to_be_bytes()
            };
            out[..2].copy_from_slice(&bytes);
        }
        DataType::F32 => {
            let bytes = if format.endianness.is_little() {
                value.to_le_bytes()
            } else {
                value.to_be_bytes()
            };
            out[..4].copy_from_slice(&bytes);
        }
    }
}

fn gather_channels<'a>(bundle: &'a ImageBundle, format: &PixelFormat) -> Result<Vec<&'a Image>> {
    let num_channels = format.num_channels as usize;
    if num_channels > 4 {
        return Err(Error::TooManyChannels);
    }
    if num_channels < 3 && !bundle.is_gray() {
        return Err(Error::GrayscaleForColorImage);
    }
    let mut channels: Vec<&Image> = Vec::new();
    if bundle.is_gray() {
        channels.push(&bundle.color[0]);
    } else {
        channels.extend(bundle.color.iter().take(3));
    }
    let wants_alpha = num_channels == 2 || num_channels == 4;
    if wants_alpha {
        // The first extra channel plays the alpha role; without one the
        // output is opaque.
        channels.push(bundle.extra.first().unwrap_or(&bundle.color[0]));
    }
    Ok(channels)
}

/// Converts the full bundle into `out`, applying `orientation`.
pub fn convert_image(
    bundle: &ImageBundle,
    format: &PixelFormat,
    orientation: Orientation,
    out: &mut [u8],
) -> Result<()> {
    let channels = gather_channels(bundle, format)?;
    let has_synthetic_alpha =
        (format.num_channels == 2 || format.num_channels == 4) && bundle.extra.is_empty();
    let (w, h) = (bundle.xsize(), bundle.ysize());
    let (ow, oh) = oriented_size(orientation, w, h);
    let stride = stride_for(ow, format);
    let needed = stride * oh;
    if out.len() < needed {
        return Err(Error::BufferTooSmall(out.len(), needed));
    }
    let bytes_per_sample = format.data_type.bytes_per_sample();
    let bytes_per_pixel = bytes_per_sample * format.num_channels as usize;
    for oy in 0..oh {
        let row = &mut out[oy * stride..oy * stride + ow * bytes_per_pixel];
        for ox in 0..ow {
            let (x, y) = source_coord(orientation, ox, oy, w, h);
            for (c, plane) in channels.iter().enumerate() {
                let synthetic = has_synthetic_alpha && c == channels.len() - 1;
                let value = if synthetic { 1.0 } else { plane.row(y)[x] };
                let off = ox * bytes_per_pixel + c * bytes_per_sample;
                write_sample(format, value, &mut row[off..]);
            }
        }
    }
    Ok(())
}

/// Converts a single extra-channel plane; the format's channel count is
/// ignored and treated as 1.
pub fn convert_extra_channel(
    plane: &Image,
    format: &PixelFormat,
    orientation: Orientation,
    out: &mut [u8],
) -> Result<()> {
    let format = PixelFormat {
        num_channels: 1,
        ..*format
    };
    let (w, h) = plane.size();
    let (ow, oh) = oriented_size(orientation, w, h);
    let stride = stride_for(ow, &format);
    let needed = stride * oh;
    if out.len() < needed {
        return Err(Error::BufferTooSmall(out.len(), needed));
    }
    let bytes_per_sample = format.data_type.bytes_per_sample();
    for oy in 0..oh {
        let row = &mut out[oy * stride..];
        for ox in 0..ow {
            let (x, y) = source_coord(orientation, ox, oy, w, h);
            write_sample(&format, plane.row(y)[x], &mut row[ox * bytes_per_sample..]);
        }
    }
    Ok(())
}

/// Streams the bundle to a float scanline sink, one oriented row at a time.
pub fn convert_to_sink(
    bundle: &ImageBundle,
    format: &PixelFormat,
    orientation: Orientation,
    sink: &mut dyn ImageOutSink,
) -> Result<()> {
    let channels = gather_channels(bundle, format)?;
    let has_synthetic_alpha =
        (format.num_channels == 2 || format.num_channels == 4) && bundle.extra.is_empty();
    let (w, h) = (bundle.xsize(), bundle.ysize());
    let (ow, oh) = oriented_size(orientation, w, h);
    let num_channels = format.num_channels as usize;
    let mut row = vec![0.0f32; ow * num_channels];
    for oy in 0..oh {
        for ox in 0..ow {
            let (x, y) = source_coord(orientation, ox, oy, w, h);
            for (c, plane) in channels.iter().enumerate() {
                let synthetic = has_synthetic_alpha && c == channels.len() - 1;
                row[ox * num_channels + c] = if synthetic { 1.0 } else { plane.row(y)[x] };
            }
        }
        sink.write_scanline(0, oy, &row);
    }
    Ok(())
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! PNM family codec: PBM/PGM/PPM, the floating-point PFM variant, and the
//! Y4M YUV wrapper. Text headers, raw payloads, bit-exact round trips.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::headers::color_encoding::ColorEncoding;
use crate::image::{ChromaSubsampling, ColorTransform, Image, ImageBundle};
use crate::util::ceil_log2_nonzero;
use crate::util::tracing_wrappers::*;

const MAX_HEADER_SIZE: usize = 200;

/// Ordered key=value decode hints, applied in insertion order.
#[derive(Debug, Default, Clone)]
pub struct DecoderHints {
    entries: Vec<(String, String)>,
}

impl DecoderHints {
    pub fn new() -> DecoderHints {
        DecoderHints::default()
    }

    pub fn add(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PnmHeader {
    pub xsize: usize,
    pub ysize: usize,
    /// PBM: one bit per sample.
    pub is_bit: bool,
    pub is_gray: bool,
    /// Set for Y4M input.
    pub subsampling: Option<ChromaSubsampling>,
    pub bits_per_sample: u32,
    pub floating_point: bool,
    pub big_endian: bool,
}

/// A decoded portable-format image.
#[derive(Debug, Clone)]
pub struct PnmImage {
    pub header: PnmHeader,
    pub bundle: ImageBundle,
    pub color_encoding: ColorEncoding,
    pub icc: Option<Vec<u8>>,
}

/// Text-header parser. Exposes the numeric field parsers for testing.
pub struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_line_break(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

fn is_whitespace(c: u8) -> bool {
    is_line_break(c) || c == b'\t' || c == b' '
}

impl<'a> Parser<'a> {
    pub fn new(bytes: &'a [u8]) -> Parser<'a> {
        Parser { bytes, pos: 0 }
    }

    /// Parses the header; on success the parser is positioned at the first
    /// payload byte.
    pub fn parse_header(&mut self) -> Result<PnmHeader> {
        if self.bytes.len() < 2 {
            return Err(Error::PnmParse("file too short for magic"));
        }
        if self.bytes[0] == b'Y' && self.bytes[1] == b'U' {
            return self.parse_header_y4m();
        }
        if self.bytes[0] != b'P' {
            return Err(Error::PnmParse("unknown magic"));
        }
        let kind = self.bytes[1];
        self.pos = 2;
        match kind {
            b'4' => self.parse_header_pnm(/*is_bit=*/ true, /*is_gray=*/ true),
            b'5' => self.parse_header_pnm(false, true),
            b'6' => self.parse_header_pnm(false, false),
            b'f' => self.parse_header_pfm(/*is_gray=*/ true),
            b'F' => self.parse_header_pfm(false),
            _ => Err(Error::PnmParse("unknown magic")),
        }
    }

    pub fn parse_unsigned(&mut self) -> Result<usize> {
        if self.pos == self.bytes.len() {
            return Err(Error::PnmParse("reached end before number"));
        }
        if !is_digit(self.bytes[self.pos]) {
            return Err(Error::PnmParse("expected unsigned number"));
        }
        let mut number: usize = 0;
        while self.pos < self.bytes.len() && is_digit(self.bytes[self.pos]) {
            number = number
                .checked_mul(10)
                .and_then(|n| n.checked_add((self.bytes[self.pos] - b'0') as usize))
                .ok_or(Error::PnmParse("number too large"))?;
            self.pos += 1;
        }
        Ok(number)
    }

    pub fn parse_signed(&mut self) -> Result<f64> {
        if self.pos == self.bytes.len() {
            return Err(Error::PnmParse("reached end before signed"));
        }
        let first = self.bytes[self.pos];
        if first != b'-' && first != b'+' && !is_digit(first) {
            return Err(Error::PnmParse("expected signed number"));
        }
        let is_neg = first == b'-';
        if is_neg || first == b'+' {
            self.pos += 1;
            if self.pos == self.bytes.len() {
                return Err(Error::PnmParse("reached end before digits"));
            }
        }
        let mut number: f64 = 0.0;
        while self.pos < self.bytes.len() && is_digit(self.bytes[self.pos]) {
            number = number * 10.0 + (self.bytes[self.pos] - b'0') as f64;
            self.pos += 1;
        }
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'.' {
            self.pos += 1;
            let mut place = 0.1;
            while self.pos < self.bytes.len() && is_digit(self.bytes[self.pos]) {
                number += (self.bytes[self.pos] - b'0') as f64 * place;
                place *= 0.1;
                self.pos += 1;
            }
        }
        Ok(if is_neg { -number } else { number })
    }

    fn skip_blank(&mut self) -> Result<()> {
        if self.pos == self.bytes.len() {
            return Err(Error::PnmParse("reached end before blank"));
        }
        let c = self.bytes[self.pos];
        if c != b' ' && c != b'\n' {
            return Err(Error::PnmParse("expected blank"));
        }
        self.pos += 1;
        Ok(())
    }

    fn skip_single_whitespace(&mut self) -> Result<()> {
        if self.pos == self.bytes.len() {
            return Err(Error::PnmParse("reached end before whitespace"));
        }
        if !is_whitespace(self.bytes[self.pos]) {
            return Err(Error::PnmParse("expected whitespace"));
        }
        self.pos += 1;
        Ok(())
    }

    /// Runs of whitespace, with `#...` comments allowed between fields.
    fn skip_whitespace(&mut self) -> Result<()> {
        if self.pos == self.bytes.len() {
            return Err(Error::PnmParse("reached end before whitespace"));
        }
        if !is_whitespace(self.bytes[self.pos]) && self.bytes[self.pos] != b'#' {
            return Err(Error::PnmParse("expected whitespace/comment"));
        }
        while self.pos < self.bytes.len() && is_whitespace(self.bytes[self.pos]) {
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b'#' {
            while self.pos < self.bytes.len() && !is_line_break(self.bytes[self.pos]) {
                self.pos += 1;
            }
            while self.pos < self.bytes.len() && is_line_break(self.bytes[self.pos]) {
                self.pos += 1;
            }
        }
        while self.pos < self.bytes.len() && is_whitespace(self.bytes[self.pos]) {
            self.pos += 1;
        }
        Ok(())
    }

    fn expect_string(&mut self, s: &str) -> Result<()> {
        if self.pos + s.len() > self.bytes.len()
            || &self.bytes[self.pos..self.pos + s.len()] != s.as_bytes()
        {
            return Err(Error::Y4mParse("expected keyword"));
        }
        self.pos += s.len();
        Ok(())
    }

    fn read_char(&mut self) -> Result<u8> {
        if self.pos >= self.bytes.len() {
            return Err(Error::Y4mParse("unexpected end of input"));
        }
        let c = self.bytes[self.pos];
        self.pos += 1;
        Ok(c)
    }

    fn parse_header_pnm(&mut self, is_bit: bool, is_gray: bool) -> Result<PnmHeader> {
        self.skip_whitespace()?;
        let xsize = self.parse_unsigned()?;
        self.skip_whitespace()?;
        let ysize = self.parse_unsigned()?;
        let bits_per_sample = if is_bit {
            1
        } else {
            self.skip_whitespace()?;
            let max_val = self.parse_unsigned()?;
            if max_val == 0 || max_val >= 65536 {
                return Err(Error::PnmBadMaxVal);
            }
            ceil_log2_nonzero(max_val as u64 + 1)
        };
        self.skip_single_whitespace()?;
        Ok(PnmHeader {
            xsize,
            ysize,
            is_bit,
            is_gray,
            subsampling: None,
            bits_per_sample,
            floating_point: false,
            big_endian: true,
        })
    }

    fn parse_header_pfm(&mut self, is_gray: bool) -> Result<PnmHeader> {
        self.skip_single_whitespace()?;
        let xsize = self.parse_unsigned()?;
        self.skip_blank()?;
        let ysize = self.parse_unsigned()?;
        self.skip_single_whitespace()?;
        // The scale is meaningless as a multiplier; only its sign encodes
        // the endianness. Values are nominally 0..1.
        let scale = self.parse_signed()?;
        self.skip_single_whitespace()?;
        Ok(PnmHeader {
            xsize,
            ysize,
            is_bit: false,
            is_gray,
            subsampling: None,
            bits_per_sample: 32,
            floating_point: true,
            big_endian: scale >= 0.0,
        })
    }

    fn parse_header_y4m(&mut self) -> Result<PnmHeader> {
        self.expect_string("YUV4MPEG2")?;
        let mut header = PnmHeader {
            xsize: 0,
            ysize: 0,
            is_bit: false,
            is_gray: false,
            subsampling: Some(ChromaSubsampling::C420),
            bits_per_sample: 8,
            floating_point: false,
            big_endian: true,
        };
        while self.pos < self.bytes.len() {
            let next = self.read_char()?;
            if next == 0x0a {
                break;
            }
            if next != b' ' {
                continue;
            }
            let field = self.read_char()?;
            let mut skip_rest = false;
            match field {
                b'W' => header.xsize = self.parse_unsigned()?,
                b'H' => header.ysize = self.parse_unsigned()?,
                b'I' => {
                    if self.read_char()? != b'p' {
                        return Err(Error::Y4mParse("only progressive input allowed"));
                    }
                }
                b'C' => {
                    let c1 = self.read_char()?;
                    let c2 = self.read_char()?;
                    let c3 = self.read_char()?;
                    if c1 != b'4' {
                        return Err(Error::Y4mParse("invalid C param"));
                    }
                    header.subsampling = Some(match (c2, c3) {
                        (b'4', b'4') => ChromaSubsampling::C444,
                        (b'2', b'2') => ChromaSubsampling::C422,
                        (b'2', b'0') => ChromaSubsampling::C420,
                        _ => return Err(Error::Y4mParse("invalid C param")),
                    });
                    // Values like "C420jpeg" append a chroma sample
                    // location; ignore it like the F/A/X fields.
                    skip_rest = true;
                }
                b'F' | b'A' | b'X' => skip_rest = true,
                _ => return Err(Error::Y4mParse("parse error")),
            }
            if skip_rest {
                while self.pos < self.bytes.len() {
                    if self.bytes[self.pos] == b' ' || self.bytes[self.pos] == 0x0a {
                        break;
                    }
                    self.pos += 1;
                }
            }
        }
        self.expect_string("FRAME")?;
        loop {
            if self.read_char()? == 0x0a {
                return Ok(header);
            }
        }
    }
}

fn apply_hints(is_gray: bool, hints: &DecoderHints) -> Result<(ColorEncoding, Option<Vec<u8>>)> {
    let mut color_encoding = None;
    let mut icc = None;
    for (key, value) in hints.iter() {
        match key {
            "color_space" => {
                let encoding = ColorEncoding::from_description(value)?;
                if is_gray != encoding.is_gray() {
                    return Err(Error::PnmHintMismatch);
                }
                color_encoding = Some(encoding);
            }
            "icc_pathname" => {
                let bytes = std::fs::read(value).map_err(|e| {
                    Error::IccFileRead(value.to_string(), e.to_string())
                })?;
                icc = Some(bytes);
            }
            _ => {
                warn!("PNM decoder ignoring {key} hint");
            }
        }
    }
    let color_encoding = match color_encoding {
        Some(encoding) => encoding,
        None if icc.is_some() => ColorEncoding::srgb(is_gray),
        None => {
            warn!("PNM: no color_space/icc_pathname given, assuming sRGB");
            ColorEncoding::srgb(is_gray)
        }
    };
    Ok((color_encoding, icc))
}

fn decode_y4m(header: &PnmHeader, payload: &[u8]) -> Result<ImageBundle> {
    let subsampling = header.subsampling.unwrap();
    let mut bundle = ImageBundle::new(header.xsize, header.ysize, 3)?;
    let shifts = subsampling.shifts();
    let mut pos = 0;
    // File order is Y, Cb, Cr; the bundle keeps Y on plane 1 and the
    // chroma planes on 0 and 2.
    for plane_idx in [1usize, 0, 2] {
        let (hshift, vshift) = shifts[plane_idx];
        let plane_xsize = header.xsize >> hshift;
        let plane_ysize = header.ysize >> vshift;
        let mut plane = Image::new(plane_xsize, plane_ysize)?;
        for y in 0..plane_ysize {
            if pos + plane_xsize > payload.len() {
                return Err(Error::Y4mParse("not enough image data"));
            }
            let row = plane.row_mut(y);
            for (x, value) in payload[pos..pos + plane_xsize].iter().enumerate() {
                row[x] = (*value as f32 - 128.0) / 255.0;
            }
            pos += plane_xsize;
        }
        bundle.color[plane_idx] = plane;
    }
    bundle.color_transform = ColorTransform::YCbCr;
    bundle.chroma_subsampling = subsampling;
    Ok(bundle)
}

fn decode_raster(header: &PnmHeader, payload: &[u8]) -> Result<ImageBundle> {
    let channels = if header.is_gray { 1 } else { 3 };
    let mut bundle = ImageBundle::new(header.xsize, header.ysize, channels)?;
    if header.is_bit {
        // PBM: one bit per sample, most significant bit first, rows padded
        // to whole bytes; a set bit is black.
        let stride = header.xsize.div_ceil(8);
        for y in 0..header.ysize {
            if (y + 1) * stride > payload.len() {
                return Err(Error::PnmParse("not enough image data"));
            }
            let row_bytes = &payload[y * stride..(y + 1) * stride];
            let row = bundle.color[0].row_mut(y);
            for (x, value) in row.iter_mut().enumerate() {
                let bit = row_bytes[x / 8] & (0x80 >> (x % 8));
                *value = if bit != 0 { 0.0 } else { 1.0 };
            }
        }
        return Ok(bundle);
    }
    let bytes_per_sample = if header.floating_point {
        4
    } else if header.bits_per_sample > 8 {
        2
    } else {
        1
    };
    let samples_per_row = header.xsize * channels;
    let stride = samples_per_row * bytes_per_sample;
    if header
        .ysize
        .checked_mul(stride)
        .is_none_or(|total| total > payload.len())
    {
        return Err(Error::PnmParse("not enough image data"));
    }
    let max_val = if header.floating_point {
        1.0
    } else {
        ((1u32 << header.bits_per_sample) - 1) as f32
    };
    for y in 0..header.ysize {
        let row_bytes = &payload[y * stride..(y + 1) * stride];
        for x in 0..header.xsize {
            for c in 0..channels {
                let offset = (x * channels + c) * bytes_per_sample;
                let value = match (header.floating_point, bytes_per_sample) {
                    (true, _) => {
                        let bits: [u8; 4] = row_bytes[offset..offset + 4].try_into().unwrap();
                        if header.big_endian {
                            f32::from_be_bytes(bits)
                        } else {
                            f32::from_le_bytes(bits)
                        }
                    }
                    (false, 1) => row_bytes[offset] as f32 / max_val,
                    (false, _) => {
                        let bits: [u8; 2] = row_bytes[offset..offset + 2].try_into().unwrap();
                        u16::from_be_bytes(bits) as f32 / max_val
                    }
                };
                bundle.color[c].row_mut(y)[x] = value;
            }
        }
    }
    if header.floating_point {
        // PFM scanlines are stored bottom-up.
        for plane in bundle.color.iter_mut() {
            plane.flip_vertical();
        }
    }
    Ok(bundle)
}

/// Decodes a PNM/PFM/Y4M file. Only the first Y4M frame is decoded;
/// trailing frames are ignored.
pub fn decode(bytes: &[u8], hints: &DecoderHints) -> Result<PnmImage> {
    let mut parser = Parser::new(bytes);
    let header = parser.parse_header()?;
    if header.xsize == 0 || header.ysize == 0 {
        return Err(Error::InvalidImageSize(
            header.xsize as u64,
            header.ysize as u64,
        ));
    }
    if header.bits_per_sample == 0 || header.bits_per_sample > 32 {
        return Err(Error::PnmParse("bits_per_sample invalid"));
    }
    let (color_encoding, icc) = apply_hints(header.is_gray, hints)?;
    let payload = &bytes[parser.pos..];
    let bundle = if header.subsampling.is_some() {
        decode_y4m(&header, payload)?
    } else {
        decode_raster(&header, payload)?
    };
    Ok(PnmImage {
        header,
        bundle,
        color_encoding,
        icc,
    })
}

fn encode_header(
    bundle: &ImageBundle,
    bits_per_sample: u32,
    little_endian: bool,
) -> Result<String> {
    let mut header = String::with_capacity(MAX_HEADER_SIZE);
    if bits_per_sample == 32 {
        // PFM
        let kind = if bundle.is_gray() { 'f' } else { 'F' };
        let scale: f32 = if little_endian { -1.0 } else { 1.0 };
        write!(
            header,
            "P{kind}\n{} {}\n{:.1}\n",
            bundle.xsize(),
            bundle.ysize(),
            scale
        )
        .unwrap();
    } else if bits_per_sample == 1 {
        // PBM
        if !bundle.is_gray() {
            return Err(Error::PnmColorAsPbm);
        }
        write!(header, "P4\n{} {}\n", bundle.xsize(), bundle.ysize()).unwrap();
    } else {
        // PGM/PPM
        let max_val = (1u32 << bits_per_sample) - 1;
        if max_val >= 65536 {
            return Err(Error::PnmTooManyBits);
        }
        let kind = if bundle.is_gray() { '5' } else { '6' };
        write!(
            header,
            "P{kind}\n{} {}\n{max_val}\n",
            bundle.xsize(),
            bundle.ysize()
        )
        .unwrap();
    }
    if header.len() >= MAX_HEADER_SIZE {
        return Err(Error::HeaderTooLarge(MAX_HEADER_SIZE));
    }
    Ok(header)
}

/// Encodes a bundle as PBM/PGM/PPM (`bits_per_sample` <= 16) or PFM
/// (`bits_per_sample` == 32). Alpha cannot be stored; the encoder never
/// emits an ICC profile.
pub fn encode(bundle: &ImageBundle, bits_per_sample: u32) -> Result<Vec<u8>> {
    if bundle.has_alpha() {
        return Err(Error::PnmAlphaUnsupported);
    }
    let floating_point = bits_per_sample > 16;
    if floating_point && bits_per_sample != 32 {
        return Err(Error::PnmTooManyBits);
    }
    // PFM uses the native byte order; PGM/PPM payloads are big-endian.
    let little_endian = floating_point && cfg!(target_endian = "little");
    let header = encode_header(bundle, bits_per_sample, little_endian)?;

    let (w, h) = (bundle.xsize(), bundle.ysize());
    let channels = bundle.color.len();
    let mut out = header.into_bytes();
    if floating_point {
        // Flip before emitting: the format stores scanlines bottom-up.
        for y in (0..h).rev() {
            for x in 0..w {
                for plane in &bundle.color {
                    let value = plane.row(y)[x];
                    if little_endian {
                        out.extend(value.to_le_bytes());
                    } else {
                        out.extend(value.to_be_bytes());
                    }
                }
            }
        }
    } else if bits_per_sample == 1 {
        let stride = w.div_ceil(8);
        for y in 0..h {
            let row = bundle.color[0].row(y);
            let mut packed = vec![0u8; stride];
            for (x, value) in row.iter().enumerate() {
                if *value < 0.5 {
                    packed[x / 8] |= 0x80 >> (x % 8);
                }
            }
            out.extend(packed);
        }
    } else {
        let max_val = ((1u32 << bits_per_sample) - 1) as f32;
        for y in 0..h {
            for x in 0..w {
                for c in 0..channels {
                    let sample = (bundle.color[c].row(y)[x].clamp(0.0, 1.0) * max_val + 0.5) as u32;
                    if bits_per_sample > 8 {
                        out.extend((sample as u16).to_be_bytes());
                    } else {
                        out.push(sample as u8);
                    }
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unsigned_table() {
        for bad in ["", "+", "-", "A"] {
            assert!(Parser::new(bad.as_bytes()).parse_unsigned().is_err(), "{bad}");
        }
        assert_eq!(Parser::new(b"1").parse_unsigned().unwrap(), 1);
        assert_eq!(Parser::new(b"32").parse_unsigned().unwrap(), 32);
    }

    #[test]
    fn parse_signed_table() {
        for bad in ["", "+", "-", "A"] {
            assert!(Parser::new(bad.as_bytes()).parse_signed().is_err(), "{bad}");
        }
        assert_eq!(Parser::new(b"1").parse_signed().unwrap(), 1.0);
        assert_eq!(Parser::new(b"+2").parse_signed().unwrap(), 2.0);
        assert!((Parser::new(b"-3").parse_signed().unwrap() - -3.0).abs() < 1e-15);
        assert!((Parser::new(b"3.141592").parse_signed().unwrap() - 3.141592).abs() < 1e-15);
        assert!((Parser::new(b"-3.141592").parse_signed().unwrap() - -3.141592).abs() < 1e-15);
    }

    fn gray_gradient(w: usize, h: usize, levels: u32) -> ImageBundle {
        let mut bundle = ImageBundle::new(w, h, 1).unwrap();
        let max = (levels - 1) as f32;
        for y in 0..h {
            for x in 0..w {
                bundle.color[0].row_mut(y)[x] = ((x + y * w) as u32 % levels) as f32 / max;
            }
        }
        bundle
    }

    fn rgb_gradient(w: usize, h: usize) -> ImageBundle {
        let mut bundle = ImageBundle::new(w, h, 3).unwrap();
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    bundle.color[c].row_mut(y)[x] = ((x * 7 + y * 13 + c * 29) % 256) as f32 / 255.0;
                }
            }
        }
        bundle
    }

    #[test]
    fn pgm_roundtrip_8bit() {
        let bundle = gray_gradient(5, 4, 256);
        let encoded = encode(&bundle, 8).unwrap();
        assert!(encoded.starts_with(b"P5\n5 4\n255\n"));
        let decoded = decode(&encoded, &DecoderHints::new()).unwrap();
        assert_eq!(decoded.header.bits_per_sample, 8);
        assert!(decoded.header.is_gray);
        let reencoded = encode(&decoded.bundle, 8).unwrap();
        assert_eq!(encoded, reencoded);
    }

    #[test]
    fn ppm_roundtrip_16bit() {
        let bundle = rgb_gradient(3, 3);
        let encoded = encode(&bundle, 16).unwrap();
        assert!(encoded.starts_with(b"P6\n3 3\n65535\n"));
        let decoded = decode(&encoded, &DecoderHints::new()).unwrap();
        assert_eq!(decoded.header.bits_per_sample, 16);
        assert!(!decoded.header.is_gray);
        let reencoded = encode(&decoded.bundle, 16).unwrap();
        assert_eq!(encoded, reencoded);
    }

    #[test]
    fn pbm_roundtrip() {
        let mut bundle = ImageBundle::new(9, 2, 1).unwrap();
        for x in 0..9 {
            bundle.color[0].row_mut(0)[x] = if x % 2 == 0 { 0.0 } else { 1.0 };
            bundle.color[0].row_mut(1)[x] = if x % 3 == 0 { 1.0 } else { 0.0 };
        }
        let encoded = encode(&bundle, 1).unwrap();
        assert!(encoded.starts_with(b"P4\n9 2\n"));
        // 9 pixels pack into 2 bytes per row.
        assert_eq!(encoded.len(), b"P4\n9 2\n".len() + 4);
        let decoded = decode(&encoded, &DecoderHints::new()).unwrap();
        assert_eq!(decoded.bundle.color[0].row(0), bundle.color[0].row(0));
        assert_eq!(decoded.bundle.color[0].row(1), bundle.color[0].row(1));
    }

    #[test]
    fn pbm_cannot_hold_color() {
        let bundle = rgb_gradient(2, 2);
        assert_eq!(encode(&bundle, 1), Err(Error::PnmColorAsPbm));
    }

    #[test]
    fn pfm_roundtrip_is_bit_exact() {
        let mut bundle = ImageBundle::new(3, 2, 3).unwrap();
        for c in 0..3 {
            for y in 0..2 {
                for x in 0..3 {
                    bundle.color[c].row_mut(y)[x] =
                        (x as f32 + 0.125) * (y as f32 - 0.5) * (c as f32 + 1.0);
                }
            }
        }
        let encoded = encode(&bundle, 32).unwrap();
        let expected_scale: &[u8] = if cfg!(target_endian = "little") {
            b"PF\n3 2\n-1.0\n"
        } else {
            b"PF\n3 2\n1.0\n"
        };
        assert!(encoded.starts_with(expected_scale));
        let decoded = decode(&encoded, &DecoderHints::new()).unwrap();
        assert!(decoded.header.floating_point);
        for c in 0..3 {
            for y in 0..2 {
                assert_eq!(decoded.bundle.color[c].row(y), bundle.color[c].row(y));
            }
        }
    }

    #[test]
    fn pfm_is_stored_bottom_up() {
        // One gray column, values 0.0 (top) and 1.0 (bottom): the payload
        // must hold the bottom row first.
        let mut bundle = ImageBundle::new(1, 2, 1).unwrap();
        bundle.color[0].row_mut(0)[0] = 0.0;
        bundle.color[0].row_mut(1)[0] = 1.0;
        let encoded = encode(&bundle, 32).unwrap();
        let payload = &encoded[encoded.len() - 8..];
        let first = if cfg!(target_endian = "little") {
            f32::from_le_bytes(payload[..4].try_into().unwrap())
        } else {
            f32::from_be_bytes(payload[..4].try_into().unwrap())
        };
        assert_eq!(first, 1.0);
    }

    #[test]
    fn pfm_big_endian_input() {
        let mut data = b"Pf\n2 1\n1.0\n".to_vec();
        data.extend(0.5f32.to_be_bytes());
        data.extend(0.25f32.to_be_bytes());
        let decoded = decode(&data, &DecoderHints::new()).unwrap();
        assert!(decoded.header.big_endian);
        assert_eq!(decoded.bundle.color[0].row(0), &[0.5, 0.25]);
    }

    #[test]
    fn comments_and_whitespace() {
        let mut data = b"P5 # comment\n# another comment\n 4\t3 #sizes\n255\n".to_vec();
        data.extend(std::iter::repeat(128u8).take(12));
        let decoded = decode(&data, &DecoderHints::new()).unwrap();
        assert_eq!(decoded.header.xsize, 4);
        assert_eq!(decoded.header.ysize, 3);
    }

    #[test]
    fn max_val_bounds() {
        for max_val in ["0", "65536", "100000"] {
            let data = format!("P5\n2 2\n{max_val}\n....");
            assert_eq!(
                decode(data.as_bytes(), &DecoderHints::new()).unwrap_err(),
                Error::PnmBadMaxVal,
                "{max_val}"
            );
        }
        // 65535 is the largest legal MaxVal.
        let mut data = b"P5\n1 1\n65535\n".to_vec();
        data.extend([0x12, 0x34]);
        assert_eq!(
            decode(&data, &DecoderHints::new()).unwrap().header.bits_per_sample,
            16
        );
    }

    #[test]
    fn truncated_payload_fails() {
        let data = b"P5\n4 4\n255\nshort";
        assert!(decode(data, &DecoderHints::new()).is_err());
    }

    fn y4m_fixture(c_param: Option<&str>, w: usize, h: usize) -> Vec<u8> {
        let mut data = format!("YUV4MPEG2 W{w} H{h} Ip F25:1 A1:1").into_bytes();
        if let Some(c) = c_param {
            data.extend(format!(" C{c}").into_bytes());
        }
        data.push(0x0a);
        data.extend(b"FRAME");
        data.push(0x0a);
        data
    }

    #[test]
    fn y4m_subsampling_states() {
        for (c_param, expected, y_len, chroma_len) in [
            (Some("444"), ChromaSubsampling::C444, 4 * 2, 4 * 2),
            (Some("422"), ChromaSubsampling::C422, 4 * 2, 2 * 2),
            (Some("420jpeg"), ChromaSubsampling::C420, 4 * 2, 2),
            // 4:2:0 is the default when the C field is absent.
            (None, ChromaSubsampling::C420, 4 * 2, 2),
        ] {
            let mut data = y4m_fixture(c_param, 4, 2);
            data.extend(vec![128u8; y_len + 2 * chroma_len]);
            let decoded = decode(&data, &DecoderHints::new()).unwrap();
            assert_eq!(decoded.bundle.chroma_subsampling, expected, "{c_param:?}");
            assert_eq!(decoded.bundle.color_transform, ColorTransform::YCbCr);
            assert_eq!(decoded.bundle.color[1].size(), (4, 2), "{c_param:?}");
        }
    }

    #[test]
    fn y4m_values_and_plane_order() {
        // 2x1 4:4:4 frame: Y = 128, 129; Cb = 0; Cr = 255.
        let mut data = y4m_fixture(Some("444"), 2, 1);
        data.extend([128u8, 129, 0, 0, 255, 255]);
        let decoded = decode(&data, &DecoderHints::new()).unwrap();
        // Y lands on plane 1, Cb on plane 0, Cr on plane 2.
        assert_eq!(decoded.bundle.color[1].row(0)[0], 0.0);
        assert_eq!(decoded.bundle.color[1].row(0)[1], 1.0 / 255.0);
        assert_eq!(decoded.bundle.color[0].row(0)[0], -128.0 / 255.0);
        assert_eq!(decoded.bundle.color[2].row(0)[0], 127.0 / 255.0);
    }

    #[test]
    fn y4m_interlaced_rejected() {
        let data = b"YUV4MPEG2 W2 H2 It\nFRAME\n";
        assert!(decode(data, &DecoderHints::new()).is_err());
    }

    #[test]
    fn color_space_hint() {
        let mut data = b"P5\n1 1\n255\n".to_vec();
        data.push(7);
        let mut hints = DecoderHints::new();
        hints.add("color_space", "Gra_D65_Rel_SRG");
        let decoded = decode(&data, &hints).unwrap();
        assert!(decoded.color_encoding.is_gray());

        // A color descriptor on a grayscale file is a mismatch.
        let mut hints = DecoderHints::new();
        hints.add("color_space", "RGB_D65_SRG_Rel_SRG");
        assert_eq!(decode(&data, &hints).unwrap_err(), Error::PnmHintMismatch);
    }

    #[test]
    fn unknown_hint_is_ignored() {
        let mut data = b"P5\n1 1\n255\n".to_vec();
        data.push(7);
        let mut hints = DecoderHints::new();
        hints.add("speed", "tortoise");
        let decoded = decode(&data, &hints).unwrap();
        // Falls back to sRGB.
        assert_eq!(decoded.color_encoding, ColorEncoding::srgb(true));
    }

    #[test]
    fn alpha_cannot_be_encoded() {
        let mut bundle = gray_gradient(2, 2, 256);
        bundle.extra.push(Image::new(2, 2).unwrap());
        assert_eq!(encode(&bundle, 8), Err(Error::PnmAlphaUnsupported));
    }
}

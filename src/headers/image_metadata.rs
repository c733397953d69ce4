// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::bit_depth::BitDepth;
use crate::headers::color_encoding::ColorEncoding;
use crate::headers::encodings::*;
use crate::headers::extra_channels::{ExtraChannel, ExtraChannelInfo};
use crate::headers::size::{Preview, Size};

/// EXIF-style orientation, values 1 through 8.
#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive, Default)]
pub enum Orientation {
    #[default]
    Identity = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90 = 6,
    AntiTranspose = 7,
    Rotate270 = 8,
}

impl Orientation {
    /// Orientations 5..8 swap the reported width and height.
    pub fn is_transposing(&self) -> bool {
        *self as u32 >= 5
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub tps_numerator: u32,
    pub tps_denominator: u32,
    pub num_loops: u32,
    pub have_timecodes: bool,
}

impl JxlHeader for Animation {
    fn read(br: &mut BitReader) -> Result<Animation> {
        Ok(Animation {
            tps_numerator: read_u2s(
                br,
                U32::Val(100),
                U32::Val(1000),
                U32::BitsOffset { n: 10, off: 1 },
                U32::BitsOffset { n: 30, off: 1 },
            )?,
            tps_denominator: read_u2s(
                br,
                U32::Val(1),
                U32::Val(1001),
                U32::BitsOffset { n: 10, off: 1 },
                U32::BitsOffset { n: 30, off: 1 },
            )?,
            num_loops: read_u2s(br, U32::Val(0), U32::Bits(3), U32::Bits(16), U32::Bits(32))?,
            have_timecodes: read_bool(br)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToneMapping {
    pub intensity_target: f32,
    pub min_nits: f32,
    pub relative_to_max_display: bool,
    pub linear_below: f32,
}

impl Default for ToneMapping {
    fn default() -> Self {
        ToneMapping {
            intensity_target: 255.0,
            min_nits: 0.0,
            relative_to_max_display: false,
            linear_below: 0.0,
        }
    }
}

impl JxlHeader for ToneMapping {
    fn read(br: &mut BitReader) -> Result<ToneMapping> {
        if read_bool(br)? {
            return Ok(ToneMapping::default());
        }
        let tm = ToneMapping {
            intensity_target: read_f16(br)?,
            min_nits: read_f16(br)?,
            relative_to_max_display: read_bool(br)?,
            linear_below: read_f16(br)?,
        };
        tm.check()?;
        Ok(tm)
    }
}

impl ToneMapping {
    fn check(&self) -> Result<()> {
        if self.intensity_target <= 0.0 {
            Err(Error::InvalidIntensityTarget(self.intensity_target))
        } else if self.min_nits < 0.0 || self.min_nits > self.intensity_target {
            Err(Error::InvalidMinNits(self.min_nits))
        } else if self.linear_below < 0.0
            || (self.relative_to_max_display && self.linear_below > 1.0)
        {
            Err(Error::InvalidLinearBelow(
                self.relative_to_max_display,
                self.linear_below,
            ))
        } else {
            Ok(())
        }
    }
}

/// Trailing extension block: a bitmask of present extensions followed by
/// their sizes and payloads, all skipped.
pub fn read_extensions(br: &mut BitReader) -> Result<u64> {
    let extensions = read_u64(br)?;
    if extensions != 0 {
        let mut total_bits: u64 = 0;
        for i in 0..64 {
            if extensions & (1u64 << i) != 0 {
                let bits = read_u64(br)?;
                total_bits = total_bits.checked_add(bits).ok_or(Error::ArithmeticOverflow)?;
            }
        }
        let total_bits = usize::try_from(total_bits).map_err(|_| Error::ArithmeticOverflow)?;
        br.skip_bits(total_bits)?;
    }
    Ok(extensions)
}

#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub orientation: Orientation,
    pub intrinsic_size: Option<Size>,
    pub preview: Option<Preview>,
    pub animation: Option<Animation>,
    pub bit_depth: BitDepth,
    pub modular_16bit_sufficient: bool,
    pub extra_channel_info: Vec<ExtraChannelInfo>,
    pub xyb_encoded: bool,
    pub color_encoding: ColorEncoding,
    pub tone_mapping: ToneMapping,
    pub extensions: u64,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        ImageMetadata {
            orientation: Orientation::Identity,
            intrinsic_size: None,
            preview: None,
            animation: None,
            bit_depth: BitDepth::default(),
            modular_16bit_sufficient: true,
            extra_channel_info: Vec::new(),
            xyb_encoded: true,
            color_encoding: ColorEncoding::default(),
            tone_mapping: ToneMapping::default(),
            extensions: 0,
        }
    }
}

impl JxlHeader for ImageMetadata {
    fn read(br: &mut BitReader) -> Result<ImageMetadata> {
        ImageMetadata::read_with_mode(br, false)
    }
}

impl ImageMetadata {
    /// Reads the bundle. With `only_basic` set, stops after the fields that
    /// make up the basic info (everything before the color encoding), so
    /// the basic-info event can fire before the full headers are in.
    pub fn read_with_mode(br: &mut BitReader, only_basic: bool) -> Result<ImageMetadata> {
        if read_bool(br)? {
            return Ok(ImageMetadata::default());
        }
        let mut m = ImageMetadata::default();
        let extra_fields = read_bool(br)?;
        if extra_fields {
            let orientation = br.read(3)? as u32 + 1;
            m.orientation =
                Orientation::from_u32(orientation).ok_or(Error::InvalidEnum(orientation, "Orientation"))?;
            if read_bool(br)? {
                m.intrinsic_size = Some(Size::read(br)?);
            }
            if read_bool(br)? {
                m.preview = Some(Preview::read(br)?);
            }
            if read_bool(br)? {
                m.animation = Some(Animation::read(br)?);
            }
        }
        m.bit_depth = BitDepth::read(br)?;
        m.modular_16bit_sufficient = read_bool(br)?;
        let num_extra_channels = read_u2s(
            br,
            U32::Val(0),
            U32::Val(1),
            U32::BitsOffset { n: 4, off: 2 },
            U32::BitsOffset { n: 12, off: 1 },
        )? as usize;
        m.extra_channel_info.try_reserve(num_extra_channels)?;
        for _ in 0..num_extra_channels {
            m.extra_channel_info.push(ExtraChannelInfo::read(br)?);
        }
        m.xyb_encoded = read_bool(br)?;
        if only_basic {
            return Ok(m);
        }
        m.color_encoding = ColorEncoding::read(br)?;
        if extra_fields {
            m.tone_mapping = ToneMapping::read(br)?;
        }
        m.extensions = read_extensions(br)?;
        Ok(m)
    }

    pub fn num_extra_channels(&self) -> usize {
        self.extra_channel_info.len()
    }

    pub fn alpha_channel(&self) -> Option<&ExtraChannelInfo> {
        self.extra_channel_info
            .iter()
            .find(|info| info.ec_type == ExtraChannel::Alpha)
    }

    pub fn have_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn have_animation(&self) -> bool {
        self.animation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::BitWriter;

    #[test]
    fn all_default() {
        let mut w = BitWriter::new();
        w.write_bool(true);
        let data = w.finish();
        let m = ImageMetadata::read(&mut BitReader::new(&data)).unwrap();
        assert!(m.xyb_encoded);
        assert_eq!(m.orientation, Orientation::Identity);
        assert_eq!(m.num_extra_channels(), 0);
        assert!(!m.have_animation());
    }

    fn write_animated_metadata(w: &mut BitWriter, orientation: u32) {
        w.write_bool(false); // all_default
        w.write_bool(true); // extra_fields
        w.write(3, (orientation - 1) as u64);
        w.write_bool(false); // have_intrinsic_size
        w.write_bool(false); // have_preview
        w.write_bool(true); // have_animation
        w.write(2, 1); // tps_numerator -> 1000
        w.write(2, 0); // tps_denominator -> 1
        w.write(2, 0); // num_loops -> 0
        w.write_bool(false); // have_timecodes
        w.write_bool(false); // integer samples
        w.write(2, 0); // 8 bits
        w.write_bool(true); // modular_16bit_sufficient
        w.write(2, 0); // no extra channels
        w.write_bool(true); // xyb_encoded
    }

    #[test]
    fn animated_with_orientation() {
        let mut w = BitWriter::new();
        write_animated_metadata(&mut w, 6);
        w.write_bool(true); // color_encoding all_default
        w.write_bool(true); // tone_mapping all_default
        w.write_u64(0); // extensions
        let data = w.finish();
        let m = ImageMetadata::read(&mut BitReader::new(&data)).unwrap();
        assert_eq!(m.orientation, Orientation::Rotate90);
        assert!(m.orientation.is_transposing());
        let anim = m.animation.unwrap();
        assert_eq!(anim.tps_numerator, 1000);
        assert_eq!(anim.tps_denominator, 1);
    }

    #[test]
    fn basic_mode_stops_before_color_encoding() {
        let mut w = BitWriter::new();
        write_animated_metadata(&mut w, 1);
        // No color encoding, tone mapping or extensions written: the basic
        // parse must not need them.
        let data = w.finish();
        let m = ImageMetadata::read_with_mode(&mut BitReader::new(&data), true).unwrap();
        assert!(m.have_animation());
        assert!(ImageMetadata::read(&mut BitReader::new(&data)).is_err());
    }

    #[test]
    fn extensions_are_skipped() {
        let mut w = BitWriter::new();
        w.write_u64(0b101); // two extensions
        w.write_u64(3); // first is 3 bits
        w.write_u64(5); // second is 5 bits
        w.write(8, 0xa5); // extension payload
        w.write(8, 0x42); // trailing data
        let data = w.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_extensions(&mut br).unwrap(), 0b101);
        assert_eq!(br.read(8).unwrap(), 0x42);
    }
}

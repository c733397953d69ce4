// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::*;

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum ColorSpace {
    RGB = 0,
    Gray = 1,
    XYB = 2,
    Unknown = 3,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum WhitePoint {
    D65 = 1,
    Custom = 2,
    E = 10,
    DCI = 11,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum Primaries {
    SRGB = 1,
    Custom = 2,
    BT2100 = 9,
    P3 = 11,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum TransferFunction {
    BT709 = 1,
    Unknown = 2,
    Linear = 8,
    SRGB = 13,
    PQ = 16,
    DCI = 17,
    HLG = 18,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum RenderingIntent {
    Perceptual = 0,
    Relative = 1,
    Saturation = 2,
    Absolute = 3,
}

fn unpack_signed(v: u32) -> i32 {
    if v & 1 == 0 {
        (v >> 1) as i32
    } else {
        -(((v >> 1) + 1) as i32)
    }
}

/// Chromaticity coordinate pair, stored as `round(value * 1e6)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CustomXY {
    pub x: i32,
    pub y: i32,
}

impl JxlHeader for CustomXY {
    fn read(br: &mut BitReader) -> Result<CustomXY> {
        let mut read_coord = |br: &mut BitReader| -> Result<i32> {
            let v = read_u2s(
                br,
                U32::Bits(19),
                U32::BitsOffset {
                    n: 19,
                    off: 524288,
                },
                U32::BitsOffset {
                    n: 20,
                    off: 1048576,
                },
                U32::BitsOffset {
                    n: 21,
                    off: 2097152,
                },
            )?;
            Ok(unpack_signed(v))
        };
        Ok(CustomXY {
            x: read_coord(br)?,
            y: read_coord(br)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomTransferFunction {
    pub have_gamma: bool,
    /// Gamma scaled by 1e7, only meaningful when `have_gamma`.
    gamma: u32,
    pub transfer_function: TransferFunction,
}

impl Default for CustomTransferFunction {
    fn default() -> Self {
        CustomTransferFunction {
            have_gamma: false,
            gamma: 0,
            transfer_function: TransferFunction::SRGB,
        }
    }
}

impl CustomTransferFunction {
    pub const GAMMA_SCALE: u32 = 10_000_000;

    fn read(br: &mut BitReader, color_space: ColorSpace) -> Result<CustomTransferFunction> {
        let mut tf = CustomTransferFunction::default();
        if color_space != ColorSpace::XYB {
            tf.have_gamma = read_bool(br)?;
            if tf.have_gamma {
                tf.gamma = br.read(24)? as u32;
                if tf.gamma == 0 || tf.gamma > Self::GAMMA_SCALE {
                    return Err(Error::InvalidGamma(tf.gamma()));
                }
            } else {
                tf.transfer_function = read_enum::<TransferFunction>("TransferFunction", br)?;
            }
        }
        Ok(tf)
    }

    pub fn gamma(&self) -> f32 {
        self.gamma as f32 / Self::GAMMA_SCALE as f32
    }

    pub fn from_gamma(gamma: f32) -> CustomTransferFunction {
        CustomTransferFunction {
            have_gamma: true,
            gamma: (gamma * Self::GAMMA_SCALE as f32).round() as u32,
            transfer_function: TransferFunction::SRGB,
        }
    }
}

/// The codestream color-encoding bundle. The streaming front-end only needs
/// to identify whether an ICC profile follows and to name the color space;
/// full color management is the CMS collaborator's problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorEncoding {
    pub want_icc: bool,
    pub color_space: ColorSpace,
    pub white_point: WhitePoint,
    pub white: CustomXY,
    pub primaries: Primaries,
    pub custom_primaries: [CustomXY; 3],
    pub tf: CustomTransferFunction,
    pub rendering_intent: RenderingIntent,
}

impl Default for ColorEncoding {
    fn default() -> Self {
        ColorEncoding::srgb(false)
    }
}

impl JxlHeader for ColorEncoding {
    fn read(br: &mut BitReader) -> Result<ColorEncoding> {
        if read_bool(br)? {
            return Ok(ColorEncoding::default());
        }
        let mut enc = ColorEncoding::default();
        enc.want_icc = read_bool(br)?;
        enc.color_space = read_enum::<ColorSpace>("ColorSpace", br)?;
        let cs = enc.color_space;
        if !enc.want_icc && cs != ColorSpace::XYB {
            enc.white_point = read_enum::<WhitePoint>("WhitePoint", br)?;
            if enc.white_point == WhitePoint::Custom {
                enc.white = CustomXY::read(br)?;
            }
        }
        if !enc.want_icc && cs != ColorSpace::XYB && cs != ColorSpace::Gray {
            enc.primaries = read_enum::<Primaries>("Primaries", br)?;
            if enc.primaries == Primaries::Custom {
                for p in enc.custom_primaries.iter_mut() {
                    *p = CustomXY::read(br)?;
                }
            }
        }
        if !enc.want_icc {
            enc.tf = CustomTransferFunction::read(br, cs)?;
            enc.rendering_intent = read_enum::<RenderingIntent>("RenderingIntent", br)?;
        }
        Ok(enc)
    }
}

impl ColorEncoding {
    pub fn srgb(is_gray: bool) -> ColorEncoding {
        ColorEncoding {
            want_icc: false,
            color_space: if is_gray {
                ColorSpace::Gray
            } else {
                ColorSpace::RGB
            },
            white_point: WhitePoint::D65,
            white: CustomXY::default(),
            primaries: Primaries::SRGB,
            custom_primaries: [CustomXY::default(); 3],
            tf: CustomTransferFunction::default(),
            rendering_intent: RenderingIntent::Relative,
        }
    }

    pub fn is_gray(&self) -> bool {
        self.color_space == ColorSpace::Gray
    }

    pub fn channels(&self) -> usize {
        if self.is_gray() { 1 } else { 3 }
    }

    /// Formats the compact descriptor, e.g. `RGB_D65_SRG_Rel_SRG`, with the
    /// well-known shorthands recognized first.
    pub fn description(&self) -> String {
        if self.color_space == ColorSpace::RGB && self.white_point == WhitePoint::D65 {
            if self.rendering_intent == RenderingIntent::Perceptual
                && !self.tf.have_gamma
                && self.tf.transfer_function == TransferFunction::SRGB
            {
                if self.primaries == Primaries::SRGB {
                    return "sRGB".to_string();
                }
                if self.primaries == Primaries::P3 {
                    return "DisplayP3".to_string();
                }
            }
            if self.rendering_intent == RenderingIntent::Relative
                && self.primaries == Primaries::BT2100
            {
                if !self.tf.have_gamma && self.tf.transfer_function == TransferFunction::PQ {
                    return "Rec2100PQ".to_string();
                }
                if !self.tf.have_gamma && self.tf.transfer_function == TransferFunction::HLG {
                    return "Rec2100HLG".to_string();
                }
            }
        }

        let mut d = String::with_capacity(24);
        d.push_str(color_space_name(self.color_space));
        let explicit_wp_tf = self.color_space != ColorSpace::XYB;
        if explicit_wp_tf {
            d.push('_');
            d.push_str(white_point_name(self.white_point));
        }
        if self.color_space != ColorSpace::Gray && self.color_space != ColorSpace::XYB {
            d.push('_');
            d.push_str(primaries_name(self.primaries));
        }
        d.push('_');
        d.push_str(intent_name(self.rendering_intent));
        if explicit_wp_tf {
            d.push('_');
            if self.tf.have_gamma {
                d.push('g');
                d.push_str(&format!("{:.7}", self.tf.gamma()));
            } else {
                d.push_str(tf_name(self.tf.transfer_function));
            }
        }
        d
    }

    /// Parses a descriptor produced by [`ColorEncoding::description`].
    /// Custom chromaticities are not supported.
    pub fn from_description(desc: &str) -> Result<ColorEncoding> {
        let invalid = || Error::InvalidDescription(desc.to_string());
        match desc {
            "sRGB" => {
                let mut e = ColorEncoding::srgb(false);
                e.rendering_intent = RenderingIntent::Perceptual;
                return Ok(e);
            }
            "DisplayP3" => {
                let mut e = ColorEncoding::srgb(false);
                e.primaries = Primaries::P3;
                e.rendering_intent = RenderingIntent::Perceptual;
                return Ok(e);
            }
            "Rec2100PQ" | "Rec2100HLG" => {
                let mut e = ColorEncoding::srgb(false);
                e.primaries = Primaries::BT2100;
                e.tf.transfer_function = if desc == "Rec2100PQ" {
                    TransferFunction::PQ
                } else {
                    TransferFunction::HLG
                };
                return Ok(e);
            }
            _ => {}
        }

        let mut parts = desc.split('_');
        let cs = match parts.next().ok_or_else(invalid)? {
            "RGB" => ColorSpace::RGB,
            "Gra" => ColorSpace::Gray,
            "XYB" => ColorSpace::XYB,
            _ => return Err(invalid()),
        };
        let mut enc = ColorEncoding::srgb(cs == ColorSpace::Gray);
        enc.color_space = cs;
        if cs != ColorSpace::XYB {
            enc.white_point = match parts.next().ok_or_else(invalid)? {
                "D65" => WhitePoint::D65,
                "EER" => WhitePoint::E,
                "DCI" => WhitePoint::DCI,
                _ => return Err(invalid()),
            };
        }
        if cs == ColorSpace::RGB {
            enc.primaries = match parts.next().ok_or_else(invalid)? {
                "SRG" => Primaries::SRGB,
                "202" => Primaries::BT2100,
                "DCI" => Primaries::P3,
                _ => return Err(invalid()),
            };
        }
        enc.rendering_intent = match parts.next().ok_or_else(invalid)? {
            "Per" => RenderingIntent::Perceptual,
            "Rel" => RenderingIntent::Relative,
            "Sat" => RenderingIntent::Saturation,
            "Abs" => RenderingIntent::Absolute,
            _ => return Err(invalid()),
        };
        if cs != ColorSpace::XYB {
            let tf = parts.next().ok_or_else(invalid)?;
            if let Some(gamma) = tf.strip_prefix('g') {
                let gamma: f32 = gamma.parse().map_err(|_| invalid())?;
                if !(0.0..=1.0).contains(&gamma) || gamma == 0.0 {
                    return Err(invalid());
                }
                enc.tf = CustomTransferFunction::from_gamma(gamma);
            } else {
                enc.tf.transfer_function = match tf {
                    "709" => TransferFunction::BT709,
                    "Lin" => TransferFunction::Linear,
                    "SRG" => TransferFunction::SRGB,
                    "PQ" => TransferFunction::PQ,
                    "DCI" => TransferFunction::DCI,
                    "HLG" => TransferFunction::HLG,
                    _ => return Err(invalid()),
                };
            }
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(enc)
    }
}

fn color_space_name(cs: ColorSpace) -> &'static str {
    match cs {
        ColorSpace::RGB => "RGB",
        ColorSpace::Gray => "Gra",
        ColorSpace::XYB => "XYB",
        ColorSpace::Unknown => "CS?",
    }
}

fn white_point_name(wp: WhitePoint) -> &'static str {
    match wp {
        WhitePoint::D65 => "D65",
        WhitePoint::Custom => "Cst",
        WhitePoint::E => "EER",
        WhitePoint::DCI => "DCI",
    }
}

fn primaries_name(p: Primaries) -> &'static str {
    match p {
        Primaries::SRGB => "SRG",
        Primaries::Custom => "Cst",
        Primaries::BT2100 => "202",
        Primaries::P3 => "DCI",
    }
}

fn tf_name(tf: TransferFunction) -> &'static str {
    match tf {
        TransferFunction::BT709 => "709",
        TransferFunction::Unknown => "TF?",
        TransferFunction::Linear => "Lin",
        TransferFunction::SRGB => "SRG",
        TransferFunction::PQ => "PQ",
        TransferFunction::DCI => "DCI",
        TransferFunction::HLG => "HLG",
    }
}

fn intent_name(ri: RenderingIntent) -> &'static str {
    match ri {
        RenderingIntent::Perceptual => "Per",
        RenderingIntent::Relative => "Rel",
        RenderingIntent::Saturation => "Sat",
        RenderingIntent::Absolute => "Abs",
    }
}

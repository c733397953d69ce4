// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::bit_depth::BitDepth;
use crate::headers::encodings::*;

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum ExtraChannel {
    Alpha = 0,
    Depth = 1,
    SpotColor = 2,
    SelectionMask = 3,
    Black = 4,
    CFA = 5,
    Thermal = 6,
    Unknown = 15,
    Optional = 16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtraChannelInfo {
    pub ec_type: ExtraChannel,
    pub bit_depth: BitDepth,
    dim_shift: u32,
    pub name: String,
    alpha_associated: bool,
    pub spot_color: [f32; 4],
    pub cfa_channel: u32,
}

impl Default for ExtraChannelInfo {
    fn default() -> Self {
        ExtraChannelInfo {
            ec_type: ExtraChannel::Alpha,
            bit_depth: BitDepth::default(),
            dim_shift: 0,
            name: String::new(),
            alpha_associated: false,
            spot_color: [0.0; 4],
            cfa_channel: 1,
        }
    }
}

impl JxlHeader for ExtraChannelInfo {
    fn read(br: &mut BitReader) -> Result<ExtraChannelInfo> {
        if read_bool(br)? {
            return Ok(ExtraChannelInfo::default());
        }
        let mut info = ExtraChannelInfo {
            ec_type: read_enum::<ExtraChannel>("ExtraChannel", br)?,
            ..ExtraChannelInfo::default()
        };
        info.bit_depth = BitDepth::read(br)?;
        info.dim_shift = read_u2s(
            br,
            U32::Val(0),
            U32::Val(3),
            U32::Val(4),
            U32::BitsOffset { n: 3, off: 1 },
        )?;
        if info.dim_shift > 3 {
            return Err(Error::DimShiftTooLarge(info.dim_shift));
        }
        info.name = read_string(br)?;
        if info.ec_type == ExtraChannel::Alpha {
            info.alpha_associated = read_bool(br)?;
        }
        if info.ec_type == ExtraChannel::SpotColor {
            for c in info.spot_color.iter_mut() {
                *c = read_f16(br)?;
            }
        }
        if info.ec_type == ExtraChannel::CFA {
            info.cfa_channel = read_u2s(
                br,
                U32::Val(1),
                U32::Bits(2),
                U32::BitsOffset { n: 4, off: 3 },
                U32::BitsOffset { n: 8, off: 19 },
            )?;
        }
        Ok(info)
    }
}

impl ExtraChannelInfo {
    pub fn dim_shift(&self) -> u32 {
        self.dim_shift
    }

    pub fn alpha_associated(&self) -> bool {
        self.alpha_associated
    }
}

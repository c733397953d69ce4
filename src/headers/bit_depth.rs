// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitDepth {
    floating_point_sample: bool,
    bits_per_sample: u32,
    exponent_bits_per_sample: u32,
}

impl Default for BitDepth {
    fn default() -> Self {
        BitDepth {
            floating_point_sample: false,
            bits_per_sample: 8,
            exponent_bits_per_sample: 0,
        }
    }
}

impl JxlHeader for BitDepth {
    fn read(br: &mut BitReader) -> Result<BitDepth> {
        let floating_point_sample = read_bool(br)?;
        let bits_per_sample = if floating_point_sample {
            read_u2s(
                br,
                U32::Val(32),
                U32::Val(16),
                U32::Val(24),
                U32::BitsOffset { n: 6, off: 1 },
            )?
        } else {
            read_u2s(
                br,
                U32::Val(8),
                U32::Val(10),
                U32::Val(12),
                U32::BitsOffset { n: 6, off: 1 },
            )?
        };
        let exponent_bits_per_sample = if floating_point_sample {
            U32::BitsOffset { n: 4, off: 1 }.read(br)?
        } else {
            0
        };
        let bit_depth = BitDepth {
            floating_point_sample,
            bits_per_sample,
            exponent_bits_per_sample,
        };
        bit_depth.check()?;
        Ok(bit_depth)
    }
}

impl BitDepth {
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    pub fn exponent_bits_per_sample(&self) -> u32 {
        self.exponent_bits_per_sample
    }

    pub fn floating_point_sample(&self) -> bool {
        self.floating_point_sample
    }

    pub fn f32() -> BitDepth {
        BitDepth {
            floating_point_sample: true,
            bits_per_sample: 32,
            exponent_bits_per_sample: 8,
        }
    }

    pub fn uint(bits: u32) -> BitDepth {
        BitDepth {
            floating_point_sample: false,
            bits_per_sample: bits,
            exponent_bits_per_sample: 0,
        }
    }

    fn check(&self) -> Result<()> {
        if self.floating_point_sample {
            if !(2..=8).contains(&self.exponent_bits_per_sample) {
                Err(Error::InvalidExponent(self.exponent_bits_per_sample))
            } else {
                let mantissa_bits =
                    self.bits_per_sample as i32 - self.exponent_bits_per_sample as i32 - 1;
                if !(2..=23).contains(&mantissa_bits) {
                    Err(Error::InvalidMantissa(mantissa_bits))
                } else {
                    Ok(())
                }
            }
        } else if self.bits_per_sample > 31 {
            Err(Error::InvalidBitsPerSample(self.bits_per_sample))
        } else {
            Ok(())
        }
    }
}

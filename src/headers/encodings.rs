// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use half::f16;
use num_traits::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};

/// How a single u32 field is stored in the bitstream.
#[derive(Clone, Copy)]
pub enum U32 {
    Bits(usize),
    BitsOffset { n: usize, off: u32 },
    Val(u32),
}

impl U32 {
    pub fn read(&self, br: &mut BitReader) -> Result<u32> {
        match *self {
            U32::Bits(n) => Ok(br.read(n)? as u32),
            U32::BitsOffset { n, off } => Ok(br.read(n)? as u32 + off),
            U32::Val(val) => Ok(val),
        }
    }
}

/// Shorthand for the four-way selector coder: a 2-bit selector followed by
/// the chosen distribution.
pub fn read_u2s(br: &mut BitReader, d0: U32, d1: U32, d2: U32, d3: U32) -> Result<u32> {
    match br.read(2)? {
        0 => d0.read(br),
        1 => d1.read(br),
        2 => d2.read(br),
        3 => d3.read(br),
        _ => unreachable!(),
    }
}

pub fn read_bool(br: &mut BitReader) -> Result<bool> {
    Ok(br.read(1)? != 0)
}

/// Variable-length u64: 2-bit selector, then 0 / u(4)+1 / u(8)+17 / a
/// 12-bit seed extended by 8-bit continuation groups.
pub fn read_u64(br: &mut BitReader) -> Result<u64> {
    match br.read(2)? {
        0 => Ok(0),
        1 => Ok(br.read(4)? + 1),
        2 => Ok(br.read(8)? + 17),
        3 => {
            let mut value = br.read(12)?;
            let mut shift = 12;
            while br.read(1)? == 1 {
                if shift == 60 {
                    value |= br.read(4)? << shift;
                    break;
                }
                value |= br.read(8)? << shift;
                shift += 8;
            }
            Ok(value)
        }
        _ => unreachable!(),
    }
}

/// Binary16 float, rejecting NaN and infinities.
pub fn read_f16(br: &mut BitReader) -> Result<f32> {
    let bits = br.read(16)? as u16;
    let value = f16::from_bits(bits);
    if value.is_nan() || value.is_infinite() {
        return Err(Error::FloatNaNOrInf);
    }
    Ok(value.to_f32())
}

/// The standard enum coder: `u2S(0, 1, Bits(4)+2, Bits(6)+18)` followed by
/// a range check against the enum's variants.
pub fn read_enum<T: FromPrimitive>(name: &'static str, br: &mut BitReader) -> Result<T> {
    let value = read_u2s(
        br,
        U32::Val(0),
        U32::Val(1),
        U32::BitsOffset { n: 4, off: 2 },
        U32::BitsOffset { n: 6, off: 18 },
    )?;
    T::from_u32(value).ok_or(Error::InvalidEnum(value, name))
}

/// Length-prefixed UTF-8 string, one byte per character group.
pub fn read_string(br: &mut BitReader) -> Result<String> {
    let len = read_u2s(
        br,
        U32::Val(0),
        U32::Bits(4),
        U32::BitsOffset { n: 5, off: 16 },
        U32::BitsOffset { n: 10, off: 48 },
    )? as usize;
    let mut bytes = Vec::new();
    bytes.try_reserve(len)?;
    for _ in 0..len {
        bytes.push(br.read(8)? as u8);
    }
    String::from_utf8(bytes).map_err(|_| Error::InvalidName)
}

/// A header bundle that can be read from the beginning of a bitstream with
/// no outside context.
pub trait JxlHeader
where
    Self: Sized,
{
    fn read(br: &mut BitReader) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::BitWriter;

    #[test]
    fn u64_selectors() {
        let mut w = BitWriter::new();
        w.write(2, 0); // selector 0 -> 0
        w.write(2, 1); // selector 1
        w.write(4, 11); // -> 12
        w.write(2, 2); // selector 2
        w.write(8, 0); // -> 17
        w.write(2, 3); // selector 3
        w.write(12, 0xabc);
        w.write(1, 0); // no continuation
        let data = w.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_u64(&mut br).unwrap(), 0);
        assert_eq!(read_u64(&mut br).unwrap(), 12);
        assert_eq!(read_u64(&mut br).unwrap(), 17);
        assert_eq!(read_u64(&mut br).unwrap(), 0xabc);
    }

    #[test]
    fn u64_continuation() {
        let mut w = BitWriter::new();
        w.write(2, 3);
        w.write(12, 0xfff);
        w.write(1, 1);
        w.write(8, 0xab);
        w.write(1, 0);
        let data = w.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_u64(&mut br).unwrap(), 0xfff | (0xab << 12));
    }

    #[test]
    fn string_roundtrip() {
        let mut w = BitWriter::new();
        w.write_string("frame 1");
        let data = w.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_string(&mut br).unwrap(), "frame 1");
    }

    #[test]
    fn empty_string() {
        let mut w = BitWriter::new();
        w.write_string("");
        let data = w.finish();
        let mut br = BitReader::new(&data);
        assert_eq!(read_string(&mut br).unwrap(), "");
    }
}

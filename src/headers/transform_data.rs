// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::Result;
use crate::headers::encodings::*;

/// Custom opsin inverse matrix and upsampling weights. The streaming
/// front-end parses this bundle to find the end of the codestream headers;
/// the values themselves are consumed by the inner decoder.
#[derive(Debug, Clone, Default)]
pub struct CustomTransformData {
    pub custom_weights_mask: u32,
}

impl CustomTransformData {
    pub fn read(br: &mut BitReader, xyb_encoded: bool) -> Result<CustomTransformData> {
        if read_bool(br)? {
            return Ok(CustomTransformData::default());
        }
        if xyb_encoded {
            // Opsin inverse matrix: 3x3 matrix, opsin biases, quant biases.
            if !read_bool(br)? {
                for _ in 0..(9 + 3 + 4) {
                    read_f16(br)?;
                }
            }
        }
        let custom_weights_mask = br.read(3)? as u32;
        if custom_weights_mask & 1 != 0 {
            for _ in 0..15 {
                read_f16(br)?;
            }
        }
        if custom_weights_mask & 2 != 0 {
            for _ in 0..55 {
                read_f16(br)?;
            }
        }
        if custom_weights_mask & 4 != 0 {
            for _ in 0..210 {
                read_f16(br)?;
            }
        }
        Ok(CustomTransformData {
            custom_weights_mask,
        })
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
        let td = CustomTransformData::read(&mut BitReader::new(&data), true).unwrap();
        assert_eq!(td.custom_weights_mask, 0);
    }

    #[test]
    fn custom_up2_weights() {
        let mut w = BitWriter::new();
        w.write_bool(false); // not all_default
        w.write_bool(true); // opsin matrix all_default
        w.write(3, 1); // custom 2x weights
        for _ in 0..15 {
            w.write(16, 0x3c00); // f16 1.0
        }
        w.write(8, 0x7f); // trailing data
        let data = w.finish();
        let mut br = BitReader::new(&data);
        let td = CustomTransformData::read(&mut br, true).unwrap();
        assert_eq!(td.custom_weights_mask, 1);
        assert_eq!(br.read(8).unwrap(), 0x7f);
    }
}

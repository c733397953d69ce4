// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod bit_depth;
pub mod color_encoding;
pub mod encodings;
pub mod extra_channels;
pub mod frame_header;
pub mod image_metadata;
pub mod size;
pub mod toc;
pub mod transform_data;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};

pub use encodings::JxlHeader;
pub use image_metadata::{Animation, ImageMetadata, Orientation};
pub use size::{Preview, Size};
pub use transform_data::CustomTransformData;

/// The two-byte codestream signature, present at the start of every
/// codestream (also inside a container's codestream boxes).
#[derive(Debug, Default)]
pub struct Signature;

impl JxlHeader for Signature {
    fn read(br: &mut BitReader) -> Result<Signature> {
        let sig1 = br.read(8)? as u8;
        let sig2 = br.read(8)? as u8;
        if (sig1, sig2) != (0xff, 0x0a) {
            Err(Error::InvalidSignature(sig1, sig2))
        } else {
            Ok(Signature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature() {
        assert!(Signature::read(&mut BitReader::new(&[0xff, 0x0a])).is_ok());
        assert_eq!(
            Signature::read(&mut BitReader::new(&[0xff, 0x0b])).unwrap_err(),
            Error::InvalidSignature(0xff, 0x0b)
        );
        assert!(Signature::read(&mut BitReader::new(&[0xff]))
            .unwrap_err()
            .is_transient());
    }
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// The magic bytes for a bare JPEG XL codestream.
pub const CODESTREAM_SIGNATURE: [u8; 2] = [0xff, 0x0a];
/// The magic bytes for a file using the JPEG XL container format.
pub const CONTAINER_SIGNATURE: [u8; 12] =
    [0, 0, 0, 0xc, b'J', b'X', b'L', b' ', 0xd, 0xa, 0x87, 0xa];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// The prefix is consistent with a signature but too short to decide.
    NotEnoughBytes,
    /// Definitely not a JPEG XL file.
    Invalid,
    /// A bare codestream.
    Codestream,
    /// The ISO-BMFF style container.
    Container,
}

/// Classifies the bytes at `buf[*pos..]`. On a successful match, advances
/// `*pos` past the matched signature bytes.
pub fn check_signature(buf: &[u8], pos: &mut usize) -> Signature {
    if *pos >= buf.len() {
        return Signature::NotEnoughBytes;
    }
    let buf = &buf[*pos..];

    // Bare codestream: 0xff 0x0a.
    if buf[0] == 0xff {
        if buf.len() < 2 {
            return Signature::NotEnoughBytes;
        }
        if buf[1] == CODESTREAM_SIGNATURE[1] {
            *pos += CODESTREAM_SIGNATURE.len();
            return Signature::Codestream;
        }
        return Signature::Invalid;
    }

    // Container: the full 12-byte magic.
    if buf[0] == 0 {
        if buf.len() < CONTAINER_SIGNATURE.len() {
            return Signature::NotEnoughBytes;
        }
        if buf[..CONTAINER_SIGNATURE.len()] == CONTAINER_SIGNATURE {
            *pos += CONTAINER_SIGNATURE.len();
            return Signature::Container;
        }
        return Signature::Invalid;
    }

    Signature::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! signature_test {
        ($test_name:ident, $bytes:expr, $expected:expr, $advanced:expr) => {
            #[test]
            fn $test_name() {
                let mut pos = 0;
                assert_eq!(check_signature($bytes, &mut pos), $expected);
                assert_eq!(pos, $advanced);
            }
        };
    }

    signature_test!(empty, &[], Signature::NotEnoughBytes, 0);
    signature_test!(codestream_first_byte, &[0xff], Signature::NotEnoughBytes, 0);
    signature_test!(
        codestream,
        &CODESTREAM_SIGNATURE,
        Signature::Codestream,
        2
    );
    signature_test!(
        codestream_with_extra,
        &[0xff, 0x0a, 1, 2, 3],
        Signature::Codestream,
        2
    );
    signature_test!(bad_marker, &[0xff, 0x0b], Signature::Invalid, 0);
    signature_test!(
        container_partial,
        &CONTAINER_SIGNATURE[..5],
        Signature::NotEnoughBytes,
        0
    );
    signature_test!(container, &CONTAINER_SIGNATURE, Signature::Container, 12);
    signature_test!(
        almost_container,
        &[0, 0, 0, 0xc, b'J', b'X', b'L', b'!', 0xd, 0xa, 0x87, 0xa],
        Signature::Invalid,
        0
    );
    signature_test!(garbage, &[0x12, 0x34], Signature::Invalid, 0);

    #[test]
    fn respects_start_offset() {
        let mut data = vec![0x99, 0x98];
        data.extend(CODESTREAM_SIGNATURE);
        let mut pos = 2;
        assert_eq!(check_signature(&data, &mut pos), Signature::Codestream);
        assert_eq!(pos, 4);
    }
}

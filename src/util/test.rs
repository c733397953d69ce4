// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Test-only helpers: an LSB-first bit writer matching [`BitReader`]'s bit
//! order, plus builders for synthetic codestreams and container files.

use crate::headers::encodings::U32;

/// Writes bits least significant first, the mirror image of
/// [`crate::bit_reader::BitReader`].
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_pos: 0,
        }
    }

    pub fn write(&mut self, num: usize, value: u64) {
        assert!(num <= 56);
        assert!(num == 64 || value < (1u64 << num));
        for i in 0..num {
            if self.bit_pos % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = (value >> i) & 1;
            *self.bytes.last_mut().unwrap() |= (bit as u8) << (self.bit_pos % 8);
            self.bit_pos += 1;
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write(1, value as u64);
    }

    /// Encodes `value` with the four-way selector coder, picking the first
    /// distribution that can represent it.
    pub fn write_u2s(&mut self, dists: [U32; 4], value: u32) {
        for (selector, dist) in dists.iter().enumerate() {
            let representable = match *dist {
                U32::Val(v) => v == value,
                U32::Bits(n) => (value as u64) < (1u64 << n),
                U32::BitsOffset { n, off } => {
                    value >= off && ((value - off) as u64) < (1u64 << n)
                }
            };
            if !representable {
                continue;
            }
            self.write(2, selector as u64);
            match *dist {
                U32::Val(_) => {}
                U32::Bits(n) => self.write(n, value as u64),
                U32::BitsOffset { n, off } => self.write(n, (value - off) as u64),
            }
            return;
        }
        panic!("value {value} not representable by any selector");
    }

    pub fn write_u64(&mut self, value: u64) {
        if value == 0 {
            self.write(2, 0);
        } else if value <= 16 {
            self.write(2, 1);
            self.write(4, value - 1);
        } else if value <= 272 {
            self.write(2, 2);
            self.write(8, value - 17);
        } else {
            self.write(2, 3);
            self.write(12, value & 0xfff);
            let mut rest = value >> 12;
            let mut shift = 12;
            while rest != 0 {
                self.write(1, 1);
                if shift == 60 {
                    self.write(4, rest & 0xf);
                    return;
                }
                self.write(8, rest & 0xff);
                rest >>= 8;
                shift += 8;
            }
            self.write(1, 0);
        }
    }

    pub fn write_enum(&mut self, value: u32) {
        self.write_u2s(
            [
                U32::Val(0),
                U32::Val(1),
                U32::BitsOffset { n: 4, off: 2 },
                U32::BitsOffset { n: 6, off: 18 },
            ],
            value,
        );
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_u2s(
            [
                U32::Val(0),
                U32::Bits(4),
                U32::BitsOffset { n: 5, off: 16 },
                U32::BitsOffset { n: 10, off: 48 },
            ],
            s.len() as u32,
        );
        for b in s.bytes() {
            self.write(8, b as u64);
        }
    }

    pub fn zero_pad_to_byte(&mut self) {
        while self.bit_pos % 8 != 0 {
            self.write(1, 0);
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Describes one synthetic frame for [`build_codestream`].
pub struct TestFrame {
    pub duration: u32,
    pub is_last: bool,
    /// `save_as_reference` slot selector, 0..=3.
    pub save_as_reference: u32,
    /// Payload bytes of the frame's single section.
    pub section: Vec<u8>,
}

impl TestFrame {
    pub fn still(section: Vec<u8>) -> Self {
        Self {
            duration: 0,
            is_last: true,
            save_as_reference: 0,
            section,
        }
    }

    pub fn animated(duration: u32, is_last: bool, section: Vec<u8>) -> Self {
        Self {
            duration,
            is_last,
            save_as_reference: 0,
            section,
        }
    }
}

/// Image-level parameters for [`build_codestream`].
pub struct TestImage {
    pub xsize: u32,
    pub ysize: u32,
    pub have_animation: bool,
    pub orientation: u32,
    /// When set, a 16x16 preview frame with this section payload precedes
    /// the regular frames.
    pub preview_section: Option<Vec<u8>>,
    pub frames: Vec<TestFrame>,
}

/// Preview dimensions emitted by the builder (the smallest the coder can
/// express).
pub const PREVIEW_DIM: u32 = 16;

impl TestImage {
    pub fn still(xsize: u32, ysize: u32, section: Vec<u8>) -> Self {
        Self {
            xsize,
            ysize,
            have_animation: false,
            orientation: 1,
            preview_section: None,
            frames: vec![TestFrame::still(section)],
        }
    }

    pub fn animation(xsize: u32, ysize: u32, frames: Vec<TestFrame>) -> Self {
        Self {
            xsize,
            ysize,
            have_animation: true,
            orientation: 1,
            preview_section: None,
            frames,
        }
    }

    pub fn with_preview(mut self, section: Vec<u8>) -> Self {
        assert!(!self.have_animation, "preview builder only supports stills");
        self.preview_section = Some(section);
        self
    }
}

fn write_size(w: &mut BitWriter, xsize: u32, ysize: u32) {
    assert!(xsize % 8 == 0 && ysize % 8 == 0 && xsize <= 256 && ysize <= 256);
    w.write_bool(true); // small
    w.write(5, (ysize / 8 - 1) as u64);
    w.write(3, 0); // ratio: unknown, explicit xsize
    w.write(5, (xsize / 8 - 1) as u64);
}

fn write_metadata(w: &mut BitWriter, image: &TestImage) {
    let plain =
        !image.have_animation && image.orientation == 1 && image.preview_section.is_none();
    if plain {
        w.write_bool(true); // all_default
        return;
    }
    w.write_bool(false); // all_default
    w.write_bool(true); // extra_fields
    w.write(3, (image.orientation - 1) as u64);
    w.write_bool(false); // have_intrinsic_size
    w.write_bool(image.preview_section.is_some());
    if image.preview_section.is_some() {
        w.write_bool(true); // div8
        w.write(2, 2); // ysize_div8 selector: Bits(5) + 1
        w.write(5, PREVIEW_DIM as u64 / 8 - 1); // -> ysize PREVIEW_DIM
        w.write(3, 1); // ratio 1:1
    }
    w.write_bool(image.have_animation);
    if image.have_animation {
        // 100 ticks per second, denominator 1, loop forever, no timecodes.
        w.write(2, 0); // tps_numerator selector -> 100
        w.write(2, 0); // tps_denominator selector -> 1
        w.write(2, 0); // num_loops selector -> 0
        w.write_bool(false); // have_timecodes
    }
    // Bit depth: unsigned 8-bit.
    w.write_bool(false); // floating_point_sample
    w.write(2, 0); // bits_per_sample selector -> 8
    w.write_bool(true); // modular_16bit_sufficient
    w.write(2, 0); // num_extra_channels selector -> 0
    w.write_bool(true); // xyb_encoded
    w.write_bool(true); // color_encoding all_default
    w.write_bool(true); // tone_mapping all_default
    w.write_u64(0); // extensions
}

fn write_frame(w: &mut BitWriter, image: &TestImage, frame: &TestFrame) {
    let plain = !image.have_animation
        && frame.is_last
        && frame.duration == 0
        && frame.save_as_reference == 0;
    if plain {
        w.write_bool(true); // all_default
    } else {
        w.write_bool(false); // all_default
        w.write(2, 0); // frame_type: regular
        w.write(1, 0); // encoding: VarDCT
        w.write_u64(0); // flags
        // xyb_encoded, so no do_ycbcr field.
        w.write(2, 0); // upsampling selector -> 1
        // no extra channels -> no ec_upsampling entries
        w.write(3, 3); // x_qm_scale
        w.write(3, 2); // b_qm_scale
        w.write(2, 0); // num_passes selector -> 1
        w.write_bool(false); // have_crop
        w.write(2, 0); // blending mode selector -> Replace
        if image.have_animation {
            w.write_u2s(
                [
                    U32::Val(0),
                    U32::Val(1),
                    U32::Bits(8),
                    U32::Bits(32),
                ],
                frame.duration,
            );
        }
        w.write_bool(frame.is_last);
        if !frame.is_last {
            w.write(2, frame.save_as_reference as u64);
        }
        w.write_bool(false); // save_before_ct
        w.write_string(""); // name
        w.write_bool(true); // restoration_filter all_default
        w.write_u64(0); // frame extensions
    }
    // TOC: one entry (single group, single pass).
    w.write_bool(false); // not permuted
    w.write_u2s(
        [
            U32::Bits(10),
            U32::BitsOffset { n: 14, off: 1024 },
            U32::BitsOffset { n: 22, off: 17408 },
            U32::BitsOffset { n: 30, off: 4211712 },
        ],
        frame.section.len() as u32,
    );
    w.zero_pad_to_byte();
    for b in &frame.section {
        w.write(8, *b as u64);
    }
}

/// Builds a bare codestream (signature, headers, frames) for an image small
/// enough to use a single group and a single section per frame.
pub fn build_codestream(image: &TestImage) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write(8, 0xff);
    w.write(8, 0x0a);
    write_size(&mut w, image.xsize, image.ysize);
    write_metadata(&mut w, image);
    w.write_bool(true); // transform_data all_default
    w.zero_pad_to_byte();
    if let Some(section) = &image.preview_section {
        write_frame(&mut w, image, &TestFrame::still(section.clone()));
    }
    for frame in &image.frames {
        write_frame(&mut w, image, frame);
    }
    w.finish()
}

/// Wraps `content` in an ISO-BMFF box of the given type.
pub fn make_box(ty: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(((content.len() + 8) as u32).to_be_bytes());
    out.extend(ty);
    out.extend(content);
    out
}

/// Wraps `content` in a box whose size field is 0 ("to end of file").
pub fn make_unbounded_box(ty: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(0u32.to_be_bytes());
    out.extend(ty);
    out.extend(content);
    out
}

pub const CONTAINER_SIGNATURE: [u8; 12] =
    [0, 0, 0, 0xc, b'J', b'X', b'L', b' ', 0xd, 0xa, 0x87, 0xa];

/// Wraps a codestream in a minimal container: signature box, ftyp box, one
/// jxlc box.
pub fn build_container(codestream: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(CONTAINER_SIGNATURE);
    out.extend(make_box(b"ftyp", b"jxl \x00\x00\x00\x00jxl "));
    out.extend(make_box(b"jxlc", codestream));
    out
}

/// Wraps a codestream in a container that splits it over `jxlp` boxes with
/// the given part lengths; the last part takes the remainder.
pub fn build_jxlp_container(codestream: &[u8], part_lens: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(CONTAINER_SIGNATURE);
    out.extend(make_box(b"ftyp", b"jxl \x00\x00\x00\x00jxl "));
    let mut pos = 0;
    for (i, len) in part_lens.iter().enumerate() {
        let mut content = Vec::new();
        content.extend((i as u32).to_be_bytes());
        content.extend(&codestream[pos..pos + len]);
        out.extend(make_box(b"jxlp", &content));
        pos += len;
    }
    let mut content = Vec::new();
    content.extend((part_lens.len() as u32 | 0x8000_0000).to_be_bytes());
    content.extend(&codestream[pos..]);
    out.extend(make_box(b"jxlp", &content));
    out
}

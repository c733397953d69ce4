// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::*;
use crate::headers::image_metadata::read_extensions;

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum FrameType {
    RegularFrame = 0,
    DCFrame = 1,
    ReferenceOnly = 2,
    SkipProgressive = 3,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum Encoding {
    VarDCT = 0,
    Modular = 1,
}

pub struct Flags;

impl Flags {
    pub const ENABLE_NOISE: u64 = 1;
    pub const ENABLE_PATCHES: u64 = 2;
    pub const ENABLE_SPLINES: u64 = 0x10;
    pub const USE_LF_FRAME: u64 = 0x20;
    pub const SKIP_ADAPTIVE_LF_SMOOTHING: u64 = 0x80;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Passes {
    pub num_passes: u32,
    pub num_ds: u32,
    pub shift: Vec<u32>,
    pub downsample: Vec<u32>,
    pub last_pass: Vec<u32>,
}

impl Default for Passes {
    fn default() -> Self {
        Passes {
            num_passes: 1,
            num_ds: 0,
            shift: Vec::new(),
            downsample: Vec::new(),
            last_pass: Vec::new(),
        }
    }
}

impl JxlHeader for Passes {
    fn read(br: &mut BitReader) -> Result<Passes> {
        let mut passes = Passes {
            num_passes: read_u2s(
                br,
                U32::Val(1),
                U32::Val(2),
                U32::Val(3),
                U32::BitsOffset { n: 3, off: 4 },
            )?,
            ..Passes::default()
        };
        if passes.num_passes != 1 {
            passes.num_ds = read_u2s(
                br,
                U32::Val(0),
                U32::Val(1),
                U32::Val(2),
                U32::BitsOffset { n: 1, off: 3 },
            )?;
            for _ in 0..passes.num_passes - 1 {
                passes.shift.push(br.read(2)? as u32);
            }
            for _ in 0..passes.num_ds {
                passes
                    .downsample
                    .push(read_u2s(br, U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8))?);
            }
            for _ in 0..passes.num_ds {
                passes
                    .last_pass
                    .push(read_u2s(br, U32::Val(0), U32::Val(1), U32::Val(2), U32::Bits(3))?);
            }
            if passes.num_ds >= passes.num_passes {
                return Err(Error::NumPassesTooLarge(passes.num_ds, passes.num_passes));
            }
        }
        Ok(passes)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum BlendingMode {
    Replace = 0,
    Add = 1,
    Blend = 2,
    AlphaWeightedAdd = 3,
    Mul = 4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendingInfo {
    pub mode: BlendingMode,
    pub alpha_channel: u32,
    pub clamp: bool,
    pub source: u32,
}

impl Default for BlendingInfo {
    fn default() -> Self {
        BlendingInfo {
            mode: BlendingMode::Replace,
            alpha_channel: 0,
            clamp: false,
            source: 0,
        }
    }
}

impl BlendingInfo {
    fn read(br: &mut BitReader, num_extra_channels: u32, full_frame: bool) -> Result<BlendingInfo> {
        let mut info = BlendingInfo::default();
        let mode = read_u2s(
            br,
            U32::Val(0),
            U32::Val(1),
            U32::Val(2),
            U32::BitsOffset { n: 2, off: 3 },
        )?;
        info.mode = num_traits::FromPrimitive::from_u32(mode)
            .ok_or(Error::InvalidEnum(mode, "BlendingMode"))?;
        let uses_alpha =
            matches!(info.mode, BlendingMode::Blend | BlendingMode::AlphaWeightedAdd);
        if num_extra_channels > 0 && uses_alpha {
            info.alpha_channel = read_u2s(
                br,
                U32::Val(0),
                U32::Val(1),
                U32::Val(2),
                U32::BitsOffset { n: 3, off: 3 },
            )?;
        }
        if num_extra_channels > 0 && (uses_alpha || info.mode == BlendingMode::Mul) {
            info.clamp = read_bool(br)?;
        }
        if info.mode != BlendingMode::Replace || !full_frame {
            info.source = br.read(2)? as u32;
        }
        Ok(info)
    }
}

/// Gaborish and edge-preserving-filter parameters; the values only matter
/// to the inner decoder, but the fields have to be walked to find the end
/// of the frame header.
#[derive(Debug, Clone, Default)]
pub struct RestorationFilter {
    pub gab: bool,
    pub epf_iters: u32,
}

impl RestorationFilter {
    fn read(br: &mut BitReader, encoding: Encoding) -> Result<RestorationFilter> {
        if read_bool(br)? {
            return Ok(RestorationFilter {
                gab: true,
                epf_iters: 2,
            });
        }
        let gab = read_bool(br)?;
        if gab && read_bool(br)? {
            // Custom gaborish weights.
            for _ in 0..6 {
                read_f16(br)?;
            }
        }
        let epf_iters = br.read(2)? as u32;
        if epf_iters > 0 {
            if encoding == Encoding::VarDCT && read_bool(br)? {
                for _ in 0..8 {
                    read_f16(br)?;
                }
            }
            if read_bool(br)? {
                // Channel scales and zero-flush weights.
                for _ in 0..5 {
                    read_f16(br)?;
                }
            }
            if read_bool(br)? {
                // Sigma parameters.
                if encoding == Encoding::VarDCT {
                    read_f16(br)?;
                }
                for _ in 0..3 {
                    read_f16(br)?;
                }
            }
            if encoding == Encoding::Modular {
                read_f16(br)?;
            }
        }
        read_extensions(br)?;
        Ok(RestorationFilter { gab, epf_iters })
    }
}

/// Context the frame header needs from the file headers.
#[derive(Debug, Clone)]
pub struct FrameHeaderNonserialized {
    pub xyb_encoded: bool,
    pub num_extra_channels: u32,
    pub have_animation: bool,
    pub have_timecodes: bool,
    pub img_width: u32,
    pub img_height: u32,
    pub is_preview: bool,
}

const GROUP_DIM: u32 = 256;

#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub encoding: Encoding,
    pub flags: u64,
    pub do_ycbcr: bool,
    pub jpeg_upsampling: [u32; 3],
    pub upsampling: u32,
    pub ec_upsampling: Vec<u32>,
    pub group_size_shift: u32,
    pub x_qm_scale: u32,
    pub b_qm_scale: u32,
    pub passes: Passes,
    pub lf_level: u32,
    pub have_crop: bool,
    pub x0: i32,
    pub y0: i32,
    pub blending_info: BlendingInfo,
    pub ec_blending_info: Vec<BlendingInfo>,
    pub duration: u32,
    pub timecode: u32,
    pub is_last: bool,
    pub save_as_reference: u32,
    pub save_before_ct: bool,
    pub name: String,
    pub restoration_filter: RestorationFilter,
    pub extensions: u64,
    /// Frame dimensions resolved against the image (or preview) size.
    width: u32,
    height: u32,
    is_preview: bool,
}

impl FrameHeader {
    fn defaults(nonserialized: &FrameHeaderNonserialized) -> FrameHeader {
        FrameHeader {
            frame_type: FrameType::RegularFrame,
            encoding: Encoding::VarDCT,
            flags: 0,
            do_ycbcr: false,
            jpeg_upsampling: [0; 3],
            upsampling: 1,
            ec_upsampling: vec![1; nonserialized.num_extra_channels as usize],
            group_size_shift: 1,
            x_qm_scale: 3,
            b_qm_scale: 2,
            passes: Passes::default(),
            lf_level: 0,
            have_crop: false,
            x0: 0,
            y0: 0,
            blending_info: BlendingInfo::default(),
            ec_blending_info: vec![
                BlendingInfo::default();
                nonserialized.num_extra_channels as usize
            ],
            duration: 0,
            timecode: 0,
            is_last: true,
            save_as_reference: 0,
            save_before_ct: false,
            name: String::new(),
            restoration_filter: RestorationFilter {
                gab: true,
                epf_iters: 2,
            },
            extensions: 0,
            width: nonserialized.img_width,
            height: nonserialized.img_height,
            is_preview: nonserialized.is_preview,
        }
    }

    pub fn read(br: &mut BitReader, nonserialized: &FrameHeaderNonserialized) -> Result<FrameHeader> {
        if read_bool(br)? {
            return Ok(FrameHeader::defaults(nonserialized));
        }
        let mut header = FrameHeader::defaults(nonserialized);
        header.frame_type = read_enum_bits::<FrameType>("FrameType", br, 2)?;
        header.encoding = read_enum_bits::<Encoding>("Encoding", br, 1)?;
        header.flags = read_u64(br)?;
        if !nonserialized.xyb_encoded {
            header.do_ycbcr = read_bool(br)?;
        }
        let use_lf_frame = header.flags & Flags::USE_LF_FRAME != 0;
        if header.do_ycbcr && !use_lf_frame {
            for v in header.jpeg_upsampling.iter_mut() {
                *v = br.read(2)? as u32;
            }
        }
        if !use_lf_frame {
            header.upsampling = read_u2s(br, U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8))?;
            for v in header.ec_upsampling.iter_mut() {
                *v = read_u2s(br, U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8))?;
            }
        }
        if header.encoding == Encoding::Modular {
            header.group_size_shift = br.read(2)? as u32;
        }
        if header.encoding == Encoding::VarDCT && nonserialized.xyb_encoded {
            header.x_qm_scale = br.read(3)? as u32;
            header.b_qm_scale = br.read(3)? as u32;
        }
        if header.frame_type != FrameType::ReferenceOnly {
            header.passes = Passes::read(br)?;
        }
        if header.frame_type == FrameType::DCFrame {
            header.lf_level = read_u2s(br, U32::Val(1), U32::Val(2), U32::Val(3), U32::Val(4))?;
        }
        if header.frame_type != FrameType::DCFrame {
            header.have_crop = read_bool(br)?;
        }
        let dim_coder = || {
            [
                U32::Bits(8),
                U32::BitsOffset { n: 11, off: 256 },
                U32::BitsOffset { n: 14, off: 2304 },
                U32::BitsOffset {
                    n: 30,
                    off: 18688,
                },
            ]
        };
        if header.have_crop {
            if header.frame_type != FrameType::ReferenceOnly {
                let [d0, d1, d2, d3] = dim_coder();
                header.x0 = unpack_signed(read_u2s(br, d0, d1, d2, d3)?);
                let [d0, d1, d2, d3] = dim_coder();
                header.y0 = unpack_signed(read_u2s(br, d0, d1, d2, d3)?);
            }
            let [d0, d1, d2, d3] = dim_coder();
            header.width = read_u2s(br, d0, d1, d2, d3)?;
            let [d0, d1, d2, d3] = dim_coder();
            header.height = read_u2s(br, d0, d1, d2, d3)?;
        }
        let full_frame = !header.have_crop
            || (header.x0 <= 0
                && header.y0 <= 0
                && header.width as i64 + header.x0 as i64 >= nonserialized.img_width as i64
                && header.height as i64 + header.y0 as i64 >= nonserialized.img_height as i64);
        let normal_frame = matches!(
            header.frame_type,
            FrameType::RegularFrame | FrameType::SkipProgressive
        );
        if normal_frame {
            header.blending_info =
                BlendingInfo::read(br, nonserialized.num_extra_channels, full_frame)?;
            header.ec_blending_info.clear();
            for _ in 0..nonserialized.num_extra_channels {
                header.ec_blending_info.push(BlendingInfo::read(
                    br,
                    nonserialized.num_extra_channels,
                    full_frame,
                )?);
            }
            if nonserialized.have_animation {
                header.duration =
                    read_u2s(br, U32::Val(0), U32::Val(1), U32::Bits(8), U32::Bits(32))?;
            }
            if nonserialized.have_timecodes {
                header.timecode = br.read(32)? as u32;
            }
            header.is_last = read_bool(br)?;
        } else {
            header.is_last = false;
        }
        if header.frame_type != FrameType::DCFrame && !header.is_last {
            header.save_as_reference = br.read(2)? as u32;
        }
        if header.frame_type != FrameType::DCFrame {
            header.save_before_ct = read_bool(br)?;
        }
        header.name = read_string(br)?;
        header.restoration_filter = RestorationFilter::read(br, header.encoding)?;
        header.extensions = read_extensions(br)?;
        header.check(nonserialized)?;
        Ok(header)
    }

    fn check(&self, _nonserialized: &FrameHeaderNonserialized) -> Result<()> {
        if self.upsampling > 1 {
            if let Some(ec_upsampling) = self
                .ec_upsampling
                .iter()
                .find(|ec_upsampling| **ec_upsampling < self.upsampling)
            {
                return Err(Error::InvalidEcUpsampling(
                    self.upsampling,
                    0,
                    *ec_upsampling,
                ));
            }
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions after upsampling, used for the policy size checks.
    pub fn upsampled_size(&self) -> (u64, u64) {
        (
            self.width as u64 * self.upsampling as u64,
            self.height as u64 * self.upsampling as u64,
        )
    }

    pub fn is_preview(&self) -> bool {
        self.is_preview
    }

    fn group_dim(&self) -> u32 {
        match self.encoding {
            Encoding::VarDCT => GROUP_DIM,
            Encoding::Modular => 128 << self.group_size_shift,
        }
    }

    pub fn num_groups(&self) -> usize {
        let dim = self.group_dim();
        (self.width.div_ceil(dim) as usize) * (self.height.div_ceil(dim) as usize)
    }

    pub fn num_dc_groups(&self) -> usize {
        let dim = self.group_dim() * 8;
        (self.width.div_ceil(dim) as usize) * (self.height.div_ceil(dim) as usize)
    }

    /// Number of TOC entries: a single one when the frame is one group and
    /// one pass, otherwise LfGlobal + HfGlobal plus per-group sections.
    pub fn num_toc_entries(&self) -> usize {
        let num_groups = self.num_groups();
        let num_passes = self.passes.num_passes as usize;
        if num_groups == 1 && num_passes == 1 {
            1
        } else {
            2 + self.num_dc_groups() + num_groups * num_passes
        }
    }

    /// Whether any future frame may use this one as a reference.
    pub fn can_be_referenced(&self) -> bool {
        // The last frame cannot be referenced; a DC frame is handled
        // through the dedicated DC slot; a frame with nonzero duration is
        // referenceable only when explicitly saved.
        !self.is_last
            && self.frame_type != FrameType::DCFrame
            && (self.duration == 0 || self.save_as_reference != 0)
    }

    /// Bitmask of the storage slots this frame is saved into: slots 0..3
    /// for explicitly saved references, slot 4 for DC frames.
    pub fn saved_as(&self) -> u8 {
        if self.frame_type == FrameType::DCFrame {
            16
        } else if self.can_be_referenced() {
            1 << self.save_as_reference
        } else {
            0
        }
    }
}

fn read_enum_bits<T: num_traits::FromPrimitive>(
    name: &'static str,
    br: &mut BitReader,
    bits: usize,
) -> Result<T> {
    let value = br.read(bits)? as u32;
    T::from_u32(value).ok_or(Error::InvalidEnum(value, name))
}

fn unpack_signed(v: u32) -> i32 {
    if v & 1 == 0 {
        (v >> 1) as i32
    } else {
        -(((v >> 1) + 1) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::BitWriter;

    fn nonserialized(animated: bool) -> FrameHeaderNonserialized {
        FrameHeaderNonserialized {
            xyb_encoded: true,
            num_extra_channels: 0,
            have_animation: animated,
            have_timecodes: false,
            img_width: 64,
            img_height: 64,
            is_preview: false,
        }
    }

    #[test]
    fn all_default_frame() {
        let mut w = BitWriter::new();
        w.write_bool(true);
        let data = w.finish();
        let header = FrameHeader::read(&mut BitReader::new(&data), &nonserialized(false)).unwrap();
        assert!(header.is_last);
        assert_eq!(header.duration, 0);
        assert_eq!(header.frame_type, FrameType::RegularFrame);
        assert_eq!(header.num_toc_entries(), 1);
        assert_eq!(header.saved_as(), 0);
        assert!(!header.can_be_referenced());
    }

    fn write_animated_frame(w: &mut BitWriter, duration: u32, is_last: bool, save_as: u32) {
        w.write_bool(false); // all_default
        w.write(2, 0); // regular frame
        w.write(1, 0); // VarDCT
        w.write_u64(0); // flags
        w.write(2, 0); // upsampling 1
        w.write(3, 3); // x_qm_scale
        w.write(3, 2); // b_qm_scale
        w.write(2, 0); // one pass
        w.write_bool(false); // no crop
        w.write(2, 0); // blending: replace
        w.write_u2s(
            [U32::Val(0), U32::Val(1), U32::Bits(8), U32::Bits(32)],
            duration,
        );
        w.write_bool(is_last);
        if !is_last {
            w.write(2, save_as as u64);
        }
        w.write_bool(false); // save_before_ct
        w.write_string("");
        w.write_bool(true); // restoration filter all_default
        w.write_u64(0); // extensions
    }

    #[test]
    fn animated_reference_frame() {
        let mut w = BitWriter::new();
        write_animated_frame(&mut w, 0, false, 2);
        let data = w.finish();
        let header = FrameHeader::read(&mut BitReader::new(&data), &nonserialized(true)).unwrap();
        assert!(!header.is_last);
        assert_eq!(header.duration, 0);
        assert_eq!(header.save_as_reference, 2);
        assert!(header.can_be_referenced());
        assert_eq!(header.saved_as(), 4);
    }

    #[test]
    fn animated_visible_frame() {
        let mut w = BitWriter::new();
        write_animated_frame(&mut w, 1, false, 0);
        let data = w.finish();
        let header = FrameHeader::read(&mut BitReader::new(&data), &nonserialized(true)).unwrap();
        assert_eq!(header.duration, 1);
        // Nonzero duration without an explicit save slot: not referenceable.
        assert!(!header.can_be_referenced());
        assert_eq!(header.saved_as(), 0);
    }

    #[test]
    fn group_counts() {
        let ns = FrameHeaderNonserialized {
            img_width: 1000,
            img_height: 600,
            ..nonserialized(false)
        };
        let mut w = BitWriter::new();
        w.write_bool(true);
        let data = w.finish();
        let header = FrameHeader::read(&mut BitReader::new(&data), &ns).unwrap();
        assert_eq!(header.num_groups(), 4 * 3);
        assert_eq!(header.num_dc_groups(), 1);
        assert_eq!(header.num_toc_entries(), 2 + 1 + 12);
    }

    #[test]
    fn truncated_header_is_transient() {
        let mut w = BitWriter::new();
        w.write_bool(false);
        w.write(2, 0);
        let data = w.finish();
        let err = FrameHeader::read(&mut BitReader::new(&data), &nonserialized(false)).unwrap_err();
        assert!(err.is_transient());
    }
}

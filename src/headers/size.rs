// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::Result;
use crate::headers::encodings::*;

#[derive(Copy, Clone, PartialEq, Debug, Default)]
enum AspectRatio {
    #[default]
    Unknown = 0,
    Ratio1Over1 = 1,
    Ratio12Over10 = 2,
    Ratio4Over3 = 3,
    Ratio3Over2 = 4,
    Ratio16Over9 = 5,
    Ratio5Over4 = 6,
    Ratio2Over1 = 7,
}

impl AspectRatio {
    fn from_bits(bits: u32) -> AspectRatio {
        match bits {
            1 => AspectRatio::Ratio1Over1,
            2 => AspectRatio::Ratio12Over10,
            3 => AspectRatio::Ratio4Over3,
            4 => AspectRatio::Ratio3Over2,
            5 => AspectRatio::Ratio16Over9,
            6 => AspectRatio::Ratio5Over4,
            7 => AspectRatio::Ratio2Over1,
            _ => AspectRatio::Unknown,
        }
    }
}

/// The image dimensions header.
#[derive(Debug, Clone, Default)]
pub struct Size {
    small: bool,
    ysize_div8: Option<u32>,
    ysize: Option<u32>,
    ratio: AspectRatio,
    xsize_div8: Option<u32>,
    xsize: Option<u32>,
}

/// The preview dimensions header, with its own denser coders.
#[derive(Debug, Clone)]
pub struct Preview {
    div8: bool,
    ysize_div8: Option<u32>,
    ysize: Option<u32>,
    ratio: AspectRatio,
    xsize_div8: Option<u32>,
    xsize: Option<u32>,
}

/// Maps ysize to xsize based on aspect ratio.
/// Returns None if the calculation would overflow u32.
fn map_aspect_ratio_checked(ysize: u32, ratio: AspectRatio) -> Option<u32> {
    let result = match ratio {
        AspectRatio::Unknown => return None, // Caller must use fallback
        AspectRatio::Ratio1Over1 => ysize as u64,
        AspectRatio::Ratio12Over10 => ysize as u64 * 12 / 10,
        AspectRatio::Ratio4Over3 => ysize as u64 * 4 / 3,
        AspectRatio::Ratio3Over2 => ysize as u64 * 3 / 2,
        AspectRatio::Ratio16Over9 => ysize as u64 * 16 / 9,
        AspectRatio::Ratio5Over4 => ysize as u64 * 5 / 4,
        AspectRatio::Ratio2Over1 => ysize as u64 * 2,
    };
    u32::try_from(result).ok()
}

fn map_aspect_ratio<T: Fn() -> u32>(ysize: u32, ratio: AspectRatio, fallback: T) -> u32 {
    match ratio {
        AspectRatio::Unknown => fallback(),
        // Saturate on overflow; such sizes fail the size-limit check anyway.
        _ => map_aspect_ratio_checked(ysize, ratio).unwrap_or(u32::MAX),
    }
}

impl JxlHeader for Size {
    fn read(br: &mut BitReader) -> Result<Size> {
        let small = read_bool(br)?;
        let mut size = Size {
            small,
            ..Size::default()
        };
        if small {
            size.ysize_div8 = Some(U32::BitsOffset { n: 5, off: 1 }.read(br)?);
        } else {
            size.ysize = Some(read_u2s(
                br,
                U32::BitsOffset { n: 9, off: 1 },
                U32::BitsOffset { n: 13, off: 1 },
                U32::BitsOffset { n: 18, off: 1 },
                U32::BitsOffset { n: 30, off: 1 },
            )?);
        }
        size.ratio = AspectRatio::from_bits(br.read(3)? as u32);
        if size.ratio == AspectRatio::Unknown {
            if small {
                size.xsize_div8 = Some(U32::BitsOffset { n: 5, off: 1 }.read(br)?);
            } else {
                size.xsize = Some(read_u2s(
                    br,
                    U32::BitsOffset { n: 9, off: 1 },
                    U32::BitsOffset { n: 13, off: 1 },
                    U32::BitsOffset { n: 18, off: 1 },
                    U32::BitsOffset { n: 30, off: 1 },
                )?);
            }
        }
        Ok(size)
    }
}

impl JxlHeader for Preview {
    fn read(br: &mut BitReader) -> Result<Preview> {
        let div8 = read_bool(br)?;
        let small_coder = || {
            [
                U32::Val(16),
                U32::Val(32),
                U32::BitsOffset { n: 5, off: 1 },
                U32::BitsOffset { n: 9, off: 33 },
            ]
        };
        let large_coder = || {
            [
                U32::BitsOffset { n: 6, off: 1 },
                U32::BitsOffset { n: 8, off: 65 },
                U32::BitsOffset { n: 10, off: 321 },
                U32::BitsOffset { n: 12, off: 1345 },
            ]
        };
        let read_dim = |br: &mut BitReader, div8: bool| -> Result<u32> {
            let [d0, d1, d2, d3] = if div8 { small_coder() } else { large_coder() };
            read_u2s(br, d0, d1, d2, d3)
        };
        let mut preview = Preview {
            div8,
            ysize_div8: None,
            ysize: None,
            ratio: AspectRatio::Unknown,
            xsize_div8: None,
            xsize: None,
        };
        if div8 {
            preview.ysize_div8 = Some(read_dim(br, true)?);
        } else {
            preview.ysize = Some(read_dim(br, false)?);
        }
        preview.ratio = AspectRatio::from_bits(br.read(3)? as u32);
        if preview.ratio == AspectRatio::Unknown {
            if div8 {
                preview.xsize_div8 = Some(read_dim(br, true)?);
            } else {
                preview.xsize = Some(read_dim(br, false)?);
            }
        }
        Ok(preview)
    }
}

impl Size {
    pub fn ysize(&self) -> u32 {
        if self.small {
            self.ysize_div8.unwrap() * 8
        } else {
            self.ysize.unwrap()
        }
    }

    pub fn xsize(&self) -> u32 {
        map_aspect_ratio(self.ysize(), self.ratio, /* fallback */ || {
            if self.small {
                self.xsize_div8.unwrap() * 8
            } else {
                self.xsize.unwrap()
            }
        })
    }
}

impl Preview {
    pub fn ysize(&self) -> u32 {
        if self.div8 {
            self.ysize_div8.unwrap() * 8
        } else {
            self.ysize.unwrap()
        }
    }

    pub fn xsize(&self) -> u32 {
        map_aspect_ratio(self.ysize(), self.ratio, /* fallback */ || {
            if self.div8 {
                self.xsize_div8.unwrap() * 8
            } else {
                self.xsize.unwrap()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::BitWriter;

    #[test]
    fn small_size() {
        let mut w = BitWriter::new();
        w.write_bool(true); // small
        w.write(5, 64 / 8 - 1);
        w.write(3, 0); // explicit xsize
        w.write(5, 48 / 8 - 1);
        let data = w.finish();
        let size = Size::read(&mut BitReader::new(&data)).unwrap();
        assert_eq!(size.ysize(), 64);
        assert_eq!(size.xsize(), 48);
    }

    #[test]
    fn large_size_with_ratio() {
        let mut w = BitWriter::new();
        w.write_bool(false); // not small
        w.write(2, 1); // selector: Bits(13) + 1
        w.write(13, 719);
        w.write(3, 5); // 16:9
        let data = w.finish();
        let size = Size::read(&mut BitReader::new(&data)).unwrap();
        assert_eq!(size.ysize(), 720);
        assert_eq!(size.xsize(), 1280);
    }

    #[test]
    fn ratio_overflow_saturates() {
        assert_eq!(
            map_aspect_ratio(u32::MAX, AspectRatio::Ratio2Over1, || 0),
            u32::MAX
        );
        assert_eq!(map_aspect_ratio(1000, AspectRatio::Ratio2Over1, || 0), 2000);
        assert_eq!(map_aspect_ratio(1000, AspectRatio::Unknown, || 500), 500);
    }
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};

/// A single plane of f32 samples in scanline order.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    xsize: usize,
    ysize: usize,
    data: Vec<f32>,
}

impl Image {
    pub fn new(xsize: usize, ysize: usize) -> Result<Image> {
        let total = xsize.checked_mul(ysize).ok_or(Error::ArithmeticOverflow)?;
        let mut data = Vec::new();
        data.try_reserve(total)?;
        data.resize(total, 0.0);
        Ok(Image { xsize, ysize, data })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.xsize, self.ysize)
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.xsize..(y + 1) * self.xsize]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.xsize..(y + 1) * self.xsize]
    }

    /// Swaps scanline `y` with scanline `ysize - 1 - y` for the whole
    /// plane; PFM files store their scanlines bottom-up.
    pub fn flip_vertical(&mut self) {
        for y in 0..self.ysize / 2 {
            let (top, bottom) = self.data.split_at_mut((self.ysize - 1 - y) * self.xsize);
            top[y * self.xsize..(y + 1) * self.xsize].swap_with_slice(&mut bottom[..self.xsize]);
        }
    }
}

/// Marks whether the bundle's planes are plain color or a YCbCr triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTransform {
    #[default]
    None,
    YCbCr,
}

/// Chroma subsampling of a YCbCr bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaSubsampling {
    #[default]
    C444,
    C422,
    C420,
}

impl ChromaSubsampling {
    /// Per-plane (hshift, vshift) with the Y4M plane order: Cb, Y, Cr.
    pub fn shifts(&self) -> [(u32, u32); 3] {
        match self {
            ChromaSubsampling::C444 => [(0, 0), (0, 0), (0, 0)],
            ChromaSubsampling::C422 => [(1, 0), (0, 0), (1, 0)],
            ChromaSubsampling::C420 => [(1, 1), (0, 0), (1, 1)],
        }
    }
}

/// A decoded frame: one or three color planes plus any extra channels, all
/// f32. Planes may have different sizes when chroma is subsampled.
#[derive(Debug, Clone)]
pub struct ImageBundle {
    pub color: Vec<Image>,
    pub extra: Vec<Image>,
    pub color_transform: ColorTransform,
    pub chroma_subsampling: ChromaSubsampling,
    xsize: usize,
    ysize: usize,
}

impl ImageBundle {
    pub fn new(xsize: usize, ysize: usize, color_channels: usize) -> Result<ImageBundle> {
        let mut color = Vec::with_capacity(color_channels);
        for _ in 0..color_channels {
            color.push(Image::new(xsize, ysize)?);
        }
        Ok(ImageBundle {
            color,
            extra: Vec::new(),
            color_transform: ColorTransform::None,
            chroma_subsampling: ChromaSubsampling::C444,
            xsize,
            ysize,
        })
    }

    pub fn xsize(&self) -> usize {
        self.xsize
    }

    pub fn ysize(&self) -> usize {
        self.ysize
    }

    pub fn is_gray(&self) -> bool {
        self.color.len() == 1
    }

    pub fn has_alpha(&self) -> bool {
        !self.extra.is_empty()
    }
}

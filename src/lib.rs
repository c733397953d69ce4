// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Streaming front-end for a JPEG XL decoder: signature and container
//! parsing, codestream header reading, and the per-frame stage machine
//! that feeds an inner frame decoder, plus a PNM/PFM/Y4M codec sharing
//! the same header-parsing discipline.

pub mod api;
pub mod bit_reader;
pub mod error;
pub mod extras;
pub mod frame;
pub mod headers;
pub mod icc;
pub mod image;
mod util;

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! External codecs that share the front-end's header-parsing discipline.

pub mod pnm;

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#[cfg(feature = "tracing")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop {
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {{}};
    }
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {{}};
    }
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {{}};
    }
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {{}};
    }
    #[macro_export]
    macro_rules! warn_ {
        ($($arg:tt)*) => {{}};
    }
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, error, info, trace, warn_ as warn};

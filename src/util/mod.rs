// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod tracing_wrappers;

#[cfg(test)]
pub mod test;

/// `ceil(log2(x))` for nonzero `x`.
pub fn ceil_log2_nonzero(x: u64) -> u32 {
    debug_assert!(x != 0);
    64 - x.leading_zeros() - if x.is_power_of_two() { 1 } else { 0 }
}

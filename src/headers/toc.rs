// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::*;

/// Per-frame table of contents: the byte size of every independently
/// decodable section, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct Toc {
    pub entries: Vec<u32>,
}

impl Toc {
    /// Reads `num_entries` sizes and realigns to a byte boundary. Permuted
    /// tables need the entropy-coded permutation decoder, which belongs to
    /// the inner decoder, so they are rejected here.
    pub fn read(br: &mut BitReader, num_entries: usize) -> Result<Toc> {
        let permuted = read_bool(br)?;
        if permuted {
            return Err(Error::PermutedTocUnsupported);
        }
        let mut entries = Vec::new();
        entries.try_reserve(num_entries)?;
        for _ in 0..num_entries {
            entries.push(read_u2s(
                br,
                U32::Bits(10),
                U32::BitsOffset { n: 14, off: 1024 },
                U32::BitsOffset { n: 22, off: 17408 },
                U32::BitsOffset {
                    n: 30,
                    off: 4211712,
                },
            )?);
        }
        br.jump_to_byte_boundary()?;
        Ok(Toc { entries })
    }

    /// Cumulative byte offsets of each section, relative to the first
    /// section byte.
    pub fn offsets(&self) -> Result<Vec<usize>> {
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut pos: usize = 0;
        for entry in &self.entries {
            offsets.push(pos);
            pos = pos
                .checked_add(*entry as usize)
                .ok_or(Error::TocSizeOverflow)?;
        }
        Ok(offsets)
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.entries.iter().map(|e| *e as usize).collect()
    }

    /// Total byte size of all sections.
    pub fn total_size(&self) -> Result<usize> {
        self.entries
            .iter()
            .try_fold(0usize, |acc, e| acc.checked_add(*e as usize))
            .ok_or(Error::TocSizeOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::BitWriter;

    #[test]
    fn entries_and_offsets() {
        let mut w = BitWriter::new();
        w.write_bool(false);
        for size in [100u32, 2000, 30] {
            w.write_u2s(
                [
                    U32::Bits(10),
                    U32::BitsOffset { n: 14, off: 1024 },
                    U32::BitsOffset { n: 22, off: 17408 },
                    U32::BitsOffset {
                        n: 30,
                        off: 4211712,
                    },
                ],
                size,
            );
        }
        w.zero_pad_to_byte();
        let data = w.finish();
        let mut br = BitReader::new(&data);
        let toc = Toc::read(&mut br, 3).unwrap();
        assert_eq!(toc.entries, vec![100, 2000, 30]);
        assert_eq!(toc.offsets().unwrap(), vec![0, 100, 2100]);
        assert_eq!(toc.total_size().unwrap(), 2130);
        assert_eq!(br.total_bits_read() % 8, 0);
    }

    #[test]
    fn permuted_rejected() {
        let mut w = BitWriter::new();
        w.write_bool(true);
        let data = w.finish();
        assert_eq!(
            Toc::read(&mut BitReader::new(&data), 1),
            Err(Error::PermutedTocUnsupported)
        );
    }
}

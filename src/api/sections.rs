// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Maps the bytes received so far onto the frame's independently decodable
//! sections, handing each section to the inner decoder exactly once and
//! only when it is completely present.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::frame::{SectionInfo, SectionStatus};

#[derive(Debug)]
pub struct Sections {
    /// Offset of the first section byte within the frame (frame header and
    /// TOC sizes summed).
    sections_begin: usize,
    offsets: Vec<usize>,
    sizes: Vec<usize>,
    section_received: Vec<bool>,
    received: usize,
}

impl Sections {
    /// Validates the section layout against the frame size: every section
    /// must fit inside the frame.
    pub fn new(
        offsets: Vec<usize>,
        sizes: Vec<usize>,
        frame_size: usize,
        sections_begin: usize,
    ) -> Result<Sections> {
        assert_eq!(offsets.len(), sizes.len());
        for (i, (offset, size)) in offsets.iter().zip(&sizes).enumerate() {
            let end = sections_begin
                .checked_add(*offset)
                .and_then(|v| v.checked_add(*size))
                .ok_or(Error::SectionOutOfBounds(i))?;
            if end > frame_size {
                return Err(Error::SectionOutOfBounds(i));
            }
        }
        let num = offsets.len();
        Ok(Sections {
            sections_begin,
            offsets,
            sizes,
            section_received: vec![false; num],
            received: 0,
        })
    }

    pub fn num_sections(&self) -> usize {
        self.section_received.len()
    }

    pub fn num_received(&self) -> usize {
        self.received
    }

    pub fn all_received(&self) -> bool {
        self.received == self.num_sections()
    }

    /// `frame` is the window starting at the first byte of the frame;
    /// returns a bit reader over each section that is now fully present
    /// and has not been handed out before.
    pub fn gather<'a>(&mut self, frame: &'a [u8]) -> Vec<SectionInfo<'a>> {
        let mut batch = Vec::new();
        for i in 0..self.section_received.len() {
            if self.section_received[i] {
                continue;
            }
            let begin = self.sections_begin + self.offsets[i];
            let end = begin + self.sizes[i];
            if end <= frame.len() {
                self.section_received[i] = true;
                self.received += 1;
                batch.push(SectionInfo {
                    id: i,
                    br: BitReader::new(&frame[begin..end]),
                });
            }
        }
        batch
    }

    /// Lower bound on the bytes still missing before the next unreceived
    /// section completes, given the current window length.
    pub fn missing_hint(&self, available: usize) -> usize {
        self.section_received
            .iter()
            .enumerate()
            .filter(|(_, received)| !**received)
            .map(|(i, _)| {
                let end = self.sections_begin + self.offsets[i] + self.sizes[i];
                end.saturating_sub(available)
            })
            .filter(|missing| *missing > 0)
            .min()
            .unwrap_or(1)
    }

    /// Closes a processed batch: a reader that went out of bounds read past
    /// the end of a complete section, which is corruption, not shortage.
    pub fn close(sections: &[SectionInfo<'_>], status: &[SectionStatus]) -> Result<()> {
        debug_assert_eq!(sections.len(), status.len());
        if sections.iter().any(|s| !s.br.all_reads_within_bounds()) {
            return Err(Error::SectionTooShort);
        }
        Ok(())
    }
}

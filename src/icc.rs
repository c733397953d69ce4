// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Incremental reader for the embedded ICC payload. The front-end only has
//! to carry the profile bytes to the caller; interpreting them is the color
//! management collaborator's job.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::read_u64;

/// Hard cap on the ICC payload, matching the recommended decoder limit.
pub const MAX_ICC_SIZE: u64 = 1 << 28;

/// Reads the variable-length ICC stream across multiple `process_input`
/// calls. Each call gets a bit reader positioned at the start of the ICC
/// stream; the reader skips what it already consumed and continues.
#[derive(Debug, Default)]
pub struct IccReader {
    bits_consumed: usize,
    len: Option<u64>,
    data: Vec<u8>,
}

impl IccReader {
    pub fn new() -> IccReader {
        IccReader::default()
    }

    pub fn reset(&mut self) {
        *self = IccReader::default();
    }

    /// Continues reading. Returns `OutOfBounds` when the window ends before
    /// the payload does; re-invoking with a longer window resumes.
    pub fn process(&mut self, br: &mut BitReader, max_size: Option<u64>) -> Result<()> {
        br.skip_bits(self.bits_consumed)?;
        if self.len.is_none() {
            let start = br.total_bits_read();
            let len = read_u64(br)?;
            let cap = max_size.unwrap_or(MAX_ICC_SIZE).min(MAX_ICC_SIZE);
            if len > cap {
                return Err(Error::IccTooLarge(len));
            }
            self.bits_consumed += br.total_bits_read() - start;
            self.data.try_reserve(len as usize)?;
            self.len = Some(len);
        }
        let len = self.len.unwrap() as usize;
        while self.data.len() < len {
            match br.read(8) {
                Ok(byte) => {
                    self.data.push(byte as u8);
                    self.bits_consumed += 8;
                }
                Err(Error::OutOfBounds(_)) => {
                    return Err(Error::OutOfBounds(len - self.data.len()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Bits of the codestream this reader has consumed so far.
    pub fn total_bits(&self) -> usize {
        self.bits_consumed
    }

    pub fn is_done(&self) -> bool {
        self.len.is_some_and(|len| self.data.len() == len as usize)
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::BitWriter;

    fn icc_stream(payload: &[u8]) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_u64(payload.len() as u64);
        for b in payload {
            w.write(8, *b as u64);
        }
        w.finish()
    }

    #[test]
    fn one_shot() {
        let payload: Vec<u8> = (0..100).collect();
        let data = icc_stream(&payload);
        let mut reader = IccReader::new();
        reader.process(&mut BitReader::new(&data), None).unwrap();
        assert!(reader.is_done());
        assert_eq!(reader.take(), payload);
    }

    #[test]
    fn incremental() {
        let payload: Vec<u8> = (0..100).collect();
        let data = icc_stream(&payload);
        let mut reader = IccReader::new();
        for end in 0..data.len() {
            let err = reader
                .process(&mut BitReader::new(&data[..end]), None)
                .unwrap_err();
            assert!(err.is_transient(), "at {end}: {err:?}");
        }
        reader.process(&mut BitReader::new(&data), None).unwrap();
        assert_eq!(reader.take(), payload);
    }

    #[test]
    fn oversized_rejected() {
        let mut w = BitWriter::new();
        w.write_u64(MAX_ICC_SIZE + 1);
        let data = w.finish();
        let mut reader = IccReader::new();
        assert_eq!(
            reader.process(&mut BitReader::new(&data), None),
            Err(Error::IccTooLarge(MAX_ICC_SIZE + 1))
        );
    }
}

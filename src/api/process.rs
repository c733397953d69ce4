// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The outermost driver: signature detection, the container box walk, and
//! the one-shot / streaming duality. Box format:
//! `[4B BE size][4B type][if size==1: 8B BE extended size][payload]`, where
//! size 0 means "to end of file" and is only legal for the final box.

use crate::api::decoder::{Decoder, Stage, INITIAL_BASIC_INFO_SIZE_HINT};
use crate::api::signature::{check_signature, Signature};
use crate::api::{events, Event};
use crate::error::{Error, Result};
use crate::util::tracing_wrappers::*;

/// True when `a + b > size`, counting overflow as out of bounds.
fn out_of_bounds(a: usize, b: usize, size: usize) -> bool {
    match a.checked_add(b) {
        Some(pos) => pos > size,
        None => true,
    }
}

fn sum_overflows(a: usize, b: usize, c: u64) -> bool {
    let Some(ab) = a.checked_add(b) else {
        return true;
    };
    let Ok(c) = usize::try_from(c) else {
        return true;
    };
    ab.checked_add(c).is_none()
}

impl<'data> Decoder<'data> {
    /// Runs the decoder on the held input until the next event. Returning
    /// [`Event::NeedMoreInput`] (or a need-buffer event) suspends; the
    /// caller supplies what is missing and re-invokes. Format violations
    /// return [`Event::Error`] and taint the decoder until [`Decoder::reset`].
    pub fn process_input(&mut self) -> Event {
        if self.stage == Stage::Inited {
            self.stage = Stage::Started;
        }
        if self.stage == Stage::Error {
            return Event::Error(Error::DecoderTainted);
        }
        if self.stage == Stage::Finished {
            return Event::Error(Error::DecoderFinished);
        }
        match self.process_input_inner() {
            Ok(event) => event,
            // A shortage that escapes here was detected at the edge of the
            // window still being filled.
            Err(e) if e.is_transient() => Event::NeedMoreInput,
            Err(e) => {
                self.stage = Stage::Error;
                Event::Error(e)
            }
        }
    }

    fn consume_input(&mut self, count: usize) {
        self.input = &self.input[count..];
        self.file_pos += count;
    }

    fn process_input_inner(&mut self) -> Result<Event> {
        if !self.got_signature {
            let mut pos = 0;
            match check_signature(self.input, &mut pos) {
                Signature::NotEnoughBytes => return Ok(Event::NeedMoreInput),
                Signature::Invalid => {
                    let b0 = self.input.first().copied().unwrap_or(0);
                    let b1 = self.input.get(1).copied().unwrap_or(0);
                    return Err(Error::InvalidSignature(b0, b1));
                }
                Signature::Codestream => {
                    self.got_signature = true;
                }
                Signature::Container => {
                    self.got_signature = true;
                    self.have_container = true;
                }
            }
        }

        if self.have_container {
            if let Some(event) = self.process_container()? {
                return Ok(event);
            }
        }

        // Size of the available codestream, excluding boxes behind it.
        let mut csize = self.input.len();
        if self.have_container && self.codestream_end != 0 {
            csize = csize.min(self.codestream_end.saturating_sub(self.file_pos));
        }

        // One-shot as long as nothing was ever copied to the codestream
        // buffer; the first shortage after basic-info switches to
        // streaming so the caller can release its data.
        let detected_streaming = !self.codestream.is_empty();
        if detected_streaming {
            let input = self.input;
            self.codestream.extend_from_slice(&input[..csize]);
            self.consume_input(csize);
            let codestream = std::mem::take(&mut self.codestream);
            let result = self.process_codestream(&codestream);
            self.codestream = codestream;
            result
        } else {
            let input = self.input;
            let result = self.process_codestream(&input[..csize]);
            if self.got_basic_info && matches!(result, Ok(Event::NeedMoreInput)) {
                self.codestream.extend_from_slice(&input[..csize]);
                self.consume_input(csize);
            }
            result
        }
    }

    /// Walks container boxes until the read position is inside codestream
    /// data. `Some(event)` suspends the walk; `None` falls through to
    /// codestream processing.
    fn process_container(&mut self) -> Result<Option<Event>> {
        if self.skip_box {
            // Amount of remaining bytes in the box that is being skipped.
            let remaining = self.box_end - self.file_pos;
            if self.input.len() < remaining {
                let available = self.input.len();
                self.consume_input(available);
                return Ok(Some(Event::NeedMoreInput));
            }
            self.consume_input(remaining);
            self.skip_box = false;
        }

        if self.first_codestream_seen
            && !self.last_codestream_seen
            && self.codestream_end != 0
            && self.file_pos < self.codestream_end
            && self.file_pos + self.input.len() >= self.codestream_end
            && !self.codestream.is_empty()
        {
            // We are inside a codestream box whose end lies within the held
            // window, and further codestream boxes may follow. Splice the
            // remainder into the buffer so the box walk below triggers.
            let csize = (self.codestream_end - self.file_pos).min(self.input.len());
            let input = self.input;
            self.codestream.extend_from_slice(&input[..csize]);
            self.consume_input(csize);
        }

        if self.jbrd.parsing {
            if let Some(event) = self.process_jbrd()? {
                return Ok(Some(event));
            }
        }

        if !self.last_codestream_seen
            && (self.codestream_begin == 0
                || (self.codestream_end != 0 && self.file_pos >= self.codestream_end))
        {
            // After this loop, either the read position is inside
            // codestream data or we have returned needing more input.
            let mut pos: usize = 0;
            loop {
                let size = self.input.len();
                if size == pos {
                    // Exactly after a full box; the codestream handling
                    // below decides whether more input is needed.
                    break;
                }
                if out_of_bounds(pos, 8, size) {
                    self.basic_info_size_hint =
                        INITIAL_BASIC_INFO_SIZE_HINT + pos + 8 - size;
                    return Ok(Some(Event::NeedMoreInput));
                }
                let box_start = pos;
                let input = self.input;
                // Box size, including the header itself.
                let mut box_size =
                    u32::from_be_bytes(input[pos..pos + 4].try_into().unwrap()) as u64;
                let box_type: [u8; 4] = input[pos + 4..pos + 8].try_into().unwrap();
                pos += 8;
                if box_size == 1 {
                    if out_of_bounds(pos, 8, size) {
                        return Ok(Some(Event::NeedMoreInput));
                    }
                    box_size = u64::from_be_bytes(input[pos..pos + 8].try_into().unwrap());
                    pos += 8;
                }
                let header_size = pos - box_start;
                if box_size > 0 && box_size < header_size as u64 {
                    return Err(Error::InvalidBox);
                }
                if sum_overflows(self.file_pos, pos, box_size) {
                    return Err(Error::BoxSizeOverflow);
                }
                let contents_size = if box_size == 0 {
                    0
                } else {
                    (box_size as usize) - header_size
                };

                self.box_begin = self.file_pos + box_start;
                self.box_end = self.file_pos + box_start + box_size as usize;
                trace!(
                    "box {:?} at {}, size {}",
                    std::str::from_utf8(&box_type).unwrap_or("????"),
                    self.box_begin,
                    box_size
                );

                if box_type == *b"jxlc" || box_type == *b"jxlp" {
                    let mut codestream_size = contents_size;
                    // The codestream is either one jxlc box or a series of
                    // jxlp boxes whose final member sets the high bit of
                    // its index.
                    let last_codestream = if box_type == *b"jxlp" {
                        if out_of_bounds(pos, 4, size) {
                            return Ok(Some(Event::NeedMoreInput));
                        }
                        if box_size != 0 && contents_size < 4 {
                            return Err(Error::JxlpBoxTooSmall);
                        }
                        codestream_size = codestream_size.saturating_sub(4);
                        let input = self.input;
                        let jxlp_index =
                            u32::from_be_bytes(input[pos..pos + 4].try_into().unwrap());
                        pos += 4;
                        let index = jxlp_index & 0x7fff_ffff;
                        if index != self.next_jxlp_index {
                            return Err(Error::JxlpIndexOutOfOrder(
                                index,
                                self.next_jxlp_index,
                            ));
                        }
                        self.next_jxlp_index += 1;
                        jxlp_index & 0x8000_0000 != 0
                    } else {
                        true
                    };
                    if !last_codestream && box_size == 0 {
                        return Err(Error::UnboundedIntermediateBox);
                    }
                    self.first_codestream_seen = true;
                    if last_codestream {
                        self.last_codestream_seen = true;
                    }
                    if self.codestream_begin != 0 && self.codestream.is_empty() {
                        // A second codestream part in one-shot mode: the
                        // stream spans multiple boxes, so the earlier part
                        // has to be copied out to stay contiguous.
                        if self.codestream_begin < self.file_pos {
                            return Err(Error::InvalidBox);
                        }
                        let begin = self.codestream_begin - self.file_pos;
                        let end = self.codestream_end - self.file_pos;
                        debug_assert!(end <= self.input.len());
                        let input = self.input;
                        self.codestream.extend_from_slice(&input[begin..end]);
                    }
                    self.codestream_begin = self.file_pos + pos;
                    self.codestream_end = if box_size == 0 {
                        0
                    } else {
                        self.codestream_begin + codestream_size
                    };
                    let avail_codestream_size = if box_size == 0 {
                        size - pos
                    } else {
                        (size - pos).min(box_size as usize + box_start - pos)
                    };
                    if !self.codestream.is_empty() {
                        // Already streaming: append what is available.
                        let begin = pos;
                        let end = size.min(begin + avail_codestream_size);
                        let input = self.input;
                        self.codestream.extend_from_slice(&input[begin..end]);
                        pos += end - begin;
                        self.consume_input(pos);
                        pos = 0;
                        if self.input.is_empty() {
                            break;
                        }
                    } else {
                        // Skip only the header, so the input now points at
                        // this codestream part for the one-shot case.
                        self.consume_input(pos);
                        pos = 0;
                        if avail_codestream_size == self.input.len() {
                            // The rest is codestream, this loop is done.
                            break;
                        }
                        pos += avail_codestream_size;
                    }
                } else if box_type == *b"jbrd"
                    && self.orig_events_wanted & events::JPEG_RECONSTRUCTION != 0
                {
                    if box_size == 0 {
                        return Err(Error::InvalidJbrdBox);
                    }
                    self.consume_input(pos);
                    pos = 0;
                    self.jbrd.start(contents_size);
                    if let Some(event) = self.process_jbrd()? {
                        return Ok(Some(event));
                    }
                } else {
                    if box_size == 0 {
                        // Final box with unknown size, but not a
                        // codestream box: nothing more to parse.
                        if !self.first_codestream_seen {
                            return Err(Error::NoCodestreamBox);
                        }
                        break;
                    }
                    if out_of_bounds(pos, contents_size, size) {
                        self.skip_box = true;
                        self.consume_input(pos);
                        self.basic_info_size_hint =
                            INITIAL_BASIC_INFO_SIZE_HINT + contents_size;
                        return Ok(Some(Event::NeedMoreInput));
                    }
                    pos += contents_size;
                    if !(self.codestream.is_empty() && self.first_codestream_seen) {
                        // The box is no longer needed, release it so the
                        // caller can free the memory.
                        self.consume_input(pos);
                        pos = 0;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Accumulates the in-progress jbrd box. JPEG bytestream emission is a
    /// collaborator's job; the front-end carries the payload.
    fn process_jbrd(&mut self) -> Result<Option<Event>> {
        let take = self.jbrd.remaining.min(self.input.len());
        let input = self.input;
        self.jbrd.data.extend_from_slice(&input[..take]);
        self.jbrd.remaining -= take;
        self.consume_input(take);
        if self.jbrd.remaining > 0 {
            return Ok(Some(Event::NeedMoreInput));
        }
        self.jbrd.parsing = false;
        if self.jbrd.data.is_empty() {
            return Err(Error::InvalidJbrdBox);
        }
        self.jbrd_data = Some(std::mem::take(&mut self.jbrd.data));
        debug!("jbrd box complete, {} bytes", self.jbrd_data.as_ref().unwrap().len());
        if self.events_wanted & events::JPEG_RECONSTRUCTION != 0 {
            self.events_wanted &= !events::JPEG_RECONSTRUCTION;
            return Ok(Some(Event::JpegReconstruction));
        }
        Ok(None)
    }
}

/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::byte_stream::{ByteStream, Stream};

/// Byte stream stored as a chain of segments, each at most 255 data bytes
/// prefixed by a length byte, terminated by a zero-length segment. This is
/// the layout GIF image blocks use.
///
/// Random access (`advance`, `retreat`, `peek`) is not supported; those
/// calls are no-ops that read as 0.
pub struct SegmentedStream<'a> {
    inner: ByteStream<'a>,
    /// Writer: bytes in the open segment. Reader: bytes left in it.
    seg_len: usize,
}

impl<'a> SegmentedStream<'a> {
    /// Growable output stream. The first 255-byte segment is opened
    /// immediately; `flush` patches its true length.
    pub fn writer(initial: usize, increment: usize) -> Self {
        let mut inner = ByteStream::writer(initial, increment);
        inner.buf.to_mut()[0] = 0xFF;
        inner.bytes_written = 1;

        SegmentedStream { inner, seg_len: 0 }
    }

    /// Fixed-capacity output stream.
    pub fn fixed(capacity: usize) -> Self {
        let mut inner = ByteStream::fixed(capacity);
        if !inner.eos {
            inner.buf.to_mut()[0] = 0xFF;
            inner.bytes_written = 1;
        }

        SegmentedStream { inner, seg_len: 0 }
    }

    /// Input stream over an existing segment chain.
    pub fn reader(data: &'a [u8]) -> Self {
        let mut inner = ByteStream::reader(data);
        let mut seg_len = 0;

        if data.len() <= 1 {
            inner.bytes_read = data.len();
            inner.eos = true;
        } else {
            seg_len = data[0] as usize;
            inner.bytes_read = 1;
            if seg_len == 0 {
                inner.eos = true;
            }
        }

        SegmentedStream { inner, seg_len }
    }

    pub fn written(&self) -> &[u8] {
        self.inner.written()
    }

    pub fn take_buffer(self) -> Vec<u8> {
        self.inner.take_buffer()
    }
}

impl<'a> Stream for SegmentedStream<'a> {
    fn eos(&self) -> bool {
        self.inner.eos
    }

    fn next(&mut self) -> u8 {
        if self.inner.eos {
            return 0;
        }

        // Segment exhausted: pull the next length byte.
        if self.seg_len == 0 {
            if self.inner.bytes_read >= self.inner.buf.len() {
                self.inner.eos = true;
                return 0;
            }
            self.seg_len = self.inner.buf[self.inner.bytes_read] as usize;
            self.inner.bytes_read += 1;
            if self.seg_len == 0 {
                self.inner.eos = true;
                return 0;
            }
            if self.inner.bytes_read == self.inner.buf.len() {
                self.inner.eos = true;
                return 0;
            }
        }

        self.inner.bytes_read += 1;
        self.seg_len -= 1;
        if self.inner.bytes_read == self.inner.buf.len() {
            self.inner.eos = true;
        }
        // A zero length byte up next means the chain is complete.
        if self.seg_len == 0
            && self.inner.bytes_read < self.inner.buf.len()
            && self.inner.buf[self.inner.bytes_read] == 0
        {
            self.inner.eos = true;
        }

        self.inner.buf[self.inner.bytes_read - 1]
    }

    fn put(&mut self, byte: u8) {
        if self.inner.eos {
            return;
        }

        self.inner.bytes_written += 1;
        if self.inner.bytes_written == self.inner.buf.len() {
            self.inner.grow_or_latch();
        }

        let at = self.inner.bytes_written - 1;
        self.inner.buf.to_mut()[at] = byte;
        self.seg_len += 1;

        // Full segment: open the next 255-byte segment.
        if self.seg_len == 255 {
            if self.inner.bytes_written + 2 >= self.inner.buf.len() {
                if self.inner.increment != 0 {
                    self.inner.grow_or_latch();
                } else {
                    self.inner.eos = true;
                    let term = self.inner.bytes_written;
                    if term < self.inner.buf.len() {
                        self.inner.buf.to_mut()[term] = 0x00;
                        self.inner.bytes_written += 1;
                    }
                    return;
                }
            }
            let at = self.inner.bytes_written;
            self.inner.buf.to_mut()[at] = 0xFF;
            self.inner.bytes_written += 1;
            self.seg_len = 0;
        }
    }

    /// Patches the open segment's length byte and appends the terminating
    /// zero-length segment.
    fn flush(&mut self) {
        if self.inner.bytes_written < self.seg_len + 1 {
            return;
        }

        let last_len = self.inner.bytes_written - (self.seg_len + 1);
        self.inner.buf.to_mut()[last_len] = self.seg_len as u8;

        if self.seg_len > 0 {
            if self.inner.bytes_written == self.inner.buf.len() {
                self.inner.grow_or_latch();
            }
            let term = self.inner.bytes_written;
            if term < self.inner.buf.len() {
                self.inner.buf.to_mut()[term] = 0x00;
                self.inner.bytes_written += 1;
            }
        }
    }

    fn bytes_read(&self) -> usize {
        self.inner.bytes_read
    }

    fn bytes_written(&self) -> usize {
        self.inner.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payload_is_one_patched_segment() {
        let mut ss = SegmentedStream::writer(256, 256);
        for b in b"hello" {
            ss.put(*b);
        }
        ss.flush();

        assert_eq!(ss.written(), b"\x05hello\x00");
    }

    #[test]
    fn long_payload_crosses_segment_boundary() {
        let payload: Vec<u8> = (0..600u32).map(|i| i as u8).collect();

        let mut ss = SegmentedStream::writer(256, 256);
        for b in &payload {
            ss.put(*b);
        }
        ss.flush();
        let encoded = ss.take_buffer();

        // Parse the [len][bytes]...[0] chain by hand.
        let mut recovered = Vec::new();
        let mut at = 0;
        loop {
            let len = encoded[at] as usize;
            at += 1;
            if len == 0 {
                break;
            }
            recovered.extend_from_slice(&encoded[at..at + len]);
            at += len;
        }

        assert_eq!(at, encoded.len());
        assert_eq!(recovered, payload);
    }

    #[test]
    fn reader_round_trips_writer_output() {
        let payload: Vec<u8> = (0..600u32).map(|i| (i * 7) as u8).collect();

        let mut ss = SegmentedStream::writer(256, 256);
        for b in &payload {
            ss.put(*b);
        }
        ss.flush();
        let encoded = ss.take_buffer();

        let mut reader = SegmentedStream::reader(&encoded);
        let mut recovered = Vec::new();
        while !reader.eos() {
            recovered.push(reader.next());
        }

        assert_eq!(recovered, payload);
    }

    #[test]
    fn zero_length_chain_reads_as_empty() {
        let mut reader = SegmentedStream::reader(&[0x00]);
        assert!(reader.eos());
        assert_eq!(reader.next(), 0);
    }

    #[test]
    fn random_access_is_unsupported() {
        let data = b"\x02ab\x00";
        let mut reader = SegmentedStream::reader(data);

        assert_eq!(reader.peek(0), 0);
        reader.advance(1);
        assert_eq!(reader.next(), b'a');
    }
}

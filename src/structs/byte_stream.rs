/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::borrow::Cow;

/// Minimum sizes applied to writable buffers so that tiny requests do not
/// thrash the allocator.
const MIN_ALLOC: usize = 256;

/// Serial byte-stream view over an in-memory buffer.
///
/// All operations are total: failures only ever latch the end-of-stream
/// flag and degrade to returning zero bytes or dropping writes, they never
/// panic on the data path. The storage variants (`SegmentedStream`,
/// `StuffedStream`) and the bit-stream layers all speak this trait.
pub trait Stream {
    /// True once the stream has been fully consumed (reader) or filled
    /// beyond its fixed capacity (writer).
    fn eos(&self) -> bool;

    /// Returns the next byte and advances, or 0 once the stream is done.
    fn next(&mut self) -> u8;

    /// Appends a byte. On a full non-growable buffer the byte is dropped
    /// and eos is latched.
    fn put(&mut self, byte: u8);

    /// Moves the read cursor forward. Unsupported variants ignore it.
    fn advance(&mut self, _distance: usize) {}

    /// Moves the read cursor backward and clears eos. Unsupported variants
    /// ignore it.
    fn retreat(&mut self, _distance: usize) {}

    /// Byte at `offset` past the read cursor without consuming, 0 past the
    /// end. Unsupported variants always return 0.
    fn peek(&self, _offset: usize) -> u8 {
        0
    }

    /// Post-write fix-ups (segment termination and the like).
    fn flush(&mut self) {}

    fn bytes_read(&self) -> usize;

    fn bytes_written(&self) -> usize;

    /// Unread bytes left in the stream.
    fn remainder(&self) -> usize {
        0
    }

    /// The unread tail of the buffer. Empty on variants without random
    /// access.
    fn chunk(&self) -> &[u8] {
        &[]
    }

    /// Up to `desired` already-consumed bytes ending at the read cursor,
    /// clamped to the start of the buffer. This is the window a
    /// back-reference search runs over.
    fn pre_read_window(&self, _desired: usize) -> &[u8] {
        &[]
    }

    /// The whole backing buffer, written or not.
    fn buffer(&self) -> &[u8] {
        &[]
    }

    /// Byte at an absolute buffer offset, 0 out of range. Used to replay
    /// back-references out of the already-written output.
    fn byte_at(&self, _offset: usize) -> u8 {
        0
    }
}

/// The plain stream: a flat buffer with independent read and write cursors.
///
/// A stream either owns its buffer (writer constructors) or borrows the
/// caller's (reader constructor); dropping the stream frees only what it
/// owns.
pub struct ByteStream<'a> {
    pub(crate) buf: Cow<'a, [u8]>,
    pub(crate) increment: usize,
    pub(crate) eos: bool,
    pub(crate) bytes_read: usize,
    pub(crate) bytes_written: usize,
}

impl<'a> ByteStream<'a> {
    /// A stream with no backing buffer; eos from the start.
    pub fn new() -> Self {
        ByteStream {
            buf: Cow::Owned(Vec::new()),
            increment: 0,
            eos: true,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Growable output stream owning its buffer.
    pub fn writer(initial: usize, increment: usize) -> Self {
        let initial = initial.max(MIN_ALLOC);
        let increment = if increment == 0 {
            0
        } else {
            increment.max(MIN_ALLOC)
        };

        ByteStream {
            buf: Cow::Owned(vec![0; initial]),
            increment,
            eos: false,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Fixed-capacity output stream; overruns drop bytes and latch eos.
    pub fn fixed(capacity: usize) -> Self {
        ByteStream {
            buf: Cow::Owned(vec![0; capacity]),
            increment: 0,
            eos: capacity == 0,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Input stream over a caller-owned buffer.
    pub fn reader(data: &'a [u8]) -> Self {
        ByteStream {
            buf: Cow::Borrowed(data),
            increment: 0,
            eos: data.is_empty(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// The written prefix of the buffer.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.bytes_written]
    }

    /// Transfers the written bytes out of the stream.
    pub fn take_buffer(self) -> Vec<u8> {
        let count = self.bytes_written;
        let mut v = self.buf.into_owned();
        v.truncate(count);
        v
    }

    pub(crate) fn grow_or_latch(&mut self) {
        if self.increment != 0 {
            let new_len = self.buf.len() + self.increment;
            self.buf.to_mut().resize(new_len, 0);
        } else {
            self.eos = true;
        }
    }
}

impl<'a> Default for ByteStream<'a> {
    fn default() -> Self {
        ByteStream::new()
    }
}

impl<'a> Stream for ByteStream<'a> {
    fn eos(&self) -> bool {
        self.eos
    }

    fn next(&mut self) -> u8 {
        if self.eos {
            return 0;
        }

        self.bytes_read += 1;
        if self.bytes_read == self.buf.len() {
            self.eos = true;
        }

        self.buf[self.bytes_read - 1]
    }

    fn put(&mut self, byte: u8) {
        if self.eos {
            return;
        }

        self.bytes_written += 1;
        if self.bytes_written == self.buf.len() {
            self.grow_or_latch();
        }

        let at = self.bytes_written - 1;
        self.buf.to_mut()[at] = byte;
    }

    fn advance(&mut self, distance: usize) {
        self.bytes_read += distance;
        if self.bytes_read >= self.buf.len() {
            self.bytes_read = self.buf.len();
            self.eos = true;
        }
    }

    fn retreat(&mut self, distance: usize) {
        self.eos = false;
        self.bytes_read = self.bytes_read.saturating_sub(distance);
    }

    fn peek(&self, offset: usize) -> u8 {
        if self.bytes_read + offset >= self.buf.len() {
            return 0;
        }
        self.buf[self.bytes_read + offset]
    }

    fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    fn remainder(&self) -> usize {
        self.buf.len() - self.bytes_read
    }

    fn chunk(&self) -> &[u8] {
        &self.buf[self.bytes_read..]
    }

    fn pre_read_window(&self, desired: usize) -> &[u8] {
        if desired > self.bytes_read {
            &self.buf[..self.bytes_read]
        } else {
            &self.buf[self.bytes_read - desired..self.bytes_read]
        }
    }

    fn buffer(&self) -> &[u8] {
        &self.buf
    }

    fn byte_at(&self, offset: usize) -> u8 {
        if offset >= self.buf.len() {
            return 0;
        }
        self.buf[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_consumes_and_latches_eos() {
        let data = [1u8, 2, 3];
        let mut bs = ByteStream::reader(&data);

        assert!(!bs.eos());
        assert_eq!(bs.next(), 1);
        assert_eq!(bs.next(), 2);
        assert!(!bs.eos());
        assert_eq!(bs.next(), 3);
        assert!(bs.eos());
        assert_eq!(bs.next(), 0);
        assert_eq!(bs.bytes_read(), 3);
    }

    #[test]
    fn empty_reader_starts_at_eos() {
        let mut bs = ByteStream::reader(&[]);
        assert!(bs.eos());
        assert_eq!(bs.next(), 0);
    }

    #[test]
    fn writer_grows_by_increment() {
        let mut bs = ByteStream::writer(256, 256);
        for i in 0..1000u32 {
            bs.put(i as u8);
        }

        assert!(!bs.eos());
        assert_eq!(bs.bytes_written(), 1000);
        assert_eq!(bs.written()[999], (999u32 % 256) as u8);
    }

    #[test]
    fn fixed_writer_drops_overrun() {
        let mut bs = ByteStream::fixed(4);
        for b in 0..8u8 {
            bs.put(b);
        }

        assert!(bs.eos());
        assert_eq!(bs.written(), &[0, 1, 2, 3]);
    }

    #[test]
    fn advance_retreat_and_peek() {
        let data = [10u8, 11, 12, 13, 14];
        let mut bs = ByteStream::reader(&data);

        bs.advance(2);
        assert_eq!(bs.peek(0), 12);
        assert_eq!(bs.peek(2), 14);
        assert_eq!(bs.peek(3), 0);
        assert_eq!(bs.remainder(), 3);

        bs.advance(10);
        assert!(bs.eos());

        bs.retreat(1);
        assert!(!bs.eos());
        assert_eq!(bs.peek(0), 14);
    }

    #[test]
    fn pre_read_window_clamps_to_start() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut bs = ByteStream::reader(&data);
        bs.advance(4);

        assert_eq!(bs.pre_read_window(2), &[3, 4]);
        assert_eq!(bs.pre_read_window(100), &[1, 2, 3, 4]);
    }

    #[test]
    fn take_buffer_returns_written_prefix() {
        let mut bs = ByteStream::writer(256, 256);
        bs.put(0xAB);
        bs.put(0xCD);

        assert_eq!(bs.take_buffer(), vec![0xAB, 0xCD]);
    }
}

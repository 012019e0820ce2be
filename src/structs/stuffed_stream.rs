/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::byte_stream::{ByteStream, Stream};

/// Byte stream honouring the JPEG byte-stuffing rule: every 0xFF in the
/// stored stream is followed by a 0x00 stuffer, and a 0xFF followed by
/// anything else is a marker that ends the stream. Two-byte restart
/// markers (0xFF then a byte whose top five bits are 11010) are skipped.
///
/// Random access (`advance`, `retreat`, `peek`) is not supported.
pub struct StuffedStream<'a> {
    inner: ByteStream<'a>,
}

impl<'a> StuffedStream<'a> {
    pub fn writer(initial: usize, increment: usize) -> Self {
        StuffedStream {
            inner: ByteStream::writer(initial, increment),
        }
    }

    pub fn fixed(capacity: usize) -> Self {
        StuffedStream {
            inner: ByteStream::fixed(capacity),
        }
    }

    pub fn reader(data: &'a [u8]) -> Self {
        StuffedStream {
            inner: ByteStream::reader(data),
        }
    }

    pub fn written(&self) -> &[u8] {
        self.inner.written()
    }

    pub fn take_buffer(self) -> Vec<u8> {
        self.inner.take_buffer()
    }
}

impl<'a> Stream for StuffedStream<'a> {
    fn eos(&self) -> bool {
        self.inner.eos
    }

    fn next(&mut self) -> u8 {
        if self.inner.eos {
            return 0;
        }

        let len = self.inner.buf.len();

        // Restart markers carry no payload, so a single call may need to
        // step over any number of them before it lands on a data byte.
        loop {
            if self.inner.bytes_read >= len {
                self.inner.eos = true;
                return 0;
            }

            let b = self.inner.buf[self.inner.bytes_read];
            self.inner.bytes_read += 1;

            if b != 0xFF {
                if self.inner.bytes_read == len {
                    self.inner.eos = true;
                }
                return b;
            }

            // 0xFF with no follower is an unterminated marker.
            if self.inner.bytes_read == len {
                self.inner.eos = true;
                return 0;
            }

            let follower = self.inner.buf[self.inner.bytes_read];
            if follower == 0x00 {
                // Stuffed data byte: consume the stuffer with it.
                self.inner.bytes_read += 1;
                if self.inner.bytes_read == len {
                    self.inner.eos = true;
                }
                return 0xFF;
            }
            if (follower & 0xF8) == 0xD0 {
                // Restart marker: skip both bytes and keep going.
                self.inner.bytes_read += 1;
                continue;
            }

            // Any other marker ends the stream.
            self.inner.eos = true;
            return 0;
        }
    }

    fn put(&mut self, byte: u8) {
        self.inner.put(byte);
        if byte == 0xFF {
            self.inner.put(0x00);
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
    fn writer_stuffs_every_ff() {
        let mut ss = StuffedStream::writer(256, 256);
        for b in [0x01u8, 0xFF, 0x02, 0xFF, 0xFF] {
            ss.put(b);
        }

        assert_eq!(
            ss.written(),
            &[0x01, 0xFF, 0x00, 0x02, 0xFF, 0x00, 0xFF, 0x00]
        );
    }

    #[test]
    fn reader_drops_stuffers() {
        let encoded = [0x01u8, 0xFF, 0x00, 0x02, 0xFF, 0x00, 0xFF, 0x00];
        let mut ss = StuffedStream::reader(&encoded);

        let mut out = Vec::new();
        while !ss.eos() {
            out.push(ss.next());
        }

        assert_eq!(out, vec![0x01, 0xFF, 0x02, 0xFF, 0xFF]);
    }

    #[test]
    fn round_trip_through_writer_and_reader() {
        let payload = [0xFFu8, 0xFF, 0x10, 0xFF, 0x20, 0x00, 0xFF];

        let mut w = StuffedStream::writer(256, 256);
        for b in payload {
            w.put(b);
        }
        let encoded = w.take_buffer();

        let mut r = StuffedStream::reader(&encoded);
        let mut out = Vec::new();
        while !r.eos() {
            out.push(r.next());
        }

        assert_eq!(out, payload.to_vec());
    }

    #[test]
    fn marker_latches_eos() {
        let encoded = [0x41u8, 0xFF, 0xD9, 0x42];
        let mut ss = StuffedStream::reader(&encoded);

        assert_eq!(ss.next(), 0x41);
        assert_eq!(ss.next(), 0);
        assert!(ss.eos());
    }

    #[test]
    fn restart_marker_is_skipped() {
        let encoded = [0x41u8, 0xFF, 0xD3, 0x42, 0x43];
        let mut ss = StuffedStream::reader(&encoded);

        assert_eq!(ss.next(), 0x41);
        assert_eq!(ss.next(), 0x42);
        assert_eq!(ss.next(), 0x43);
        assert!(ss.eos());
    }
}

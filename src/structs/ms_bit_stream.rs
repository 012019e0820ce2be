/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::byte_stream::Stream;

// Both directions work through a three-byte shift register so that up to
// 24 bits are always addressable at the current position. Calls above 16
// bits are split into two halves, senior half first in MSB order.

/// Reads variable-length bit strings (up to 32 bits per call) MSB-first
/// from a backing byte stream.
pub struct MsBitReader<'a, S> {
    base: &'a mut S,
    bytes: [u8; 3],
    bit_offset: u32,
    buffered_bits: u32,
    bits_read: u32,
    eos: bool,
}

impl<'a, S: Stream> MsBitReader<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        let mut r = MsBitReader {
            base,
            bytes: [0; 3],
            bit_offset: 0,
            buffered_bits: 0,
            bits_read: 0,
            eos: true,
        };

        for slot in 0..3 {
            if !r.base.eos() {
                r.eos = false;
                r.bytes[slot] = r.base.next();
                r.buffered_bits += 8;
            }
        }

        r
    }

    /// Reads `bits` (≤ 32); past the end of the stream the missing bits
    /// read as zero.
    pub fn read(&mut self, bits: u32) -> u32 {
        if bits > 32 {
            return 0;
        }

        if bits > 16 {
            let senior = self.read16(bits - 16) as u32;
            let junior = self.read16(16) as u32;
            (senior << 16) | junior
        } else {
            self.read16(bits) as u32
        }
    }

    /// True once the backing stream is exhausted and no buffered bits
    /// remain.
    pub fn eos(&self) -> bool {
        if self.base.eos() {
            return self.eos;
        }
        false
    }

    pub fn bits_read(&self) -> u32 {
        self.bits_read
    }

    fn read16(&mut self, bits: u32) -> u16 {
        if bits == 0 {
            return 0;
        }

        let mut acc = ((self.bytes[0] as u32) << 16)
            | ((self.bytes[1] as u32) << 8)
            | self.bytes[2] as u32;
        acc <<= self.bit_offset;
        acc >>= 24 - bits;
        acc &= (1u32 << bits) - 1;

        self.bit_offset += bits;
        self.bits_read += bits;
        self.buffered_bits = self.buffered_bits.saturating_sub(bits);

        // Refill whole bytes consumed out of the register.
        while self.bit_offset >= 8 {
            self.bytes[0] = self.bytes[1];
            self.bytes[1] = self.bytes[2];
            if !self.base.eos() {
                self.bytes[2] = self.base.next();
                self.buffered_bits += 8;
            } else {
                self.bytes[2] = 0;
            }
            self.bit_offset -= 8;
        }

        if self.base.eos() && self.buffered_bits == 0 {
            self.eos = true;
        }

        acc as u16
    }
}

/// Writes variable-length bit strings (up to 32 bits per call) MSB-first
/// to a backing byte stream.
pub struct MsBitWriter<'a, S> {
    base: &'a mut S,
    bytes: [u8; 3],
    bit_offset: u32,
    bits_written: u32,
}

impl<'a, S: Stream> MsBitWriter<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        MsBitWriter {
            base,
            bytes: [0; 3],
            bit_offset: 0,
            bits_written: 0,
        }
    }

    pub fn write(&mut self, value: u32, bits: u32) {
        if bits > 32 {
            return;
        }

        if bits > 16 {
            self.write16((value >> 16) as u16, bits - 16);
            self.write16((value & 0x0000_FFFF) as u16, 16);
        } else {
            self.write16(value as u16, bits);
        }
    }

    /// Drains the partial byte (zero padded) into the backing stream and
    /// flushes it. Calling again on an already-flushed stream changes
    /// nothing.
    pub fn flush(&mut self) {
        while self.bit_offset > 0 {
            self.base.put(self.bytes[0]);
            self.bytes[0] = self.bytes[1];
            self.bytes[1] = self.bytes[2];
            self.bytes[2] = 0;
            self.bit_offset = self.bit_offset.saturating_sub(8);
        }

        self.base.flush();
    }

    pub fn bits_written(&self) -> u32 {
        self.bits_written
    }

    fn write16(&mut self, value: u16, bits: u32) {
        if bits == 0 {
            return;
        }

        let value = (value as u32) & ((1u32 << bits) - 1);

        let mut acc = ((self.bytes[0] as u32) << 16)
            | ((self.bytes[1] as u32) << 8)
            | self.bytes[2] as u32;
        acc |= value << (24 - self.bit_offset - bits);

        self.bytes[0] = (acc >> 16) as u8;
        self.bytes[1] = (acc >> 8) as u8;
        self.bytes[2] = acc as u8;

        self.bit_offset += bits;
        self.bits_written += bits;

        while self.bit_offset >= 8 {
            self.base.put(self.bytes[0]);
            self.bytes[0] = self.bytes[1];
            self.bytes[1] = self.bytes[2];
            self.bytes[2] = 0;
            self.bit_offset -= 8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::byte_stream::ByteStream;

    #[test]
    fn packs_msb_first() {
        let mut out = ByteStream::writer(256, 256);
        {
            let mut w = MsBitWriter::new(&mut out);
            w.write(0b101, 3);
            w.write(0b01, 2);
            w.flush();
        }

        assert_eq!(out.written(), &[0b1010_1000]);
    }

    #[test]
    fn flush_is_idempotent() {
        let mut out = ByteStream::writer(256, 256);
        {
            let mut w = MsBitWriter::new(&mut out);
            w.write(0x3, 2);
            w.flush();
            w.flush();
        }

        assert_eq!(out.written().len(), 1);
    }

    #[test]
    fn round_trips_mixed_widths() {
        let fields: &[(u32, u32)] = &[
            (0x1, 1),
            (0x5, 3),
            (0xABC, 12),
            (0xFFFF, 16),
            (0x12345, 17),
            (0xDEADBEEF, 32),
            (0x0, 5),
            (0x3FF, 10),
        ];

        let mut out = ByteStream::writer(256, 256);
        {
            let mut w = MsBitWriter::new(&mut out);
            for &(value, bits) in fields {
                w.write(value, bits);
            }
            w.flush();
        }

        let encoded = out.take_buffer();
        let mut input = ByteStream::reader(&encoded);
        let mut r = MsBitReader::new(&mut input);
        for &(value, bits) in fields {
            assert_eq!(r.read(bits), value, "field of {} bits", bits);
        }
    }

    #[test]
    fn reader_pads_past_end_with_zeros() {
        let data = [0xFFu8];
        let mut input = ByteStream::reader(&data);
        let mut r = MsBitReader::new(&mut input);

        assert_eq!(r.read(8), 0xFF);
        assert_eq!(r.read(8), 0);
        assert!(r.eos());
    }

    #[test]
    fn empty_stream_is_immediately_eos() {
        let mut input = ByteStream::reader(&[]);
        let r = MsBitReader::new(&mut input);
        assert!(r.eos());
    }
}

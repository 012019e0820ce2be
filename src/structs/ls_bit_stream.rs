/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::byte_stream::Stream;

// LSB-first packing: the first byte of the stream carries the least
// significant bits, the way GIF code streams are laid out. Calls above 16
// bits are split junior half first.

/// Reads variable-length bit strings (up to 32 bits per call) LSB-first
/// from a backing byte stream.
pub struct LsBitReader<'a, S> {
    base: &'a mut S,
    bytes: [u8; 3],
    bit_offset: u32,
    buffered_bits: u32,
    bits_read: u32,
    eos: bool,
}

impl<'a, S: Stream> LsBitReader<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        let mut r = LsBitReader {
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

    pub fn read(&mut self, bits: u32) -> u32 {
        if bits > 32 {
            return 0;
        }

        if bits > 16 {
            let junior = self.read16(16) as u32;
            let senior = self.read16(bits - 16) as u32;
            (senior << 16) | junior
        } else {
            self.read16(bits) as u32
        }
    }

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

        // Oldest byte in slot 0 supplies the least significant bits.
        let mut acc = ((self.bytes[2] as u32) << 16)
            | ((self.bytes[1] as u32) << 8)
            | self.bytes[0] as u32;
        acc >>= self.bit_offset;
        acc &= (1u32 << bits) - 1;

        self.bit_offset += bits;
        self.bits_read += bits;
        self.buffered_bits = self.buffered_bits.saturating_sub(bits);

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

/// Writes variable-length bit strings (up to 32 bits per call) LSB-first
/// to a backing byte stream.
pub struct LsBitWriter<'a, S> {
    base: &'a mut S,
    bytes: [u8; 3],
    bit_offset: u32,
    bits_written: u32,
}

impl<'a, S: Stream> LsBitWriter<'a, S> {
    pub fn new(base: &'a mut S) -> Self {
        LsBitWriter {
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
            self.write16((value & 0x0000_FFFF) as u16, 16);
            self.write16((value >> 16) as u16, bits - 16);
        } else {
            self.write16(value as u16, bits);
        }
    }

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

        let mut acc = ((self.bytes[2] as u32) << 16)
            | ((self.bytes[1] as u32) << 8)
            | self.bytes[0] as u32;
        acc |= value << self.bit_offset;

        self.bytes[0] = acc as u8;
        self.bytes[1] = (acc >> 8) as u8;
        self.bytes[2] = (acc >> 16) as u8;

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
    fn packs_lsb_first() {
        let mut out = ByteStream::writer(256, 256);
        {
            let mut w = LsBitWriter::new(&mut out);
            w.write(0b101, 3);
            w.write(0b01, 2);
            w.flush();
        }

        // 101 at bits 0..2, 01 at bits 3..4.
        assert_eq!(out.written(), &[0b0000_1101]);
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
            let mut w = LsBitWriter::new(&mut out);
            for &(value, bits) in fields {
                w.write(value, bits);
            }
            w.flush();
        }

        let encoded = out.take_buffer();
        let mut input = ByteStream::reader(&encoded);
        let mut r = LsBitReader::new(&mut input);
        for &(value, bits) in fields {
            assert_eq!(r.read(bits), value, "field of {} bits", bits);
        }
    }

    #[test]
    fn reader_pads_past_end_with_zeros() {
        let data = [0x80u8];
        let mut input = ByteStream::reader(&data);
        let mut r = LsBitReader::new(&mut input);

        assert_eq!(r.read(4), 0x0);
        assert_eq!(r.read(4), 0x8);
        assert_eq!(r.read(8), 0);
        assert!(r.eos());
    }
}

/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::byte_stream::Stream;
use super::ms_bit_stream::MsBitReader;

const ARENAS: usize = 64;
const ARENA_SIZE: u16 = 1024;

/// Adaptive encoder/decoder for 16-bit back-reference offsets.
///
/// The offset space is cut into 64 arenas of 1024 offsets. Arenas are
/// ranked by hit count in a small priority queue and the rank rides a short
/// prefix code, so offsets into busy arenas cost 12 bits while the long
/// tail costs 17. Encoder and decoder apply the identical hit update and
/// bubble after every code, keeping their rankings in lockstep.
pub struct OffsetCodec {
    arena_hits: [usize; ARENAS],
    /// Arena numbers in descending hit order.
    apq: [u8; ARENAS],
}

impl OffsetCodec {
    pub fn new() -> Self {
        let mut apq = [0u8; ARENAS];
        for (rank, slot) in apq.iter_mut().enumerate() {
            *slot = rank as u8;
        }

        OffsetCodec {
            arena_hits: [0; ARENAS],
            apq,
        }
    }

    /// Encodes an offset as (bits, bit length) and promotes its arena.
    pub fn encode(&mut self, offset: u16) -> (u32, u32) {
        let arena = (offset / ARENA_SIZE) as u8;
        let residue = (offset % ARENA_SIZE) as u32;

        let mut rank = 0;
        while rank < ARENAS && self.apq[rank] != arena {
            rank += 1;
        }

        let (prefix, prefix_len): (u32, u32) = match rank {
            0 => (0b00, 2),
            1 => (0b010, 3),
            2 => (0b0110, 4),
            3 => (0b011100, 6),
            4 => (0b011101, 6),
            5 => (0b011110, 6),
            6 => (0b011111, 6),
            _ => ((1 << 6) + rank as u32, 7),
        };

        let encodon = (prefix << 10) + residue;
        let enc_len = prefix_len + 10;

        self.arena_hits[arena as usize] += 1;
        self.bubble(rank);

        (encodon, enc_len)
    }

    /// Decodes the next offset, applying the same ranking update as the
    /// encoder.
    pub fn next_token<S: Stream>(&mut self, bs: &mut MsBitReader<'_, S>) -> u16 {
        let rank = if bs.read(1) == 1 {
            bs.read(6) as usize
        } else if bs.read(1) == 0 {
            0
        } else if bs.read(1) == 0 {
            1
        } else if bs.read(1) == 0 {
            2
        } else {
            bs.read(2) as usize + 3
        };

        let rank = rank.min(ARENAS - 1);
        let offset = self.apq[rank] as u16 * ARENA_SIZE + bs.read(10) as u16;

        self.arena_hits[self.apq[rank] as usize] += 1;
        self.bubble(rank);

        offset
    }

    /// Bubbles the arena at `rank` toward the front while its hits exceed
    /// its predecessor's.
    fn bubble(&mut self, mut rank: usize) {
        while rank >= 1 {
            if self.arena_hits[self.apq[rank] as usize]
                > self.arena_hits[self.apq[rank - 1] as usize]
            {
                self.apq.swap(rank, rank - 1);
                rank -= 1;
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    fn rank_of(&self, arena: u8) -> usize {
        self.apq.iter().position(|&a| a == arena).unwrap()
    }
}

impl Default for OffsetCodec {
    fn default() -> Self {
        OffsetCodec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::byte_stream::ByteStream;
    use crate::structs::ms_bit_stream::MsBitWriter;

    #[test]
    fn rank_zero_costs_twelve_bits() {
        let mut codec = OffsetCodec::new();
        let (encodon, len) = codec.encode(100);

        // Arena 0 starts at rank 0: prefix 00 plus the 10-bit residue.
        assert_eq!(len, 12);
        assert_eq!(encodon, 100);
    }

    #[test]
    fn cold_arena_costs_seventeen_bits() {
        let mut codec = OffsetCodec::new();
        let (_, len) = codec.encode(63 * 1024 + 5);
        assert_eq!(len, 17);
    }

    #[test]
    fn hot_arena_bubbles_to_the_front() {
        let mut codec = OffsetCodec::new();
        for _ in 0..5 {
            codec.encode(40 * 1024 + 1);
        }

        assert_eq!(codec.rank_of(40), 0);
        let (_, len) = codec.encode(40 * 1024 + 7);
        assert_eq!(len, 12);
    }

    #[test]
    fn priority_queue_stays_sorted_by_hits() {
        let mut codec = OffsetCodec::new();
        let offsets = [0u16, 1024, 1025, 50_000, 50_001, 50_002, 3000, 65_535];
        for &o in &offsets {
            codec.encode(o);
        }

        for i in 1..ARENAS {
            assert!(
                codec.arena_hits[codec.apq[i - 1] as usize]
                    >= codec.arena_hits[codec.apq[i] as usize]
            );
        }
    }

    #[test]
    fn round_trips_and_keeps_both_sides_in_step() {
        let offsets = [
            5u16, 1024, 2048, 5, 5, 40_000, 40_001, 65_535, 0, 1023, 4097, 40_002,
        ];

        let mut enc = OffsetCodec::new();
        let mut out = ByteStream::writer(256, 256);
        {
            let mut w = MsBitWriter::new(&mut out);
            for &o in &offsets {
                let (bits, len) = enc.encode(o);
                w.write(bits, len);
            }
            w.flush();
        }

        let encoded = out.take_buffer();
        let mut input = ByteStream::reader(&encoded);
        let mut r = MsBitReader::new(&mut input);
        let mut dec = OffsetCodec::new();
        for &o in &offsets {
            assert_eq!(dec.next_token(&mut r), o);
        }
    }
}

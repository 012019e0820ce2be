/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::warn;

use super::byte_stream::Stream;
use super::ms_bit_stream::MsBitReader;

/// Dictionary growth unit, in entries.
const DICT_PAGE_SIZE: usize = 1024;

/// Ranks this wide and below are emitted raw; beyond it the split
/// encoding kicks in.
const SPLIT_BITS: u32 = 11;

struct DictionaryEntry {
    /// Offset of the string in the uncompressed buffer.
    offset: usize,
    hits: usize,
    length: u8,
}

/// Dictionary of previously emitted strings with an adaptive rank code.
///
/// Every LZ77 emission lands here as an entry; later chunks that repeat the
/// exact string are sent as a dictionary rank instead of another offset and
/// length. Ranks live in a priority queue ordered by hit count, updated the
/// same way on both sides of the stream.
pub struct DictRefCodec {
    entries: Vec<DictionaryEntry>,
    /// Entry ids in descending hit order.
    dpq: Vec<usize>,
    /// Bits needed to express the highest entry id.
    dict_bits: u32,
}

impl DictRefCodec {
    pub fn new() -> Self {
        DictRefCodec {
            entries: Vec::new(),
            dpq: Vec::new(),
            dict_bits: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries.len()
    }

    /// Encodes an entry id as (bits, bit length) by its current rank:
    /// raw `dict_bits` while the dictionary is small, otherwise a 0 + 9-bit
    /// form for the busy half-kilobyte of ranks and 1 + `dict_bits` beyond.
    pub fn encode(&mut self, dict_ref: usize) -> (u32, u32) {
        let mut rank = 0;
        while rank < self.entries.len() && self.dpq[rank] != dict_ref {
            rank += 1;
        }
        if rank == self.entries.len() {
            warn!("dictionary reference {} is not in the priority queue", dict_ref);
            return (0, 0);
        }

        let (encodon, enc_len) = if self.dict_bits < SPLIT_BITS {
            (rank as u32, self.dict_bits)
        } else if rank < 512 {
            (rank as u32, 10)
        } else {
            ((1 << self.dict_bits) + rank as u32, self.dict_bits + 1)
        };

        self.entries[self.dpq[rank]].hits += 1;
        self.bubble(rank);

        (encodon, enc_len)
    }

    /// Decodes the next entry id, applying the same rank update as the
    /// encoder.
    pub fn next_token<S: Stream>(&mut self, bs: &mut MsBitReader<'_, S>) -> usize {
        let rank = if self.dict_bits < SPLIT_BITS {
            bs.read(self.dict_bits) as usize
        } else if bs.read(1) == 0 {
            bs.read(9) as usize
        } else {
            bs.read(self.dict_bits) as usize
        };

        if rank >= self.entries.len() {
            warn!("decoded dictionary rank {} is out of range", rank);
            return 0;
        }

        let dict_ref = self.dpq[rank];

        self.entries[dict_ref].hits += 1;
        self.bubble(rank);

        dict_ref
    }

    /// Offset and length of the entry's string.
    pub fn string(&self, dict_ref: usize) -> (usize, u32) {
        match self.entries.get(dict_ref) {
            Some(e) => (e.offset, e.length as u32),
            None => (0, 0),
        }
    }

    /// Longest dictionary entry matching the head of `chunk`, ties broken
    /// by the earliest id. `base` is the uncompressed buffer the entry
    /// offsets index into.
    pub fn find_longest(&self, base: &[u8], chunk: &[u8]) -> (Option<usize>, u32) {
        if chunk.is_empty() {
            return (None, 0);
        }

        let mut best: Option<usize> = None;

        for (id, entry) in self.entries.iter().enumerate() {
            let len = entry.length as usize;
            if entry.offset >= base.len() || base[entry.offset] != chunk[0] {
                continue;
            }
            if chunk.len() < len || entry.offset + len > base.len() {
                continue;
            }
            if base[entry.offset..entry.offset + len] == chunk[..len] {
                match best {
                    Some(b) if self.entries[b].length as usize >= len => {}
                    _ => best = Some(id),
                }
            }
        }

        match best {
            Some(id) => (Some(id), self.entries[id].length as u32),
            None => (None, 0),
        }
    }

    /// Registers a newly emitted string. The dictionary and its priority
    /// queue grow a page at a time.
    pub fn add(&mut self, offset: usize, length: usize) {
        if self.entries.len() == self.entries.capacity() {
            self.entries.reserve_exact(DICT_PAGE_SIZE);
            self.dpq.reserve_exact(DICT_PAGE_SIZE);
        }

        self.entries.push(DictionaryEntry {
            offset,
            hits: 1,
            length: length.min(u8::MAX as usize) as u8,
        });
        self.dpq.push(self.entries.len() - 1);

        // Bits needed for the highest entry id, one at minimum.
        let mut dict_bits = 1;
        let mut bit_cap = 2;
        while bit_cap < self.entries.len() {
            dict_bits += 1;
            bit_cap *= 2;
        }
        self.dict_bits = dict_bits;
    }

    /// Bubbles the entry at `rank` toward the front while its hits exceed
    /// its predecessor's.
    fn bubble(&mut self, mut rank: usize) {
        while rank > 0 {
            if self.entries[self.dpq[rank]].hits > self.entries[self.dpq[rank - 1]].hits {
                self.dpq.swap(rank, rank - 1);
            }
            rank -= 1;
        }
    }
}

impl Default for DictRefCodec {
    fn default() -> Self {
        DictRefCodec::new()
    }
}

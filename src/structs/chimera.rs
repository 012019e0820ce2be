/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    doublet_code, singlet_code, triplet_code, ALPHABET_SIZE, DEFAULT_WINDOW_SIZE, DICTENTRY, EOS,
    LZ_SEARCH_WINDOW, MAX_RUN16, MAX_RUN32, MAX_RUN8, MAX_STRING_LEN, MIN_STRING_LEN, NEWSYMBOL,
    REPEAT, REPEATSTRING, RLE, XSYMBOL, XS_SEARCH_WINDOW, XS_THRESHOLD,
};
use crate::options::CodecOptions;
use crate::stats::{per_symbol, CStats};
use crate::trace::{NullSink, TraceSink};

use super::byte_stream::Stream;
use super::dict_ref_codec::DictRefCodec;
use super::huffman_tree::AdaptiveHuffmanTree;
use super::ms_bit_stream::{MsBitReader, MsBitWriter};
use super::offset_codec::OffsetCodec;

// Wire values of the control codes as class-1 extended symbols.
const NS_CODE: u32 = singlet_code(NEWSYMBOL);
const RLE_CODE: u32 = singlet_code(RLE);
const STR_CODE: u32 = singlet_code(REPEATSTRING);
const DIC_CODE: u32 = singlet_code(DICTENTRY);
const XSYM_CODE: u32 = singlet_code(XSYMBOL);
const REP_CODE: u32 = singlet_code(REPEAT);
const EOS_CODE: u32 = singlet_code(EOS);

/// Encoding selected for the next chunk of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    /// Single literal byte through the entropy coder.
    Single,
    /// Reference to a dictionary string.
    Dict,
    /// Back-reference into the already-emitted window.
    Str,
    Rle8,
    Rle16,
    Rle32,
    /// Extended symbol through the auxiliary tree.
    Triplet,
    Doublet,
}

/// The Chimera adaptive entropy codec.
///
/// Compression walks the input chunk by chunk, picks the encoding that
/// covers the most bytes, and emits a Huffman-coded class marker followed
/// by the operand bits of that encoding. Decompression rebuilds the same
/// adaptive trees and tables from the identical sequence of observations,
/// so the two sides never exchange any model state.
///
/// A codec instance carries configuration and statistics only; all model
/// state is created fresh inside each `compress`/`decompress` call.
pub struct Chimera {
    window_size: u16,
    options: CodecOptions,
    trace_window: Option<(usize, usize)>,
    stats: CStats,
    sink: Box<dyn TraceSink>,
}

impl Chimera {
    /// A codec with every option permitted and trace output discarded.
    pub fn new() -> Self {
        Chimera::with_options(CodecOptions::all(), Box::new(NullSink))
    }

    pub fn with_sink(sink: Box<dyn TraceSink>) -> Self {
        Chimera::with_options(CodecOptions::all(), sink)
    }

    pub fn with_options(options: CodecOptions, sink: Box<dyn TraceSink>) -> Self {
        Chimera {
            window_size: DEFAULT_WINDOW_SIZE,
            options,
            trace_window: None,
            stats: CStats::default(),
            sink,
        }
    }

    /// Window size for the next operation. Compressor and decompressor
    /// must agree on this value.
    pub fn set_window_size(&mut self, window_size: u16) {
        self.window_size = window_size;
    }

    /// Optional encodings allowed in the stream. Compressor and
    /// decompressor must agree on these flags.
    pub fn permit_options(&mut self, options: CodecOptions) {
        self.options = options;
    }

    /// Enables per-token trace lines for chunks whose offset falls inside
    /// `[start, end]`.
    pub fn set_debug_trace(&mut self, start: usize, end: usize) {
        self.trace_window = Some((start, end));
    }

    pub fn clear_debug_trace(&mut self) {
        self.trace_window = None;
    }

    /// Statistics from the most recent compress or decompress call.
    pub fn stats(&self) -> &CStats {
        &self.stats
    }

    /// Compresses `input` into `output` and returns the bytes written.
    pub fn compress<I: Stream, O: Stream>(&mut self, input: &mut I, output: &mut O) -> usize {
        let mut encoder = AdaptiveHuffmanTree::new(ALPHABET_SIZE, self.window_size);
        let mut excoder = AdaptiveHuffmanTree::new(ALPHABET_SIZE, self.window_size);
        let mut off_coder = OffsetCodec::new();
        let mut dictionary = DictRefCodec::new();
        let mut obs = MsBitWriter::new(output);

        self.stats = CStats::default();
        self.seed_control_codes(&mut encoder);

        let mut last_token = 0u32;

        while !input.eos() {
            let mut best_option = Candidate::Single;
            let mut best_length = 0u32;
            let mut dict_ent = 0usize;
            let mut string_offset = 0u16;
            let mut xs_code = 0u32;

            if self.options.contains(CodecOptions::DICT) {
                let (id, len) = dictionary.find_longest(input.buffer(), input.chunk());
                if let Some(id) = id {
                    best_option = Candidate::Dict;
                    best_length = len;
                    dict_ent = id;
                }
            }

            if self.options.contains(CodecOptions::LZ) {
                let (offset, len) = self.find_longest_new_string(input);
                if len > best_length + 2 {
                    best_option = Candidate::Str;
                    best_length = len;
                    string_offset = offset;
                }
            }

            if self.options.contains(CodecOptions::RLE) {
                let (factor, len) = self.find_longest_run(input);
                if len > best_length {
                    best_option = match factor {
                        8 => Candidate::Rle8,
                        16 => Candidate::Rle16,
                        _ => Candidate::Rle32,
                    };
                    best_length = len;
                }
            }

            if best_length == 0 && self.options.contains(CodecOptions::XS) {
                let (code, len) = self.find_extended_symbol(input, &excoder, &dictionary);
                xs_code = code;
                best_length = len;
                if len == 3 {
                    best_option = Candidate::Triplet;
                } else if len == 2 {
                    best_option = Candidate::Doublet;
                }
            }

            // Greedy defeat: drop the selection when skipping one byte
            // uncovers a strictly better candidate.
            if best_length > 0 && self.can_do_better(input, best_length, &dictionary) {
                best_option = Candidate::Single;
                best_length = 0;
            }

            if best_length == 0 {
                best_length = 1;
            }

            if self.in_trace(input.bytes_read()) {
                self.sink.line(&format!(
                    "TRACE: Best option: {:?} has been selected with length: {} for chunk at offset: {}.",
                    best_option,
                    best_length,
                    input.bytes_read()
                ));
                let avail = input.chunk();
                let chunk: Vec<u8> = avail[..avail.len().min(best_length as usize)].to_vec();
                self.trace_chunk(&chunk);
            }

            self.stats.tokens += 1;

            match best_option {
                Candidate::Single => {
                    let symbol = singlet_code(input.peek(0) as u32);

                    if encoder.contains(symbol) {
                        let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, symbol);
                        obs.write(enc, len);

                        if self.in_trace(input.bytes_read()) {
                            self.sink.line(&format!(
                                "TRACE: [{}] Emitted SYMBOL (singlet): {} in: {} bits.",
                                self.stats.tokens, enc, len
                            ));
                        }

                        self.stats.es1_tokens += 1;
                        self.stats.es1_bytes += 1;
                        self.stats.es1_bits += len as usize;
                    } else {
                        let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, NS_CODE);
                        obs.write(enc, len);
                        obs.write(1, 2);
                        obs.write(symbol, 8);
                        encoder.insert_symbol(symbol, 1);

                        if self.in_trace(input.bytes_read()) {
                            self.sink.line(&format!(
                                "TRACE: [{}] Emitted NEWSYMBOL (singlet): {} in: {} bits.",
                                self.stats.tokens,
                                enc,
                                len + 10
                            ));
                        }

                        self.stats.ns1_tokens += 1;
                        self.stats.ns1_bytes += 1;
                        self.stats.ns1_bits += len as usize + 10;
                    }
                }

                Candidate::Dict => {
                    let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, DIC_CODE);
                    obs.write(enc, len);

                    let (ref_enc, ref_len) = dictionary.encode(dict_ent);
                    obs.write(ref_enc, ref_len);

                    if self.in_trace(input.bytes_read()) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Emitted DICTREF: {}, Length: {} in: {} bits.",
                            self.stats.tokens,
                            dict_ent,
                            best_length,
                            len + ref_len
                        ));
                    }

                    self.stats.dict_tokens += 1;
                    self.stats.dict_bytes += best_length as usize;
                    self.stats.dict_bits += (len + ref_len) as usize;
                }

                Candidate::Str => {
                    let (enc, mut len) = self.marker_bits(&mut encoder, &mut last_token, STR_CODE);
                    obs.write(enc, len);

                    let (off_enc, off_len) = off_coder.encode(string_offset);
                    obs.write(off_enc, off_len);

                    // Length rides in 5 bits, or 9 with the extension flag.
                    let encoded_length = best_length - 3;
                    if encoded_length < 16 {
                        obs.write(encoded_length, 5);
                    } else {
                        obs.write(encoded_length + 256, 9);
                        len += 4;
                    }

                    let nett_offset = input.bytes_read() - string_offset as usize;
                    dictionary.add(nett_offset, best_length as usize);

                    if self.in_trace(input.bytes_read()) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Emitted STRINGREF: {} (-{}), Length: {} in: {} bits.",
                            self.stats.tokens,
                            nett_offset,
                            string_offset,
                            best_length,
                            len + off_len + 5
                        ));
                    }

                    self.stats.str_tokens += 1;
                    self.stats.str_bytes += best_length as usize;
                    self.stats.str_bits += (len + off_len + 5) as usize;
                }

                Candidate::Rle8 => {
                    let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, RLE_CODE);
                    obs.write(enc, len);
                    obs.write(0, 2);
                    obs.write(best_length - 1, 8);
                    obs.write(input.peek(0) as u32, 8);

                    if self.in_trace(input.bytes_read()) {
                        self.sink.line(&format!(
                            "TRACE: [{}] RLE8: Repeats: {} in: {} bits.",
                            self.stats.tokens,
                            best_length - 1,
                            len + 18
                        ));
                    }

                    self.stats.rl8_tokens += 1;
                    self.stats.rl8_bytes += best_length as usize;
                    self.stats.rl8_bits += len as usize + 18;
                }

                Candidate::Rle16 => {
                    let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, RLE_CODE);
                    obs.write(enc, len);
                    obs.write(1, 2);
                    obs.write((best_length - 2) / 2, 8);
                    obs.write(input.peek(0) as u32, 8);
                    obs.write(input.peek(1) as u32, 8);

                    if self.in_trace(input.bytes_read()) {
                        self.sink.line(&format!(
                            "TRACE: [{}] RLE16: Repeats: {} in: {} bits.",
                            self.stats.tokens,
                            (best_length - 2) / 2,
                            len + 26
                        ));
                    }

                    self.stats.rl16_tokens += 1;
                    self.stats.rl16_bytes += best_length as usize;
                    self.stats.rl16_bits += len as usize + 26;
                }

                Candidate::Rle32 => {
                    let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, RLE_CODE);
                    obs.write(enc, len);
                    obs.write(3, 2);
                    obs.write((best_length - 4) / 4, 8);
                    for i in 0..4 {
                        obs.write(input.peek(i) as u32, 8);
                    }

                    if self.in_trace(input.bytes_read()) {
                        self.sink.line(&format!(
                            "TRACE: [{}] RLE32: Repeats: {} in: {} bits.",
                            self.stats.tokens,
                            (best_length - 4) / 4,
                            len + 42
                        ));
                    }

                    self.stats.rl32_tokens += 1;
                    self.stats.rl32_bytes += best_length as usize;
                    self.stats.rl32_bits += len as usize + 42;
                }

                Candidate::Triplet | Candidate::Doublet => {
                    let triplet = best_option == Candidate::Triplet;

                    if let Some((xs_enc, xs_len)) = excoder.encode(xs_code) {
                        let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, XSYM_CODE);
                        obs.write(enc, len);
                        obs.write(xs_enc, xs_len);

                        if self.in_trace(input.bytes_read()) {
                            self.sink.line(&format!(
                                "TRACE: [{}] Emitted SYMBOL ({}): {} in: {} bits.",
                                self.stats.tokens,
                                if triplet { "Triplet" } else { "Doublet" },
                                xs_enc,
                                xs_len + len
                            ));
                        }

                        if triplet {
                            self.stats.es3_tokens += 1;
                            self.stats.es3_bytes += 3;
                            self.stats.es3_bits += (xs_len + len) as usize;
                        } else {
                            self.stats.es2_tokens += 1;
                            self.stats.es2_bytes += 2;
                            self.stats.es2_bits += (xs_len + len) as usize;
                        }

                        self.constituent_hits(&mut encoder, xs_code, triplet);
                    } else {
                        let (enc, len) = self.marker_bits(&mut encoder, &mut last_token, NS_CODE);
                        obs.write(enc, len);

                        if triplet {
                            obs.write(3, 2);
                            obs.write(xs_code & 0x00FF_FFFF, 24);
                            self.stats.ns3_tokens += 1;
                            self.stats.ns3_bytes += 3;
                            self.stats.ns3_bits += len as usize + 26;
                        } else {
                            obs.write(2, 2);
                            obs.write(xs_code & 0x0000_FFFF, 16);
                            self.stats.ns2_tokens += 1;
                            self.stats.ns2_bytes += 2;
                            self.stats.ns2_bits += len as usize + 18;
                        }

                        excoder.insert_symbol(xs_code, 1);

                        if self.in_trace(input.bytes_read()) {
                            self.sink.line(&format!(
                                "TRACE: [{}] Emitted NEWSYMBOL ({}): {} in: {} bits.",
                                self.stats.tokens,
                                if triplet { "Triplet" } else { "Doublet" },
                                enc,
                                len + if triplet { 26 } else { 18 }
                            ));
                        }
                    }
                }
            }

            // Purge the encoded chunk from the input.
            input.advance(best_length as usize);
            self.stats.bytes_in += best_length as usize;
        }

        if let Some((enc, len)) = encoder.encode(EOS_CODE) {
            obs.write(enc, len);
        }
        obs.flush();

        self.stats.bytes_out = output.bytes_written();
        self.stats.tokens += 1;

        output.bytes_written()
    }

    /// Decompresses `input` into `output` and returns the bytes written.
    ///
    /// Reaching the end of the input before the EOS token is a soft error:
    /// the partial output is retained and a diagnostic naming the last
    /// token read goes to the sink.
    pub fn decompress<I: Stream, O: Stream>(&mut self, input: &mut I, output: &mut O) -> usize {
        let mut decoder = AdaptiveHuffmanTree::new(ALPHABET_SIZE, self.window_size);
        let mut dxcoder = AdaptiveHuffmanTree::new(ALPHABET_SIZE, self.window_size);
        let mut off_coder = OffsetCodec::new();
        let mut dictionary = DictRefCodec::new();
        let mut ibs = MsBitReader::new(input);

        self.stats = CStats::default();
        self.seed_control_codes(&mut decoder);

        let mut last_token = 0u32;
        let mut last_read = 0u32;
        let mut eos_detected = false;

        while !ibs.eos() && !eos_detected {
            let mut code = decoder.next_token(&mut ibs);

            if self.options.contains(CodecOptions::MODAL) {
                if code == REP_CODE {
                    code = last_token;
                    self.stats.reuse_tokens += 1;

                    if self.in_trace(output.bytes_written()) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read REPEAT: {} at Offset: {}.",
                            self.stats.tokens,
                            code,
                            output.bytes_written()
                        ));
                    }
                } else {
                    last_token = code;
                }
            }
            self.stats.tokens += 1;
            last_read = code;

            if code == EOS_CODE {
                eos_detected = true;
                continue;
            }

            let out_offset = output.bytes_written();
            let chunk_len: u32;

            match code {
                NS_CODE => {
                    let size = ibs.read(2);
                    let mut symbol = size << 24;
                    if size > 2 {
                        symbol += ibs.read(8) << 16;
                    }
                    if size > 1 {
                        symbol += ibs.read(8) << 8;
                    }
                    symbol += ibs.read(8);

                    emit_symbol(output, symbol);

                    if size == 1 {
                        decoder.insert_symbol(symbol, 1);
                    } else {
                        dxcoder.insert_symbol(symbol, 1);
                    }

                    if self.in_trace(out_offset) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read NEWSYMBOL: {} at Offset: {}.",
                            self.stats.tokens, symbol, out_offset
                        ));
                    }

                    chunk_len = size;
                    match size {
                        3 => {
                            self.stats.ns3_tokens += 1;
                            self.stats.ns3_bytes += 3;
                        }
                        2 => {
                            self.stats.ns2_tokens += 1;
                            self.stats.ns2_bytes += 2;
                        }
                        _ => {
                            self.stats.ns1_tokens += 1;
                            self.stats.ns1_bytes += 1;
                        }
                    }
                }

                DIC_CODE => {
                    let entry = dictionary.next_token(&mut ibs);
                    let (offset, len) = dictionary.string(entry);

                    for i in 0..len as usize {
                        let b = output.byte_at(offset + i);
                        output.put(b);
                    }

                    if self.in_trace(out_offset) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read DICTREF: {} at Offset: {}.",
                            self.stats.tokens, entry, out_offset
                        ));
                    }

                    chunk_len = len;
                    self.stats.dict_tokens += 1;
                    self.stats.dict_bytes += len as usize;
                }

                STR_CODE => {
                    let offset = off_coder.next_token(&mut ibs) as usize;

                    let mut len = ibs.read(5);
                    if len > 16 {
                        len = (len - 16) << 4;
                        len += ibs.read(4);
                    }
                    len += 3;

                    let source = out_offset.saturating_sub(offset);
                    for i in 0..len as usize {
                        let b = output.byte_at(source + i);
                        output.put(b);
                    }

                    if self.options.contains(CodecOptions::DICT) {
                        dictionary.add(out_offset, len as usize);
                    }

                    if self.in_trace(out_offset) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read STRINGREF offset: -{}, length: {} at Offset: {}.",
                            self.stats.tokens, offset, len, out_offset
                        ));
                    }

                    chunk_len = len;
                    self.stats.str_tokens += 1;
                    self.stats.str_bytes += len as usize;
                }

                RLE_CODE => {
                    let unit = ibs.read(2) as usize + 1;
                    let len = (ibs.read(8) + 1) * unit as u32;

                    let mut eu = [0u8; 4];
                    eu[0] = ibs.read(8) as u8;
                    if unit > 1 {
                        eu[1] = ibs.read(8) as u8;
                    }
                    if unit > 2 {
                        eu[2] = ibs.read(8) as u8;
                        eu[3] = ibs.read(8) as u8;
                    }

                    let mut emitted = 0;
                    while emitted < len {
                        for slot in 0..unit.min(4) {
                            output.put(eu[slot]);
                        }
                        emitted += unit as u32;
                    }

                    if self.in_trace(out_offset) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read RLE ({} bit), Repeats: {} at Offset: {}.",
                            self.stats.tokens,
                            unit * 8,
                            len / unit as u32 - 1,
                            out_offset
                        ));
                    }

                    chunk_len = len;
                    match unit {
                        1 => {
                            self.stats.rl8_tokens += 1;
                            self.stats.rl8_bytes += len as usize;
                        }
                        2 => {
                            self.stats.rl16_tokens += 1;
                            self.stats.rl16_bytes += len as usize;
                        }
                        _ => {
                            self.stats.rl32_tokens += 1;
                            self.stats.rl32_bytes += len as usize;
                        }
                    }
                }

                XSYM_CODE => {
                    let symbol = dxcoder.next_token(&mut ibs);
                    emit_symbol(output, symbol);

                    chunk_len = symbol >> 24;

                    if self.in_trace(out_offset) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read EXTENDED SYMBOL ({}): {} at Offset: {}.",
                            self.stats.tokens,
                            if chunk_len == 3 { "Triplet" } else { "Doublet" },
                            symbol,
                            out_offset
                        ));
                    }

                    if chunk_len == 3 {
                        self.stats.es3_tokens += 1;
                        self.stats.es3_bytes += 3;
                    } else {
                        self.stats.es2_tokens += 1;
                        self.stats.es2_bytes += 2;
                    }

                    self.constituent_hits(&mut decoder, symbol, chunk_len == 3);
                }

                _ => {
                    // A plain leaf symbol: its literal bytes go straight out.
                    emit_symbol(output, code);
                    chunk_len = code >> 24;

                    if self.in_trace(out_offset) {
                        self.sink.line(&format!(
                            "TRACE: [{}] Read SYMBOL: {} at Offset: {}.",
                            self.stats.tokens, code, out_offset
                        ));
                    }

                    match chunk_len {
                        3 => {
                            self.stats.es3_tokens += 1;
                            self.stats.es3_bytes += 3;
                        }
                        2 => {
                            self.stats.es2_tokens += 1;
                            self.stats.es2_bytes += 2;
                        }
                        _ => {
                            self.stats.es1_tokens += 1;
                            self.stats.es1_bytes += 1;
                        }
                    }
                }
            }

            if self.in_trace(output.bytes_written()) {
                let chunk: Vec<u8> = (0..chunk_len as usize)
                    .map(|i| output.byte_at(out_offset + i))
                    .collect();
                self.trace_chunk(&chunk);
            }

            self.stats.bytes_out += chunk_len as usize;
        }

        if !eos_detected {
            self.sink.line(
                "ERROR: End of the input stream has been detected before the stream is complete, \
                 the compressed stream is invalid or damaged.",
            );
            let (encodon, len) = decoder.last_encode();
            self.sink.line(&format!(
                "ERROR: Last token read from the stream was: {}, encoded as: {}, length: {}.",
                last_read, encodon, len
            ));
        }

        self.stats.bytes_in = input.bytes_read();

        output.bytes_written()
    }

    /// Renders the statistics block on the trace sink.
    pub fn report_statistics(&mut self) {
        let s = self.stats;

        self.sink.line(&format!(
            "INFO: (De)Compress Input bytes: {}, Output bytes: {}, Tokens: {}, Reused Tokens: {}.",
            s.bytes_in, s.bytes_out, s.tokens, s.reuse_tokens
        ));

        let categories: [(&str, usize, usize, usize); 6] = [
            ("New Symbols (singlet)", s.ns1_tokens, s.ns1_bits, s.ns1_tokens),
            ("New Symbols (doublet)", s.ns2_tokens, s.ns2_bits, s.ns2_tokens * 2),
            ("New Symbols (triplet)", s.ns3_tokens, s.ns3_bits, s.ns3_tokens * 3),
            ("Existing Symbols (singlet)", s.es1_tokens, s.es1_bits, s.es1_tokens),
            ("Existing Symbols (doublet)", s.es2_tokens, s.es2_bits, s.es2_tokens * 2),
            ("Existing Symbols (triplet)", s.es3_tokens, s.es3_bits, s.es3_tokens * 3),
        ];
        for (name, tokens, bits, symbols) in categories {
            self.sink.line(&format!(
                "INFO: {}: {} were encoded in: {} bits ({} bits per symbol).",
                name,
                tokens,
                bits,
                per_symbol(bits, symbols)
            ));
        }

        let spans: [(&str, usize, usize, usize); 5] = [
            ("Dictionary References", s.dict_tokens, s.dict_bytes, s.dict_bits),
            ("Repeated Strings", s.str_tokens, s.str_bytes, s.str_bits),
            ("RLE8 Runs", s.rl8_tokens, s.rl8_bytes, s.rl8_bits),
            ("RLE16 Runs", s.rl16_tokens, s.rl16_bytes, s.rl16_bits),
            ("RLE32 Runs", s.rl32_tokens, s.rl32_bytes, s.rl32_bits),
        ];
        for (name, tokens, bytes, bits) in spans {
            self.sink.line(&format!(
                "INFO: {}: {} encoded {} symbols in {} bits ({} bits per symbol).",
                name,
                tokens,
                bytes,
                bits,
                per_symbol(bits, bytes)
            ));
        }
    }

    /// Registers the control codes both sides must start from, in a fixed
    /// order so the trees line up.
    fn seed_control_codes(&self, tree: &mut AdaptiveHuffmanTree) {
        tree.insert_symbol(NS_CODE, 1);
        if self.options.contains(CodecOptions::RLE) {
            tree.insert_symbol(RLE_CODE, 1);
        }
        if self.options.contains(CodecOptions::LZ) {
            tree.insert_symbol(STR_CODE, 1);
        }
        if self.options.contains(CodecOptions::DICT) {
            tree.insert_symbol(DIC_CODE, 1);
        }
        if self.options.contains(CodecOptions::XS) {
            tree.insert_symbol(XSYM_CODE, 1);
        }
        if self.options.contains(CodecOptions::MODAL) {
            tree.insert_symbol(REP_CODE, 1);
        }
        tree.insert_symbol(EOS_CODE, 1);
    }

    /// Bits for a class marker, substituting REPEAT when modal streaming
    /// sees the marker repeat.
    fn marker_bits(
        &mut self,
        encoder: &mut AdaptiveHuffmanTree,
        last_token: &mut u32,
        class_code: u32,
    ) -> (u32, u32) {
        if self.options.contains(CodecOptions::MODAL) {
            if *last_token == class_code {
                self.stats.reuse_tokens += 1;
                return encoder.encode(REP_CODE).unwrap_or((0, 0));
            }
            *last_token = class_code;
        }
        encoder.encode(class_code).unwrap_or((0, 0))
    }

    /// Hit-counts an extended symbol's constituent bytes in the main tree,
    /// most significant byte first on both sides of the stream.
    fn constituent_hits(&self, tree: &mut AdaptiveHuffmanTree, code: u32, triplet: bool) {
        if triplet {
            tree.encode(singlet_code((code >> 16) & 0xFF));
        }
        tree.encode(singlet_code((code >> 8) & 0xFF));
        tree.encode(singlet_code(code & 0xFF));
    }

    /// Longest match for the chunk inside the already-consumed window.
    /// Returns the back-offset and the length, searching nearest first so
    /// ties take the shortest offset.
    fn find_longest_new_string<I: Stream>(&self, input: &I) -> (u16, u32) {
        let buffer = input.buffer();
        let pos = input.bytes_read();
        let chunk_len = input.remainder();
        let window = input.pre_read_window(LZ_SEARCH_WINDOW).len();

        if window < MIN_STRING_LEN || chunk_len == 0 {
            return (0, 0);
        }

        let win_start = pos - window;
        let mut best_pos = 0usize;
        let mut best_len = 0usize;

        let mut search = pos - MIN_STRING_LEN;
        loop {
            if buffer[search] == buffer[pos] {
                let mut matched = 1usize;
                while matched < MAX_STRING_LEN
                    && matched < chunk_len
                    && buffer[search + matched] == buffer[pos + matched]
                {
                    matched += 1;
                }

                if matched >= MIN_STRING_LEN && matched > best_len {
                    best_pos = search;
                    best_len = matched;
                }
            }

            if search == win_start {
                break;
            }
            search -= 1;
        }

        if best_len == 0 {
            return (0, 0);
        }

        ((pos - best_pos) as u16, best_len as u32)
    }

    /// Longest run of identical 8, 16 or 32-bit units at the chunk head.
    /// Returns the unit width in bits and the run length in bytes.
    fn find_longest_run<I: Stream>(&self, input: &I) -> (u32, u32) {
        let chunk = input.chunk();
        let chunk_len = chunk.len();

        let mut run8 = 1usize;
        while run8 < chunk_len && run8 < MAX_RUN8 && chunk[run8] == chunk[run8 - 1] {
            run8 += 1;
        }

        let mut run16 = 2usize;
        while run16 + 2 <= chunk_len
            && run16 < MAX_RUN16
            && LittleEndian::read_u16(&chunk[run16 - 2..]) == LittleEndian::read_u16(&chunk[run16..])
        {
            run16 += 2;
        }

        let mut run32 = 4usize;
        while run32 + 4 <= chunk_len
            && run32 < MAX_RUN32
            && LittleEndian::read_u32(&chunk[run32 - 4..]) == LittleEndian::read_u32(&chunk[run32..])
        {
            run32 += 4;
        }

        if run8 + run16 + run32 == 7 {
            return (0, 0);
        }

        // An 8-bit run wins ties; wider units must strictly clear the
        // minimum.
        if run8 >= 4 && run8 >= run16 && run8 >= run32 {
            return (8, run8 as u32);
        }
        if run16 > 4 && run16 >= run32 {
            return (16, run16 as u32);
        }
        if run32 > 4 {
            return (32, run32 as u32);
        }

        (0, 0)
    }

    /// Doublet/triplet candidate for the chunk head: adopted when already
    /// registered or repeated often enough in the lookahead, unless a
    /// string could start inside it.
    fn find_extended_symbol<I: Stream>(
        &self,
        input: &mut I,
        excoder: &AdaptiveHuffmanTree,
        dictionary: &DictRefCodec,
    ) -> (u32, u32) {
        let chunk_len = input.remainder().min(XS_SEARCH_WINDOW);
        let fallback = singlet_code(input.peek(0) as u32);

        if chunk_len < 9 {
            return (fallback, 1);
        }

        let (trip, dbl, mut xs3, mut xs2) = {
            let chunk = &input.chunk()[..chunk_len];

            let trip = triplet_code(chunk[0], chunk[1], chunk[2]);
            let mut xs3 = 0usize;
            if excoder.contains(trip) {
                xs3 = XS_THRESHOLD;
            } else {
                let mut at = 3;
                while at < chunk_len - 6 {
                    if chunk[at..at + 3] == chunk[..3] {
                        xs3 += 1;
                        at += 3;
                    } else {
                        at += 1;
                    }
                }
            }

            let dbl = doublet_code(chunk[0], chunk[1]);
            let mut xs2 = 0usize;
            if excoder.contains(dbl) {
                xs2 = XS_THRESHOLD;
            } else {
                let mut at = 2;
                while at < chunk_len - 4 {
                    if chunk[at..at + 2] == chunk[..2] {
                        xs2 += 1;
                        at += 2;
                    } else {
                        at += 1;
                    }
                }
            }

            (trip, dbl, xs3, xs2)
        };

        // A string starting on the second or third byte beats the extended
        // symbol; do not let the symbol swallow its head.
        if xs2 >= XS_THRESHOLD || xs3 >= XS_THRESHOLD {
            input.advance(1);
            let shadowed = dictionary.find_longest(input.buffer(), input.chunk()).1 > 0
                || self.find_longest_new_string(input).1 > 0;
            if shadowed {
                xs2 = 0;
                xs3 = 0;
            }
            input.retreat(1);
        }

        if xs3 >= XS_THRESHOLD {
            input.advance(2);
            let shadowed = dictionary.find_longest(input.buffer(), input.chunk()).1 > 0
                || self.find_longest_new_string(input).1 > 0;
            if shadowed {
                xs3 = 0;
            }
            input.retreat(2);
        }

        if xs3 * 3 > xs2 * 2 && xs3 >= XS_THRESHOLD {
            return (trip, 3);
        }
        if xs2 >= XS_THRESHOLD {
            return (dbl, 2);
        }

        (fallback, 1)
    }

    /// True when a better candidate appears one byte further on, in which
    /// case the current selection should collapse to a literal.
    fn can_do_better<I: Stream>(
        &self,
        input: &mut I,
        current_best: u32,
        dictionary: &DictRefCodec,
    ) -> bool {
        input.advance(1);

        if self.options.contains(CodecOptions::DICT)
            && dictionary.find_longest(input.buffer(), input.chunk()).1 > current_best + 1
        {
            input.retreat(1);
            return true;
        }

        if self.options.contains(CodecOptions::LZ)
            && self.find_longest_new_string(input).1 > current_best + 1
        {
            input.retreat(1);
            return true;
        }

        if self.options.contains(CodecOptions::RLE)
            && self.find_longest_run(input).1 > current_best + 1
        {
            input.retreat(1);
            return true;
        }

        input.retreat(1);
        false
    }

    fn in_trace(&self, at: usize) -> bool {
        match self.trace_window {
            Some((start, end)) => at >= start && at <= end,
            None => false,
        }
    }

    /// Dumps a chunk as text (control bytes as dots), with the raw byte
    /// values appended for short symbol chunks.
    fn trace_chunk(&mut self, chunk: &[u8]) {
        let mut line = String::from("TRACE: Source: '");
        for &b in chunk {
            line.push(if b < 32 { '.' } else { b as char });
        }
        line.push('\'');

        if chunk.len() < 4 {
            line.push_str(" [");
            for (i, &b) in chunk.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                line.push_str(&b.to_string());
            }
            line.push(']');
        }

        line.push('.');
        self.sink.line(&line);
    }
}

impl Default for Chimera {
    fn default() -> Self {
        Chimera::new()
    }
}

/// Writes an extended symbol's literal bytes, most significant first.
fn emit_symbol<O: Stream>(output: &mut O, code: u32) {
    if code >= 3 << 24 {
        output.put((code >> 16) as u8);
    }
    if code >= 2 << 24 {
        output.put((code >> 8) as u8);
    }
    output.put(code as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::byte_stream::ByteStream;

    fn round_trip(data: &[u8], options: CodecOptions) -> (Vec<u8>, CStats) {
        let mut codec = Chimera::with_options(options, Box::new(NullSink));

        let mut input = ByteStream::reader(data);
        let mut compressed = ByteStream::writer(1024, 1024);
        codec.compress(&mut input, &mut compressed);
        let stats = *codec.stats();

        let encoded = compressed.take_buffer();
        let mut cin = ByteStream::reader(&encoded);
        let mut out = ByteStream::writer(1024, 1024);
        codec.decompress(&mut cin, &mut out);

        (out.take_buffer(), stats)
    }

    #[test]
    fn empty_input_is_a_lone_eos_token() {
        let mut codec = Chimera::new();
        let mut input = ByteStream::reader(&[]);
        let mut compressed = ByteStream::writer(256, 256);
        let written = codec.compress(&mut input, &mut compressed);

        assert!(written >= 1);
        assert_eq!(codec.stats().bytes_in, 0);
        assert_eq!(codec.stats().tokens, 1);

        let encoded = compressed.take_buffer();
        let mut cin = ByteStream::reader(&encoded);
        let mut out = ByteStream::writer(256, 256);
        assert_eq!(codec.decompress(&mut cin, &mut out), 0);
    }

    #[test]
    fn single_byte_round_trips() {
        let (out, stats) = round_trip(&[0x41], CodecOptions::all());
        assert_eq!(out, vec![0x41]);
        assert_eq!(stats.ns1_tokens, 1);
    }

    #[test]
    fn eight_byte_run_selects_rle8() {
        let (out, stats) = round_trip(&[0xAA; 8], CodecOptions::all());
        assert_eq!(out, vec![0xAA; 8]);
        assert_eq!(stats.rl8_tokens, 1);
        assert_eq!(stats.rl8_bytes, 8);
    }

    #[test]
    fn repeated_block_selects_a_back_reference() {
        let (out, stats) = round_trip(b"HelloHello", CodecOptions::all());
        assert_eq!(out, b"HelloHello".to_vec());
        assert_eq!(stats.str_tokens, 1);
        assert_eq!(stats.str_bytes, 5);
    }

    #[test]
    fn modal_literals_round_trip() {
        let (out, _) = round_trip(b"AAAA", CodecOptions::all());
        assert_eq!(out, b"AAAA".to_vec());
    }

    #[test]
    fn stats_account_for_every_input_byte() {
        let data = b"abcabcabcabc the quick brown fox jumps over the lazy dog \
                     the quick brown fox jumps over the lazy dog 0000000000000000";
        let (out, stats) = round_trip(data, CodecOptions::all());

        assert_eq!(out, data.to_vec());
        assert_eq!(stats.bytes_in, data.len());
        assert_eq!(stats.category_bytes(), data.len());
    }

    #[test]
    fn works_with_every_single_option() {
        let data = b"banana banana banana bandana bandana 11111111112222333ababababab";
        for options in [
            CodecOptions::empty(),
            CodecOptions::LZ,
            CodecOptions::RLE,
            CodecOptions::XS,
            CodecOptions::MODAL,
            CodecOptions::LZ | CodecOptions::DICT,
            CodecOptions::LZ | CodecOptions::RLE,
            CodecOptions::LZ | CodecOptions::DICT | CodecOptions::MODAL,
            CodecOptions::all(),
        ] {
            let (out, _) = round_trip(data, options);
            assert_eq!(out, data.to_vec(), "options {:?}", options);
        }
    }

    #[test]
    fn truncated_stream_is_a_soft_error() {
        let data = b"some compressible data data data data";
        let mut codec = Chimera::new();

        let mut input = ByteStream::reader(data);
        let mut compressed = ByteStream::writer(1024, 1024);
        codec.compress(&mut input, &mut compressed);
        let encoded = compressed.take_buffer();

        // Any truncation point must leave the decoder well behaved: the
        // call returns the partial byte count and never panics.
        for cut in 0..encoded.len() {
            let mut codec = Chimera::new();
            let mut cin = ByteStream::reader(&encoded[..cut]);
            let mut out = ByteStream::writer(1024, 1024);
            let written = codec.decompress(&mut cin, &mut out);
            assert_eq!(out.take_buffer().len(), written);
        }
    }
}

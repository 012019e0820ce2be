/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Chimera adaptive entropy codec.
//!
//! A streaming byte-in/byte-out compressor built around an adaptive Huffman
//! tree over an extended alphabet, optionally supplemented by LZ77
//! back-references, a dictionary of previously emitted strings, run-length
//! encoding at three unit widths, extended doublet/triplet symbols and a
//! modal repeat shortcut. The decompressor rebuilds every adaptive model
//! from the token stream itself, so the format carries no tables.
//!
//! ```
//! use chimera_codec::{compress, decompress, CodecOptions};
//!
//! let data = b"the quick brown fox jumps over the quick brown fox";
//! let packed = compress(data, CodecOptions::all());
//! assert_eq!(decompress(&packed, CodecOptions::all()), data);
//! ```

pub mod consts;
pub mod options;
pub mod stats;
pub mod structs;
pub mod trace;

pub use crate::options::CodecOptions;
pub use crate::stats::CStats;
pub use crate::structs::byte_stream::{ByteStream, Stream};
pub use crate::structs::chimera::Chimera;
pub use crate::structs::ls_bit_stream::{LsBitReader, LsBitWriter};
pub use crate::structs::ms_bit_stream::{MsBitReader, MsBitWriter};
pub use crate::structs::segmented_stream::SegmentedStream;
pub use crate::structs::stuffed_stream::StuffedStream;
pub use crate::trace::{NullSink, TraceSink, WriteSink};

/// Compresses a byte buffer with the given option set.
///
/// Compressor and decompressor must use the same options; the stream
/// carries no negotiation.
pub fn compress(data: &[u8], options: CodecOptions) -> Vec<u8> {
    let mut codec = Chimera::with_options(options, Box::new(NullSink));

    let mut input = ByteStream::reader(data);
    let mut output = ByteStream::writer(data.len() / 2 + 256, data.len() / 2 + 256);
    codec.compress(&mut input, &mut output);

    output.take_buffer()
}

/// Decompresses a buffer produced by [`compress`] with the same options.
pub fn decompress(data: &[u8], options: CodecOptions) -> Vec<u8> {
    let mut codec = Chimera::with_options(options, Box::new(NullSink));

    let mut input = ByteStream::reader(data);
    let mut output = ByteStream::writer(data.len() * 4 + 256, data.len() * 4 + 256);
    codec.decompress(&mut input, &mut output);

    output.take_buffer()
}

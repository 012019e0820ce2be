/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rstest::rstest;

use chimera_codec::{
    compress, decompress, ByteStream, Chimera, CodecOptions, NullSink, SegmentedStream, Stream,
    StuffedStream,
};

fn init_logging() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init();
}

fn all_masks() -> Vec<CodecOptions> {
    vec![
        CodecOptions::empty(),
        CodecOptions::LZ,
        CodecOptions::RLE,
        CodecOptions::XS,
        CodecOptions::MODAL,
        CodecOptions::LZ | CodecOptions::DICT,
        CodecOptions::LZ | CodecOptions::RLE | CodecOptions::MODAL,
        CodecOptions::LZ | CodecOptions::DICT | CodecOptions::RLE | CodecOptions::XS,
        CodecOptions::all(),
    ]
}

/// Uniform random bytes: essentially incompressible.
fn random_corpus(len: usize) -> Vec<u8> {
    let mut rng = ChaCha12Rng::seed_from_u64(0x00C0FFEE);
    (0..len).map(|_| rng.gen()).collect()
}

/// Bytes drawn from a 16-symbol alphabet: entropy coding territory.
fn low_entropy_corpus(len: usize) -> Vec<u8> {
    let mut rng = ChaCha12Rng::seed_from_u64(0xBADC0DE);
    (0..len).map(|_| b'a' + (rng.gen::<u8>() % 16)).collect()
}

/// Repeated phrases with runs mixed in: every encoding gets a chance.
fn mixed_corpus(len: usize) -> Vec<u8> {
    let mut rng = ChaCha12Rng::seed_from_u64(0x5EED);
    let phrases: [&[u8]; 4] = [
        b"the quick brown fox jumps over the lazy dog. ",
        b"pack my box with five dozen liquor jugs! ",
        b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00",
        b"ABABABABABABABABABAB",
    ];

    let mut data = Vec::with_capacity(len + 64);
    while data.len() < len {
        data.extend_from_slice(phrases[rng.gen::<usize>() % phrases.len()]);
    }
    data.truncate(len);
    data
}

#[rstest]
#[case::empty(&[])]
#[case::single(&[0x41])]
#[case::pair(&[0x41, 0x42])]
#[case::run(&[0xAA; 8])]
#[case::hello(b"HelloHello")]
#[case::modal(b"AAAA")]
#[case::defeat(b"ABCDAB")]
fn small_inputs_round_trip(#[case] data: &[u8]) {
    init_logging();

    for mask in all_masks() {
        let packed = compress(data, mask);
        assert_eq!(decompress(&packed, mask), data, "mask {:?}", mask);
    }
}

#[rstest]
#[case::random(random_corpus(2048))]
#[case::low_entropy(low_entropy_corpus(2048))]
#[case::mixed(mixed_corpus(2048))]
fn corpora_round_trip_under_every_mask(#[case] data: Vec<u8>) {
    init_logging();

    for mask in all_masks() {
        let packed = compress(&data, mask);
        assert_eq!(decompress(&packed, mask), data, "mask {:?}", mask);
    }
}

#[test]
fn window_eviction_round_trips() {
    init_logging();

    // Enough tokens to wrap the recording window several times.
    let data = mixed_corpus(6 * 1024);
    for window in [1024u16, 2048, 8192] {
        let mut codec = Chimera::new();
        codec.set_window_size(window);

        let mut input = ByteStream::reader(&data);
        let mut packed = ByteStream::writer(4096, 4096);
        codec.compress(&mut input, &mut packed);
        let encoded = packed.take_buffer();

        let mut codec = Chimera::new();
        codec.set_window_size(window);
        let mut cin = ByteStream::reader(&encoded);
        let mut out = ByteStream::writer(8192, 8192);
        codec.decompress(&mut cin, &mut out);

        assert_eq!(out.take_buffer(), data, "window {}", window);
    }
}

#[test]
fn compression_actually_compresses_repetitive_data() {
    init_logging();

    let data = mixed_corpus(4096);
    let packed = compress(&data, CodecOptions::all());
    assert!(
        packed.len() < data.len(),
        "{} bytes packed into {}",
        data.len(),
        packed.len()
    );
}

#[test]
fn statistics_match_the_input() {
    init_logging();

    let data = mixed_corpus(2048);
    let mut codec = Chimera::new();

    let mut input = ByteStream::reader(&data);
    let mut packed = ByteStream::writer(4096, 4096);
    let written = codec.compress(&mut input, &mut packed);

    let stats = codec.stats();
    assert_eq!(stats.bytes_in, data.len());
    assert_eq!(stats.bytes_out, written);
    assert_eq!(stats.category_bytes(), data.len());
    assert!(stats.tokens > 0);
}

#[test]
fn dictionary_references_are_used_for_exact_repeats() {
    init_logging();

    let data = b"abc coriander def coriander ghi coriander jkl";
    let mut codec = Chimera::new();

    let mut input = ByteStream::reader(&data[..]);
    let mut packed = ByteStream::writer(1024, 1024);
    codec.compress(&mut input, &mut packed);

    assert!(codec.stats().str_tokens >= 1);
    assert!(codec.stats().dict_tokens >= 1);

    let encoded = packed.take_buffer();
    assert_eq!(decompress(&encoded, CodecOptions::all()), data.to_vec());
}

#[test]
fn extended_doublets_are_registered_and_reused() {
    init_logging();

    let data = b"abABabCDabEFabGHabIJabKLabMNabOPabQRabSTabUVabWX";
    let mut codec = Chimera::new();

    let mut input = ByteStream::reader(&data[..]);
    let mut packed = ByteStream::writer(1024, 1024);
    codec.compress(&mut input, &mut packed);

    assert!(codec.stats().ns2_tokens >= 1, "first sight goes through NEWSYMBOL");
    assert!(codec.stats().es2_tokens >= 1, "later sights reuse the auxiliary tree");

    let encoded = packed.take_buffer();
    assert_eq!(decompress(&encoded, CodecOptions::all()), data.to_vec());
}

#[test]
fn extended_triplets_are_registered_and_reused() {
    init_logging();

    let data = b"xyzABxyzCDxyzEFxyzGHxyzIJxyzKLxyzMNxyzOPxyzQRxyzSTxyzUVxyzWX";
    let mut codec = Chimera::new();

    let mut input = ByteStream::reader(&data[..]);
    let mut packed = ByteStream::writer(1024, 1024);
    codec.compress(&mut input, &mut packed);

    assert!(codec.stats().ns3_tokens >= 1);
    assert!(codec.stats().es3_tokens >= 1);

    let encoded = packed.take_buffer();
    assert_eq!(decompress(&encoded, CodecOptions::all()), data.to_vec());
}

#[test]
fn modal_streaming_reuses_class_markers() {
    init_logging();

    // A long stretch of distinct literals keeps emitting NEWSYMBOL, which
    // modal streaming collapses to REPEAT after the first.
    let data: Vec<u8> = (0..120u8).collect();
    let mask = CodecOptions::MODAL;

    let mut codec = Chimera::with_options(mask, Box::new(NullSink));
    let mut input = ByteStream::reader(&data);
    let mut packed = ByteStream::writer(1024, 1024);
    codec.compress(&mut input, &mut packed);

    assert!(codec.stats().reuse_tokens > 0);

    let encoded = packed.take_buffer();
    assert_eq!(decompress(&encoded, mask), data);
}

#[test]
fn compressed_stream_survives_a_segmented_container() {
    init_logging();

    let data = mixed_corpus(1500);
    let packed = compress(&data, CodecOptions::all());

    let mut container = SegmentedStream::writer(1024, 1024);
    for &b in &packed {
        container.put(b);
    }
    container.flush();
    let stored = container.take_buffer();

    // The segment chain re-yields the compressed bytes untouched.
    let mut reader = SegmentedStream::reader(&stored);
    let mut codec = Chimera::new();
    let mut out = ByteStream::writer(4096, 4096);
    codec.decompress(&mut reader, &mut out);

    assert_eq!(out.take_buffer(), data);
}

#[test]
fn compressed_stream_survives_a_stuffed_container() {
    init_logging();

    let data = mixed_corpus(1500);
    let packed = compress(&data, CodecOptions::all());

    let mut container = StuffedStream::writer(1024, 1024);
    for &b in &packed {
        container.put(b);
    }
    let stored = container.take_buffer();

    let mut reader = StuffedStream::reader(&stored);
    let mut codec = Chimera::new();
    let mut out = ByteStream::writer(4096, 4096);
    codec.decompress(&mut reader, &mut out);

    assert_eq!(out.take_buffer(), data);
}

/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// Number of symbols addressable by the extended alphabet: the 256 literal
/// bytes plus the seven control codes below.
pub const ALPHABET_SIZE: u16 = 263;

// Control codes of the extended alphabet. On the wire every symbol is a
// 32-bit extended code whose top byte is the symbol class (1 = singlet or
// control, 2 = doublet, 3 = triplet) and whose low 24 bits carry the value.
pub const NEWSYMBOL: u32 = 256;
pub const RLE: u32 = 257;
pub const REPEATSTRING: u32 = 258;
pub const DICTENTRY: u32 = 259;
pub const XSYMBOL: u32 = 260;
pub const REPEAT: u32 = 261;
pub const EOS: u32 = 262;

/// Builds the class-1 extended code for a literal byte or control code.
pub const fn singlet_code(value: u32) -> u32 {
    (1 << 24) + value
}

pub const fn doublet_code(hi: u8, lo: u8) -> u32 {
    (2 << 24) + ((hi as u32) << 8) + lo as u32
}

pub const fn triplet_code(hi: u8, mid: u8, lo: u8) -> u32 {
    (3 << 24) + ((hi as u32) << 16) + ((mid as u32) << 8) + lo as u32
}

pub const DEFAULT_WINDOW_SIZE: u16 = 4096;

/// The adaption window never shrinks below this, whatever the caller asks for.
pub const MIN_WINDOW_SIZE: u16 = 1024;

/// Back-reference search window. Offsets ride in 16 bits and arena numbers
/// in 0..64, so the window must stop one short of 64 KiB.
pub const LZ_SEARCH_WINDOW: usize = 64 * 1024 - 1;

/// Matches below this length are never worth a back-reference token.
pub const MIN_STRING_LEN: usize = 4;

/// Longest match the search will take; keeps dictionary entry lengths
/// within a byte.
pub const MAX_STRING_LEN: usize = 255;

// Run lengths are sent as an 8-bit repeat count per unit, which bounds the
// longest expressible run for each unit width.
pub const MAX_RUN8: usize = 256;
pub const MAX_RUN16: usize = 512;
pub const MAX_RUN32: usize = 1024;

/// Doublet/triplet candidates are only adopted once this many repetitions
/// are visible in the lookahead (or the symbol is already registered).
pub const XS_THRESHOLD: usize = 10;

/// Lookahead limit for counting doublet/triplet repetitions.
pub const XS_SEARCH_WINDOW: usize = 16 * 1024;

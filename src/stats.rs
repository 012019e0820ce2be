/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// (De)compression statistics, reset at the start of every call.
///
/// For every token category the struct carries the token count, the number
/// of input bytes that category accounted for and the number of output bits
/// it cost. After a compression `bytes_in` equals the sum of the per
/// category byte counters, and the bit counters (plus the EOS token) add up
/// to the emitted stream length.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CStats {
    pub bytes_in: usize,
    pub bytes_out: usize,
    /// Tokens in the compressed stream, including the EOS token.
    pub tokens: usize,
    /// Tokens whose class marker was collapsed to REPEAT by modal streaming.
    pub reuse_tokens: usize,

    pub ns1_tokens: usize,
    pub ns1_bytes: usize,
    pub ns1_bits: usize,
    pub ns2_tokens: usize,
    pub ns2_bytes: usize,
    pub ns2_bits: usize,
    pub ns3_tokens: usize,
    pub ns3_bytes: usize,
    pub ns3_bits: usize,

    pub es1_tokens: usize,
    pub es1_bytes: usize,
    pub es1_bits: usize,
    pub es2_tokens: usize,
    pub es2_bytes: usize,
    pub es2_bits: usize,
    pub es3_tokens: usize,
    pub es3_bytes: usize,
    pub es3_bits: usize,

    pub dict_tokens: usize,
    pub dict_bytes: usize,
    pub dict_bits: usize,

    pub str_tokens: usize,
    pub str_bytes: usize,
    pub str_bits: usize,

    pub rl8_tokens: usize,
    pub rl8_bytes: usize,
    pub rl8_bits: usize,
    pub rl16_tokens: usize,
    pub rl16_bytes: usize,
    pub rl16_bits: usize,
    pub rl32_tokens: usize,
    pub rl32_bytes: usize,
    pub rl32_bits: usize,
}

impl CStats {
    /// Sum of the bytes attributed to every token category.
    pub fn category_bytes(&self) -> usize {
        self.ns1_bytes
            + self.ns2_bytes
            + self.ns3_bytes
            + self.es1_bytes
            + self.es2_bytes
            + self.es3_bytes
            + self.dict_bytes
            + self.str_bytes
            + self.rl8_bytes
            + self.rl16_bytes
            + self.rl32_bytes
    }
}

/// Bits-per-symbol ratio with the divide-by-zero case flattened to 0.0.
pub(crate) fn per_symbol(bits: usize, symbols: usize) -> f64 {
    if symbols == 0 {
        0.0
    } else {
        bits as f64 / symbols as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_bytes_sums_every_category() {
        let stats = CStats {
            ns1_bytes: 1,
            ns2_bytes: 2,
            ns3_bytes: 3,
            es1_bytes: 4,
            es2_bytes: 5,
            es3_bytes: 6,
            dict_bytes: 7,
            str_bytes: 8,
            rl8_bytes: 9,
            rl16_bytes: 10,
            rl32_bytes: 11,
            ..CStats::default()
        };

        assert_eq!(stats.category_bytes(), 66);
    }

    #[test]
    fn per_symbol_handles_zero() {
        assert_eq!(per_symbol(10, 0), 0.0);
        assert_eq!(per_symbol(10, 4), 2.5);
    }
}

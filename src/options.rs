/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use bitflags::bitflags;

bitflags! {
    /// Optional encodings the codec is allowed to use. The compressed stream
    /// carries no negotiation, so compressor and decompressor must be
    /// configured with identical flags or the token stream decodes to
    /// nonsense.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CodecOptions: u32 {
        /// Lempel-Ziv (77) back-references into the emitted window.
        const LZ = 0x0000_0001;
        /// Dictionary of previously emitted strings.
        const DICT = 0x0000_0002;
        /// Run-length encoding at 8/16/32-bit unit widths.
        const RLE = 0x0000_0004;
        /// Extended doublet/triplet symbols in the auxiliary tree.
        const XS = 0x0000_0008;
        /// Modal streaming: a repeated class marker collapses to REPEAT.
        const MODAL = 0x0000_0010;
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions::all()
    }
}

/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

pub mod byte_stream;
pub mod chimera;
pub mod dict_ref_codec;
pub mod huffman_tree;
pub mod ls_bit_stream;
pub mod ms_bit_stream;
pub mod offset_codec;
pub mod segmented_stream;
pub mod stuffed_stream;

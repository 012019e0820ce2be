/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::warn;

use crate::consts::{singlet_code, EOS, MIN_WINDOW_SIZE};

use super::byte_stream::Stream;
use super::ms_bit_stream::MsBitReader;

type NodeId = usize;

// Nodes live in an arena and refer to each other by index; parent links are
// plain back-references, so no ownership cycles and no cascade deletes.
struct HuffmanNode {
    leaf: bool,
    parent: Option<NodeId>,
    zero: Option<NodeId>,
    one: Option<NodeId>,
    /// Depth in the tree; the root is level 0 and a leaf's level is its
    /// code length in bits.
    level: u16,
    symbol: u32,
    /// Observations of this symbol inside the sliding window (leaf), or the
    /// sum over the subtree (branch).
    hits: u16,
    /// Count of leaves at or below this node.
    leaves: u16,
}

struct ElutEntry {
    code: u32,
    node: NodeId,
}

/// Prefix-code tree over a dynamic symbol set, adapting to the windowed
/// frequency of recent observations.
///
/// Encoder and decoder instances fed the same sequence of observations go
/// through identical insertions, hit updates and promotions, so they always
/// agree on every symbol's bit string. A leaf whose hits decay to zero
/// stays in place as a placeholder and can be recycled by a later insert.
pub struct AdaptiveHuffmanTree {
    alphabet_size: u16,
    window_size: u16,

    nodes: Vec<HuffmanNode>,
    root: NodeId,
    /// Encoding lookup table, sorted by extended code.
    elut: Vec<ElutEntry>,

    /// Circular recording buffer of the last `window_size` observations.
    window: Vec<u32>,
    window_pos: usize,

    last_encodon: u32,
    last_code_len: u32,
}

impl AdaptiveHuffmanTree {
    pub fn new(alphabet_size: u16, window_size: u16) -> Self {
        let window_size = window_size.max(MIN_WINDOW_SIZE);
        let nx_code = singlet_code(alphabet_size as u32);

        let root = HuffmanNode {
            leaf: false,
            parent: None,
            zero: None,
            one: None,
            level: 0,
            symbol: 0,
            hits: 0,
            leaves: 0,
        };

        AdaptiveHuffmanTree {
            alphabet_size,
            window_size,
            nodes: vec![root],
            root: 0,
            elut: Vec::with_capacity(1024),
            window: vec![nx_code; window_size as usize],
            window_pos: 0,
            last_encodon: 0,
            last_code_len: 0,
        }
    }

    /// Pure lookup: is the symbol registered?
    pub fn contains(&self, symbol: u32) -> bool {
        let idx = self.find_elut(symbol);
        idx < self.elut.len() && self.elut[idx].code == symbol
    }

    /// Returns the symbol's bit string and performs the window bookkeeping:
    /// the displaced observation's leaf loses a hit, this symbol's leaf
    /// gains one and is then promoted as far up the tree as its hit count
    /// justifies.
    pub fn encode(&mut self, symbol: u32) -> Option<(u32, u32)> {
        let idx = self.find_elut(symbol);
        if idx == self.elut.len() || self.elut[idx].code != symbol {
            return None;
        }

        let node = self.elut[idx].node;
        let (encodon, len) = self.get_encoding(node);
        self.last_encodon = encodon;
        self.last_code_len = len;

        self.record_observation(symbol, node);

        Some((encodon, len))
    }

    /// Adds a leaf for a new symbol. The insertion point is the node whose
    /// hits sit closest below the new count, preferring shallower nodes on
    /// ties; placeholders are recycled in place, unsaturated branches gain
    /// the missing child, anything else is forked.
    pub fn insert_symbol(&mut self, symbol: u32, hits: u16) {
        let at = self.find_insert_point(hits);

        if self.nodes[at].leaf {
            if self.nodes[at].hits == 0 {
                self.insert_elut(symbol, at);
                self.nodes[at].symbol = symbol;
                self.set_hits(at, hits);
                return;
            }

            let direction = hits <= self.nodes[at].hits;
            let leaf = self.fork(at, direction, symbol, hits);
            self.insert_elut(symbol, leaf);
            return;
        }

        if self.nodes[at].zero.is_none() {
            let leaf = self.push_leaf(Some(at), hits, symbol);
            self.set_zero(at, Some(leaf));
            self.insert_elut(symbol, leaf);
            return;
        }

        if self.nodes[at].one.is_none() {
            let leaf = self.push_leaf(Some(at), hits, symbol);
            self.set_one(at, Some(leaf));
            self.insert_elut(symbol, leaf);
            return;
        }

        let at = if self.nodes[at].parent.is_none() {
            // A saturated root cannot be forked; descend one level.
            warn!("insert point degenerated to the saturated root");
            match self.nodes[at].zero {
                Some(z) => z,
                None => at,
            }
        } else {
            at
        };

        let leaf = self.fork(at, false, symbol, hits);
        self.insert_elut(symbol, leaf);
    }

    /// Walks the tree one bit at a time until a leaf is reached, then does
    /// the same window bookkeeping as the encoder. Running out of input
    /// mid-codeword yields the EOS code.
    pub fn next_token<S: Stream>(&mut self, bs: &mut MsBitReader<'_, S>) -> u32 {
        let mut node = self.root;
        self.last_encodon = 0;
        self.last_code_len = 0;

        while !bs.eos() {
            let bit = bs.read(1);
            self.last_encodon = (self.last_encodon << 1) | bit;
            self.last_code_len += 1;

            let next = if bit == 0 {
                self.nodes[node].zero
            } else {
                self.nodes[node].one
            };

            node = match next {
                Some(n) => n,
                None => {
                    warn!("token walk entered a missing branch child");
                    return singlet_code(EOS);
                }
            };

            if self.nodes[node].leaf {
                let symbol = self.nodes[node].symbol;
                self.record_observation(symbol, node);
                return symbol;
            }
        }

        singlet_code(EOS)
    }

    /// The last bit string encoded or decoded, for diagnostics.
    pub fn last_encode(&self) -> (u32, u32) {
        (self.last_encodon, self.last_code_len)
    }

    #[cfg(test)]
    pub(crate) fn root_hits(&self) -> u32 {
        self.nodes[self.root].hits as u32
    }

    #[cfg(test)]
    pub(crate) fn leaf_count(&self) -> u32 {
        self.nodes[self.root].leaves as u32
    }

    fn nx_code(&self) -> u32 {
        singlet_code(self.alphabet_size as u32)
    }

    /// Index of the symbol in the ELUT, or where it would be inserted.
    fn find_elut(&self, symbol: u32) -> usize {
        self.elut.partition_point(|e| e.code < symbol)
    }

    fn insert_elut(&mut self, symbol: u32, node: NodeId) {
        let idx = self.find_elut(symbol);
        if idx < self.elut.len() && self.elut[idx].code == symbol {
            warn!("symbol {:#010x} is already in the encoding lookup table", symbol);
            return;
        }
        self.elut.insert(idx, ElutEntry { code: symbol, node });
    }

    /// Shared encode/decode bookkeeping: evict the window occupant, record
    /// the new observation, bump the node and try to promote it.
    fn record_observation(&mut self, symbol: u32, node: NodeId) {
        let evicted = self.window[self.window_pos];
        if evicted != self.nx_code() {
            let idx = self.find_elut(evicted);
            if idx < self.elut.len() && self.elut[idx].code == evicted {
                let evicted_node = self.elut[idx].node;
                if self.nodes[evicted_node].hits > 0 {
                    let hits = self.nodes[evicted_node].hits - 1;
                    self.set_hits(evicted_node, hits);
                }
            }
        }

        self.window[self.window_pos] = symbol;
        self.window_pos += 1;
        if self.window_pos == self.window_size as usize {
            self.window_pos = 0;
        }

        let hits = self.nodes[node].hits.saturating_add(1);
        self.set_hits(node, hits);
        self.promote(node);
    }

    fn push_leaf(&mut self, parent: Option<NodeId>, hits: u16, symbol: u32) -> NodeId {
        let level = parent.map_or(0, |p| self.nodes[p].level + 1);
        self.nodes.push(HuffmanNode {
            leaf: true,
            parent,
            zero: None,
            one: None,
            level,
            symbol,
            hits,
            leaves: 1,
        });
        self.nodes.len() - 1
    }

    /// Derives a leaf's code by walking the parent chain; the deepest
    /// choice ends up in the least significant bit.
    fn get_encoding(&self, id: NodeId) -> (u32, u32) {
        let mut string: u32 = 0;
        let mut length: u32 = 0;
        let mut node = id;

        while let Some(parent) = self.nodes[node].parent {
            length += 1;
            string >>= 1;
            if self.nodes[parent].one == Some(node) {
                string |= 0x8000_0000;
            }
            node = parent;
        }

        if length == 0 || length > 32 {
            if length > 32 {
                warn!("code length {} exceeds the 32 bit emission limit", length);
            }
            return (0, length);
        }

        (string >> (32 - length), length)
    }

    /// Best node to take a new symbol of `new_hits` hits: a placeholder or
    /// unsaturated branch anywhere wins outright, otherwise the node whose
    /// hits are closest below the target, shallower on ties.
    fn find_insert_point(&self, new_hits: u16) -> NodeId {
        let mut best = None;
        self.search_insert_point(new_hits, self.root, &mut best);
        best.unwrap_or(self.root)
    }

    fn default_qualifier(&self, id: NodeId) -> bool {
        let n = &self.nodes[id];
        (n.leaf && n.hits == 0) || (!n.leaf && (n.zero.is_none() || n.one.is_none()))
    }

    fn search_insert_point(&self, new_hits: u16, node: NodeId, best: &mut Option<NodeId>) {
        if best.is_none() {
            *best = Some(node);
        }
        let current = best.unwrap();
        if self.default_qualifier(current) {
            return;
        }

        if self.default_qualifier(node) {
            *best = Some(node);
            return;
        }

        let n = &self.nodes[node];
        let b = &self.nodes[current];
        if b.hits > new_hits {
            // Above the ideal zone: just chase the least hits.
            if n.hits < b.hits {
                *best = Some(node);
            }
        } else if n.hits <= new_hits {
            if n.hits > b.hits {
                *best = Some(node);
            } else if n.hits == b.hits && n.level < b.level {
                *best = Some(node);
            }
        }

        if !self.nodes[node].leaf {
            if let Some(z) = self.nodes[node].zero {
                self.search_insert_point(new_hits, z, best);
            }
            if let Some(current) = *best {
                if self.default_qualifier(current) {
                    return;
                }
            }
            if let Some(o) = self.nodes[node].one {
                self.search_insert_point(new_hits, o, best);
            }
        }
    }

    /// Replaces `at` with a fresh branch whose children are `at` and a new
    /// leaf; `direction` true puts the new leaf on the one path.
    fn fork(&mut self, at: NodeId, direction: bool, symbol: u32, hits: u16) -> NodeId {
        let parent = match self.nodes[at].parent {
            Some(p) => p,
            None => {
                warn!("attempted to fork the root node");
                return self.push_leaf(Some(at), hits, symbol);
            }
        };

        let leaf = self.push_leaf(None, hits, symbol);

        let level = self.nodes[parent].level + 1;
        self.nodes.push(HuffmanNode {
            leaf: false,
            parent: Some(parent),
            zero: None,
            one: None,
            level,
            symbol: 0,
            hits: self.nodes[at].hits.saturating_add(hits),
            leaves: self.nodes[at].leaves.saturating_add(1),
        });
        let branch = self.nodes.len() - 1;

        let (z, o) = if direction { (at, leaf) } else { (leaf, at) };
        self.nodes[branch].zero = Some(z);
        self.nodes[branch].one = Some(o);
        self.nodes[at].parent = Some(branch);
        self.nodes[leaf].parent = Some(branch);

        // Attaching the branch percolates the new hit and leaf counts and
        // cascades the level change through the moved subtree.
        if self.nodes[parent].zero == Some(at) {
            self.set_zero(parent, Some(branch));
        } else {
            self.set_one(parent, Some(branch));
        }

        leaf
    }

    /// Exchanges the tree positions of two nodes, rewiring both parents and
    /// percolating counters and levels.
    fn swap_nodes(&mut self, source: NodeId, target: NodeId) {
        let s_parent = self.nodes[source].parent;
        let t_parent = self.nodes[target].parent;
        let (s_parent, t_parent) = match (s_parent, t_parent) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                warn!("swap involving the root node was skipped");
                return;
            }
        };

        if s_parent == t_parent {
            if self.nodes[t_parent].zero == Some(target) {
                self.set_zero(t_parent, Some(source));
                self.set_one(s_parent, Some(target));
            } else {
                self.set_one(t_parent, Some(source));
                self.set_zero(s_parent, Some(target));
            }
            return;
        }

        if self.nodes[t_parent].zero == Some(target) {
            self.set_zero(t_parent, Some(source));
        } else {
            self.set_one(t_parent, Some(source));
        }
        self.nodes[target].parent = Some(s_parent);

        if self.nodes[s_parent].zero == Some(source) {
            self.set_zero(s_parent, Some(target));
        } else {
            self.set_one(s_parent, Some(target));
        }
        self.nodes[source].parent = Some(t_parent);
    }

    /// Greedy promotion: swap the node with the shallowest node whose hits
    /// do not exceed its own, then repeat at each ancestor up to level 2.
    fn promote(&mut self, id: NodeId) {
        let mut node = id;

        let target = self.locate_promote_point(node);
        if target != node {
            self.swap_nodes(node, target);
        }

        while self.nodes[node].level > 2 {
            node = match self.nodes[node].parent {
                Some(p) => p,
                None => break,
            };
            let target = self.locate_promote_point(node);
            if target != node {
                self.swap_nodes(node, target);
            }
        }
    }

    fn locate_promote_point(&self, reference: NodeId) -> NodeId {
        self.search_promote_point(reference, reference, self.root)
    }

    fn search_promote_point(&self, reference: NodeId, best: NodeId, search: NodeId) -> NodeId {
        let mut my_best = best;

        if self.nodes[search].hits <= self.nodes[reference].hits
            && self.nodes[search].level < self.nodes[my_best].level
        {
            // Swapping with an ancestor would wire a cycle into the tree.
            if self.is_ancestor(search, reference) {
                warn!("promotion target is an ancestor of the promoted node");
            } else {
                my_best = search;
            }
        }

        if !self.nodes[search].leaf {
            if let Some(z) = self.nodes[search].zero {
                my_best = self.search_promote_point(reference, my_best, z);
            }
            if let Some(o) = self.nodes[search].one {
                my_best = self.search_promote_point(reference, my_best, o);
            }
        }

        my_best
    }

    fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut cursor = self.nodes[node].parent;
        while let Some(p) = cursor {
            if p == candidate {
                return true;
            }
            cursor = self.nodes[p].parent;
        }
        false
    }

    /// Sets a node's hit count and percolates the delta to the root.
    fn set_hits(&mut self, id: NodeId, new_hits: u16) {
        let delta = new_hits as i32 - self.nodes[id].hits as i32;
        self.nodes[id].hits = new_hits;

        let mut cursor = self.nodes[id].parent;
        while let Some(p) = cursor {
            self.nodes[p].hits = (self.nodes[p].hits as i32 + delta).max(0) as u16;
            cursor = self.nodes[p].parent;
        }
    }

    fn set_leaves(&mut self, id: NodeId, new_leaves: u16) {
        let delta = new_leaves as i32 - self.nodes[id].leaves as i32;
        self.nodes[id].leaves = new_leaves;

        let mut cursor = self.nodes[id].parent;
        while let Some(p) = cursor {
            self.nodes[p].leaves = (self.nodes[p].leaves as i32 + delta).max(0) as u16;
            cursor = self.nodes[p].parent;
        }
    }

    /// Sets a node's level and cascades it down the subtree.
    fn set_level(&mut self, id: NodeId, new_level: u16) {
        self.nodes[id].level = new_level;

        if !self.nodes[id].leaf {
            if let Some(z) = self.nodes[id].zero {
                self.set_level(z, new_level + 1);
            }
            if let Some(o) = self.nodes[id].one {
                self.set_level(o, new_level + 1);
            }
        }
    }

    fn set_zero(&mut self, id: NodeId, child: Option<NodeId>) {
        if self.nodes[id].leaf {
            return;
        }

        self.nodes[id].zero = child;
        self.recount(id);

        if let Some(c) = child {
            let level = self.nodes[id].level + 1;
            self.set_level(c, level);
        }
    }

    fn set_one(&mut self, id: NodeId, child: Option<NodeId>) {
        if self.nodes[id].leaf {
            return;
        }

        self.nodes[id].one = child;
        self.recount(id);

        if let Some(c) = child {
            let level = self.nodes[id].level + 1;
            self.set_level(c, level);
        }
    }

    /// Recomputes a branch's hit and leaf counts from its children and
    /// percolates both deltas.
    fn recount(&mut self, id: NodeId) {
        let mut hits = 0u16;
        let mut leaves = 0u16;
        if let Some(z) = self.nodes[id].zero {
            hits = hits.saturating_add(self.nodes[z].hits);
            leaves = leaves.saturating_add(self.nodes[z].leaves);
        }
        if let Some(o) = self.nodes[id].one {
            hits = hits.saturating_add(self.nodes[o].hits);
            leaves = leaves.saturating_add(self.nodes[o].leaves);
        }

        self.set_hits(id, hits);
        self.set_leaves(id, leaves);
    }
}

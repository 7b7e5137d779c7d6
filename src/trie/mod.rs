//! A binary trie over left-aligned address bits.
//!
//! Nodes live in an arena (a `Vec`), and refer to their children by index.
//! Every node is reachable from exactly one parent, and traversal always
//! starts at the root, so no back references are needed. Both address
//! families share the same paths; each node carries one outcome slot per
//! family.
mod node;

pub(crate) use node::{NodeId, Slot, TrieNode};

use log::{log_enabled, trace};

use crate::types::af::{self, Family, FAMILIES};
use crate::types::errors::{FatalError, FatalResult};
use crate::types::match_options::Sense;
use crate::types::stats::TableStats;

//------------ PrefixTrie ----------------------------------------------------

#[derive(Clone, Debug, Default)]
pub(crate) struct PrefixTrie {
    // The root is allocated on the first insert, an empty trie owns no
    // nodes at all.
    nodes: Vec<TrieNode>,
    // The sequence number handed to the next slot that gets set.
    next_seq: u32,
    stats: TableStats,
}

impl PrefixTrie {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stats.total_prefixes() == 0
    }

    pub(crate) fn stats(&self) -> TableStats {
        self.stats
    }

    pub(crate) fn next_seq(&self) -> u32 {
        self.next_seq
    }

    fn node(&self, id: NodeId) -> Option<&TrieNode> {
        self.nodes.get(id.as_index())
    }

    fn node_mut(&mut self, id: NodeId) -> FatalResult<&mut TrieNode> {
        self.nodes.get_mut(id.as_index()).ok_or(FatalError)
    }

    fn alloc_node(&mut self) -> FatalResult<NodeId> {
        let id = NodeId::new(self.nodes.len()).ok_or(FatalError)?;
        self.nodes.try_reserve(1).map_err(|_| FatalError)?;
        self.nodes.push(TrieNode::default());
        self.stats.nodes += 1;
        Ok(id)
    }

    /// Walk the trie along the first `len` bits of `bits`, creating nodes
    /// where they don't exist yet, and return the node at depth `len`. The
    /// node is returned as is, its slots are left untouched.
    pub(crate) fn insert(&mut self, bits: u128, len: u8) -> FatalResult<NodeId> {
        if self.nodes.is_empty() {
            self.alloc_node()?;
        }

        let mut cur = NodeId::ROOT;
        for depth in 0..len {
            let bit = af::bit_at(bits, depth);
            cur = match self.node(cur).and_then(|n| n.child(bit)) {
                Some(next) => next,
                None => {
                    let next = self.alloc_node()?;
                    self.node_mut(cur)?.set_child(bit, next);
                    next
                }
            };
        }

        Ok(cur)
    }

    /// Store `sense` for `family` at node `id`, if that slot is still unset.
    /// Returns whether the slot was written.
    pub(crate) fn set_slot(
        &mut self,
        id: NodeId,
        family: Family,
        sense: Sense,
    ) -> FatalResult<bool> {
        let slot = Slot {
            sense,
            seq: self.next_seq,
        };
        let written = self.set_slot_with_seq(id, family, slot)?;
        if written {
            self.next_seq = self.next_seq.saturating_add(1);
        }
        Ok(written)
    }

    /// Like [Self::set_slot], but with a sequence number chosen by the
    /// caller. Used when merging tables.
    pub(crate) fn set_slot_with_seq(
        &mut self,
        id: NodeId,
        family: Family,
        slot: Slot,
    ) -> FatalResult<bool> {
        let written = self.node_mut(id)?.set_slot_if_unset(family, slot);
        if written {
            self.stats.inc_prefixes(family);
        }
        Ok(written)
    }

    pub(crate) fn bump_next_seq(&mut self, seq: u32) {
        self.next_seq = self.next_seq.max(seq);
    }

    /// Find the most specific stored prefix of `family` that covers `bits`.
    /// Returns its slot and its length. Never allocates.
    pub(crate) fn lookup(&self, family: Family, bits: u128) -> Option<(Slot, u8)> {
        let mut node = self.node(NodeId::ROOT)?;
        let mut best = node.slot(family).map(|s| (s, 0));
        let mut depth = 0;

        while depth < family.bits() {
            match node.child(af::bit_at(bits, depth)).and_then(|id| self.node(id)) {
                Some(next) => {
                    node = next;
                    depth += 1;
                    if let Some(slot) = node.slot(family) {
                        best = Some((slot, depth));
                    }
                }
                None => break,
            }
        }

        if log_enabled!(log::Level::Trace) {
            trace!(
                "lookup {}: {:?}",
                af::from_bits(family, bits),
                best.map(|(s, len)| (s.sense, len))
            );
        }

        best
    }

    /// Iterate over all nodes that hold at least one outcome, parents before
    /// children, left before right.
    pub(crate) fn walk(&self) -> Walk<'_> {
        Walk {
            trie: self,
            stack: if self.nodes.is_empty() {
                vec![]
            } else {
                vec![(NodeId::ROOT, 0, 0)]
            },
        }
    }
}

//------------ Walk ----------------------------------------------------------

/// A stored node as seen by [Walk]: its path and its slots.
#[derive(Copy, Clone, Debug)]
pub(crate) struct WalkedNode {
    pub(crate) bits: u128,
    pub(crate) len: u8,
    pub(crate) slots: [Option<Slot>; FAMILIES],
}

pub(crate) struct Walk<'a> {
    trie: &'a PrefixTrie,
    stack: Vec<(NodeId, u128, u8)>,
}

impl Iterator for Walk<'_> {
    type Item = WalkedNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, bits, len)) = self.stack.pop() {
            let Some(node) = self.trie.node(id) else {
                continue;
            };

            // Push right first, so that the left subtree comes out first.
            for bit in [1, 0] {
                if let Some(child) = node.child(bit) {
                    self.stack.push((child, af::with_bit(bits, len, bit), len + 1));
                }
            }

            let slots = node.slots();
            if slots.iter().any(|s| s.is_some()) {
                return Some(WalkedNode { bits, len, slots });
            }
        }
        None
    }
}

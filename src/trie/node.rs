use crate::types::af::{Family, FAMILIES};
use crate::types::match_options::Sense;

//------------ NodeId --------------------------------------------------------

/// The index of a node in the arena of its trie. The root, once allocated,
/// always lives at index 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) const ROOT: NodeId = NodeId(0);

    pub(crate) fn new(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(NodeId)
    }

    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

//------------ Slot ----------------------------------------------------------

/// The outcome stored for one family at one node, together with the order
/// in which it was stored in its table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) sense: Sense,
    pub(crate) seq: u32,
}

//------------ TrieNode ------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub(crate) struct TrieNode {
    // left (bit 0) and right (bit 1) child.
    children: [Option<NodeId>; 2],
    data: [Option<Slot>; FAMILIES],
}

impl TrieNode {
    pub(crate) fn child(&self, bit: usize) -> Option<NodeId> {
        self.children.get(bit).copied().flatten()
    }

    pub(crate) fn set_child(&mut self, bit: usize, id: NodeId) {
        if let Some(c) = self.children.get_mut(bit) {
            *c = Some(id);
        }
    }

    pub(crate) fn slot(&self, family: Family) -> Option<Slot> {
        self.data.get(family.index()).copied().flatten()
    }

    /// Set the slot for `family`, unless it already holds an outcome. The
    /// first writer wins. Returns whether the slot was written.
    pub(crate) fn set_slot_if_unset(
        &mut self,
        family: Family,
        slot: Slot,
    ) -> bool {
        match self.data.get_mut(family.index()) {
            Some(s @ None) => {
                *s = Some(slot);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn slots(&self) -> [Option<Slot>; FAMILIES] {
        self.data
    }
}

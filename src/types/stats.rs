//------------ Types for Statistics -----------------------------------------

use std::fmt::{Debug, Display};

use crate::types::af::{Family, FAMILIES};

/// Size information for an address table.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct TableStats {
    /// number of allocated trie nodes, root included.
    pub nodes: usize,
    // number of stored prefixes, per family.
    prefixes: [usize; FAMILIES],
}

impl TableStats {
    pub(crate) fn inc_prefixes(&mut self, family: Family) {
        if let Some(p) = self.prefixes.get_mut(family.index()) {
            *p += 1;
        }
    }

    pub fn prefixes_count(&self, family: Family) -> usize {
        self.prefixes.get(family.index()).copied().unwrap_or(0)
    }

    pub fn total_prefixes(&self) -> usize {
        self.prefixes.iter().sum()
    }
}

impl Debug for TableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStats")
            .field("nodes", &self.nodes)
            .field("v4", &self.prefixes_count(Family::V4))
            .field("v6", &self.prefixes_count(Family::V6))
            .finish()
    }
}

impl Display for TableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes:{:>8} ipv4 prefixes:{:>8} ipv6 prefixes:{:>8}",
            self.nodes,
            self.prefixes_count(Family::V4),
            self.prefixes_count(Family::V6)
        )
    }
}

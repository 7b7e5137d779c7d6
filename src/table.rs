//! Shared, reference counted address tables.
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, log_enabled, trace};

use crate::trie::{PrefixTrie, Slot};
use crate::types::af::{self, Family};
use crate::types::errors::AclError;
use crate::types::match_options::Sense;
use crate::types::prefix::Prefix;
use crate::types::stats::TableStats;

//------------ TableMatch ----------------------------------------------------

/// The most specific entry in a table that covers a probe address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableMatch {
    pub sense: Sense,
    /// The length of the matching prefix.
    pub specificity: u8,
    /// The position of the entry in the order the table was built in.
    pub seq: u32,
}

//------------ AddressTable --------------------------------------------------

/// A set of prefixes, each with a [Sense], answering longest-prefix queries
/// for IPv4 and IPv6 addresses.
///
/// A table is built by a single owner with [AddressTable::add_prefix] and
/// [AddressTable::merge], and is then shared by cloning the handle
/// ([AddressTable::attach]). Once shared, the table is immutable: the
/// mutating methods return [AclError::TableShared]. Dropping the last handle
/// destroys the trie.
#[derive(Clone, Debug, Default)]
pub struct AddressTable {
    trie: Arc<PrefixTrie>,
}

impl AddressTable {
    /// Create an empty table, holding a single handle.
    pub fn new() -> Self {
        Self {
            trie: Arc::new(PrefixTrie::new()),
        }
    }

    fn trie_mut(&mut self) -> Result<&mut PrefixTrie, AclError> {
        Arc::get_mut(&mut self.trie).ok_or(AclError::TableShared)
    }

    /// Add a prefix with the given sense. If the table already holds an
    /// outcome for this exact prefix and family, the table is left as is:
    /// the first insertion wins.
    ///
    /// A zero-length prefix ("any") is stored for all address families at
    /// once, whatever the family of `prefix`.
    pub fn add_prefix(
        &mut self,
        prefix: &Prefix,
        sense: Sense,
    ) -> Result<(), AclError> {
        let trie = self.trie_mut()?;
        let id = trie.insert(prefix.bits(), prefix.len())?;

        if prefix.is_any() {
            for family in Family::ALL {
                trie.set_slot(id, family, sense)?;
            }
        } else if !trie.set_slot(id, prefix.family(), sense)? {
            debug!("{} already present, keeping first insertion", prefix);
        }
        Ok(())
    }

    /// Re-insert every entry of `src` into this table, following the
    /// first-insertion-wins rule.
    ///
    /// With `pos` set to false the merge is negated: positive entries of
    /// `src` are stored as negative. Negative entries of `src` stay negative,
    /// a negated merge never turns a deny into a permit.
    ///
    /// The entries of `src` are ordered after the entries already present.
    pub fn merge(&mut self, src: &AddressTable, pos: bool) -> Result<(), AclError> {
        let base = self.trie.next_seq();
        let trie = self.trie_mut()?;

        for walked in src.trie.walk() {
            let id = trie.insert(walked.bits, walked.len)?;
            for family in Family::ALL {
                let Some(slot) = walked.slots.get(family.index()).copied().flatten()
                else {
                    continue;
                };
                let sense = if pos {
                    slot.sense
                } else {
                    slot.sense.negate_if(true)
                };
                trie.set_slot_with_seq(
                    id,
                    family,
                    Slot {
                        sense,
                        seq: base.saturating_add(slot.seq),
                    },
                )?;
            }
        }
        trie.bump_next_seq(base.saturating_add(src.trie.next_seq()));

        debug!(
            "merged {} prefixes ({}), table now holds {}",
            src.trie.stats().total_prefixes(),
            if pos { "positive" } else { "negated" },
            trie.stats().total_prefixes()
        );
        Ok(())
    }

    /// Get another handle to this table.
    pub fn attach(&self) -> Self {
        self.clone()
    }

    /// Give up this handle. Returns true if this was the last handle, and
    /// the table has been destroyed.
    pub fn detach(self) -> bool {
        Arc::into_inner(self.trie).is_some()
    }

    /// The number of live handles to this table.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.trie)
    }

    /// Whether both handles refer to the same table.
    pub fn ptr_eq(&self, other: &AddressTable) -> bool {
        Arc::ptr_eq(&self.trie, &other.trie)
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Find the most specific entry covering `addr`. Returns `None` if the
    /// table has no entry for the family of `addr` that covers it.
    pub fn lookup(&self, addr: IpAddr) -> Option<TableMatch> {
        let (family, bits) = af::into_bits(addr);
        let res = self.trie.lookup(family, bits).map(|(slot, len)| TableMatch {
            sense: slot.sense,
            specificity: len,
            seq: slot.seq,
        });
        if log_enabled!(log::Level::Trace) {
            trace!("table lookup {} -> {:?}", addr, res);
        }
        res
    }

    /// All stored prefixes with their sense, parents before children.
    pub fn entries(&self) -> Vec<(Prefix, Sense)> {
        let mut entries = vec![];
        for walked in self.trie.walk() {
            for family in Family::ALL {
                if walked.len > family.bits() {
                    continue;
                }
                if let Some(slot) = walked.slots.get(family.index()).copied().flatten() {
                    if let Ok(pfx) = Prefix::new(family, walked.bits, walked.len) {
                        entries.push((pfx, slot.sense));
                    }
                }
            }
        }
        entries
    }

    pub fn stats(&self) -> TableStats {
        self.trie.stats()
    }

    /// Build a table from `(prefix, sense)` pairs, in order.
    pub fn from_prefixes<I>(iter: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = (Prefix, Sense)>,
    {
        let mut table = Self::new();
        for (pfx, sense) in iter {
            table.add_prefix(&pfx, sense)?;
        }
        Ok(table)
    }
}

//! Ordering of response addresses by their closeness to a client.
//!
//! A sortlist is an [Acl] whose elements are evaluated against the client
//! address. The first element that permits the client decides how the
//! addresses in a response are ordered:
//!
//! * A plain element, e.g. `10.0.0.0/8`, puts the addresses it permits
//!   first. For a nested list that is the element of the list that
//!   permitted the client.
//! * A pair `{ client; order; }` matches the client against its first entry,
//!   and ranks addresses by the second entry. If the second entry is a
//!   nested list or one of the run time sets, addresses are ranked by how
//!   specific the entry is that they match. Any other second entry is used
//!   like a plain element.
//!
//! A pair with more than two entries, or with a negated client entry, is
//! not something the sortlist can work with. It disables sorting for the
//! client altogether, without affecting anything else in the policy.
//!
//! The run time sets are read once, when the [SortSpec] is made. Ranking
//! never looks at the [AclEnv], so a spec orders addresses the same way for
//! as long as it lives.
use std::cmp::Ordering;
use std::net::IpAddr;

use log::{debug, log_enabled, trace};

use crate::acl::{Acl, AclElement, Unbound};
use crate::env::{AclEnv, EnvSnapshot};
use crate::table::AddressTable;
use crate::types::af;
use crate::types::errors::FatalResult;
use crate::types::match_options::{AclMatch, Sense};

//------------ Rank ----------------------------------------------------------

/// The distance of an address to a client. Lower is closer.
pub type Rank = u64;

/// The rank of an address that matches a plain sortlist element.
pub const RANK_MATCHED: Rank = 0;

/// The rank of an address that a sortlist entry says nothing about. It sits
/// exactly in the middle: closer than any explicitly denied address,
/// further than any permitted one.
pub const RANK_UNMATCHED: Rank = Rank::MAX / 2;

/// The worst rank, for addresses that don't match a plain element.
pub const RANK_MAX: Rank = Rank::MAX;

// The longest prefix of any family.
const MAX_SPECIFICITY: Rank = 128;

/// The rank of an address permitted by an order entry. More specific
/// entries rank closer; equally specific entries rank in the order they
/// were listed in.
pub fn positive_rank(specificity: u8, seq: u32) -> Rank {
    ((MAX_SPECIFICITY - Rank::from(specificity.min(128))) << 32) | Rank::from(seq)
}

/// The rank of an address denied by an order entry. Always further than
/// [RANK_UNMATCHED]; more specific denies rank closer than less specific
/// ones.
pub fn negative_rank(specificity: u8) -> Rank {
    RANK_MAX - Rank::from(specificity)
}

//------------ SortSpec ------------------------------------------------------

/// How to order addresses for one particular client.
///
/// Derived once per request with [SortSpec::new], then only read. Ranking is
/// a pure function of the spec and the address. Cloning is cheap.
#[derive(Clone, Debug, Default)]
pub enum SortSpec {
    /// No sortlist entry applies to the client, addresses are left in the
    /// order they came in.
    #[default]
    None,
    /// Addresses that match the element come first. Named sets in the
    /// element match nothing, [SortSpec::new] replaces them by their
    /// tables.
    OneElement(AclElement),
    /// Addresses are ranked by their longest match in the table.
    TwoElement(AddressTable),
}

impl SortSpec {
    /// Find the first entry of `sortlist` that applies to `client`.
    pub fn new(sortlist: &Acl, client: IpAddr, env: &AclEnv) -> Self {
        let client = af::unmap_ipv4(client);
        // One consistent view of the run time sets for the whole setup.
        let snapshot = env.snapshot();

        for (index, elm) in sortlist.elements().iter().enumerate() {
            // The negation of the pair itself is not looked at, only that
            // of its client entry.
            let (client_elm, order_elm) = match elm {
                AclElement::Nested { acl: inner, .. } => match inner.elements() {
                    [] => (elm, None),
                    [first, ..] if first.is_negated() => {
                        debug!(
                            "sortlist entry {} has a negated client match, \
                             not sorting",
                            index
                        );
                        return SortSpec::None;
                    }
                    [first] => (first, None),
                    [first, order] => (first, Some(order)),
                    _ => {
                        debug!(
                            "sortlist entry {} has {} elements, not sorting",
                            index,
                            inner.len()
                        );
                        return SortSpec::None;
                    }
                },
                _ => (elm, None),
            };

            if client_elm.evaluate(client, &snapshot) != Some(Sense::Positive) {
                continue;
            }

            if log_enabled!(log::Level::Trace) {
                trace!("client {} matched sortlist entry {}", client, index);
            }

            return match Self::resolve(client_elm, order_elm, client, &snapshot) {
                Ok(spec) => spec,
                Err(err) => {
                    debug!("sortlist entry {}: {}, not sorting", index, err);
                    SortSpec::None
                }
            };
        }

        SortSpec::None
    }

    fn resolve(
        client_elm: &AclElement,
        order_elm: Option<&AclElement>,
        client: IpAddr,
        snapshot: &EnvSnapshot,
    ) -> FatalResult<Self> {
        Ok(match order_elm {
            None => SortSpec::OneElement(
                innermost_match(client_elm, client, snapshot)
                    .resolve_named(snapshot)?,
            ),
            Some(AclElement::Nested { acl, .. }) => SortSpec::TwoElement(
                acl.resolve_named(snapshot)?.order_table().attach(),
            ),
            Some(AclElement::Named { set, .. }) => {
                SortSpec::TwoElement(snapshot.table(*set).attach())
            }
            Some(other) => SortSpec::OneElement(other.clone()),
        })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SortSpec::None)
    }

    /// The rank of `addr`. Returns `None` if there is nothing to sort by.
    pub fn rank(&self, addr: IpAddr) -> Option<Rank> {
        let addr = af::unmap_ipv4(addr);
        match self {
            SortSpec::None => None,
            SortSpec::OneElement(elm) => {
                Some(match elm.evaluate(addr, &Unbound) {
                    Some(Sense::Positive) => RANK_MATCHED,
                    _ => RANK_MAX,
                })
            }
            SortSpec::TwoElement(table) => Some(match table.lookup(addr) {
                Some(m) if m.sense == Sense::Positive => {
                    positive_rank(m.specificity, m.seq)
                }
                Some(m) => negative_rank(m.specificity),
                None => RANK_UNMATCHED,
            }),
        }
    }

    /// Order two addresses by their rank. Without a sort order all addresses
    /// are equal.
    pub fn compare(&self, a: IpAddr, b: IpAddr) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            _ => Ordering::Equal,
        }
    }

    /// Sort `addrs` closest first. Addresses of equal rank keep their
    /// relative order.
    pub fn sort(&self, addrs: &mut [IpAddr]) {
        if self.is_none() {
            return;
        }
        addrs.sort_by_key(|a| self.rank(*a));
    }
}

// The element that permitted `client`: for a nested list, the element of
// that list that did, all the way down.
fn innermost_match<'a>(
    elm: &'a AclElement,
    client: IpAddr,
    snapshot: &EnvSnapshot,
) -> &'a AclElement {
    match elm {
        AclElement::Nested {
            acl,
            negated: false,
        } => match acl.find_in(client, snapshot) {
            AclMatch::Match {
                index,
                sense: Sense::Positive,
            } => acl
                .element(index)
                .map_or(elm, |inner| innermost_match(inner, client, snapshot)),
            _ => elm,
        },
        _ => elm,
    }
}

//! Address match lists.
//!
//! An [Acl] is an ordered list of [AclElement]s. Matching walks the list in
//! order, and the first element that has a definite outcome for the address
//! decides, whether that outcome is a permit or a deny. A more specific
//! entry further down the list never overrides an element that came before
//! it.
//!
//! ```
//! use std::str::FromStr;
//! use prefix_acl::{build_acl, AclEnv, Decision, Prefix, Rule, Sense};
//!
//! let acl = build_acl(&[
//!     Rule::Prefix {
//!         prefix: Prefix::from_str("10.0.0.0/8").unwrap(),
//!         sense: Sense::Positive,
//!     },
//!     Rule::Prefix {
//!         prefix: Prefix::from_str("10.1.0.0/16").unwrap(),
//!         sense: Sense::Negative,
//!     },
//! ]).unwrap();
//!
//! let env = AclEnv::new();
//! let client = "10.1.2.3".parse().unwrap();
//! assert_eq!(acl.check(client, &env), Decision::Permit);
//! ```
mod element;

pub use element::{AclElement, NamedSet};
pub(crate) use element::{NamedSets, Unbound};

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, log_enabled, trace};

use crate::env::{AclEnv, EnvSnapshot};
use crate::table::AddressTable;
use crate::types::af::{self, Family};
use crate::types::errors::{FatalError, FatalResult};
use crate::types::match_options::{
    AclMatch, Decision, MatchOptions, QueryResult, Sense,
};
use crate::types::prefix::Prefix;

//------------ Acl -----------------------------------------------------------

/// An immutable, ordered list of match targets.
///
/// Cloning an `Acl` is cheap, all clones share the same elements. A policy
/// change is made by building a new `Acl` and swapping it in, never by
/// changing one that may be in use.
#[derive(Clone, Debug, Default)]
pub struct Acl {
    inner: Arc<AclInner>,
}

#[derive(Debug, Default)]
struct AclInner {
    elements: Vec<AclElement>,
    // All address entries of this list and its nested lists, flattened into
    // one table. Used when this list is the order clause of a sortlist.
    order: AddressTable,
    has_named: bool,
}

impl Acl {
    pub fn new(elements: Vec<AclElement>) -> FatalResult<Self> {
        let order = Self::flatten(&elements)?;
        let has_named = elements.iter().any(AclElement::has_named);
        debug!(
            "built acl with {} elements, {} order prefixes",
            elements.len(),
            order.stats().total_prefixes()
        );
        Ok(Self {
            inner: Arc::new(AclInner {
                elements,
                order,
                has_named,
            }),
        })
    }

    /// An ACL without elements. It matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    // Merge the tables of all elements in order. Each element is merged
    // with the sense of its negation, so that a deny in a nested list stays
    // a deny. Named sets change at run time and are left out.
    fn flatten(elements: &[AclElement]) -> FatalResult<AddressTable> {
        let mut order = AddressTable::new();
        for elm in elements {
            let res = match elm {
                AclElement::Table { table, negated } => order.merge(table, !negated),
                AclElement::Nested { acl, negated } => {
                    order.merge(acl.order_table(), !negated)
                }
                AclElement::Named { set, .. } => {
                    debug!("{} is resolved at match time, not flattened", set);
                    Ok(())
                }
            };
            // `order` is never shared at this point, so the only possible
            // error is a failed allocation.
            res.map_err(|_| FatalError)?;
        }
        Ok(order)
    }

    pub fn elements(&self) -> &[AclElement] {
        &self.inner.elements
    }

    pub fn element(&self, index: usize) -> Option<&AclElement> {
        self.inner.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.inner.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.elements.is_empty()
    }

    /// The address entries of this list and all its nested lists, in one
    /// table.
    pub fn order_table(&self) -> &AddressTable {
        &self.inner.order
    }

    /// Whether any element, or any element of a nested list, is a named
    /// set.
    pub fn has_named(&self) -> bool {
        self.inner.has_named
    }

    /// A copy of this list with all named sets replaced by their tables in
    /// `snapshot`, see [AclElement::resolve_named]. Lists without named sets
    /// are returned as they are.
    pub fn resolve_named(&self, snapshot: &EnvSnapshot) -> FatalResult<Self> {
        if !self.has_named() {
            return Ok(self.clone());
        }
        let mut elements = Vec::new();
        elements.try_reserve(self.len()).map_err(|_| FatalError)?;
        for elm in self.elements() {
            elements.push(elm.resolve_named(snapshot)?);
        }
        Acl::new(elements)
    }

    /// Walk the elements in order and return the first definite outcome.
    /// `addr` is matched as is, see [Acl::match_addr] for address mapping.
    pub fn find(&self, addr: IpAddr, env: &AclEnv) -> AclMatch {
        self.find_in(addr, env)
    }

    pub(crate) fn find_in<S>(&self, addr: IpAddr, sets: &S) -> AclMatch
    where
        S: NamedSets + ?Sized,
    {
        for (index, elm) in self.inner.elements.iter().enumerate() {
            if let Some(sense) = elm.evaluate(addr, sets) {
                if log_enabled!(log::Level::Trace) {
                    trace!("{} matched element {} ({})", addr, index, sense);
                }
                return AclMatch::Match { index, sense };
            }
        }
        AclMatch::NoMatch
    }

    /// Match `addr` against this list.
    pub fn match_addr(
        &self,
        addr: IpAddr,
        env: &AclEnv,
        options: &MatchOptions,
    ) -> QueryResult<'_> {
        let addr = if options.map_ipv4 {
            af::unmap_ipv4(addr)
        } else {
            addr
        };

        let outcome = self.find(addr, env);
        let element = match (options.include_element, outcome) {
            (true, AclMatch::Match { index, .. }) => self.element(index),
            _ => None,
        };

        QueryResult { outcome, element }
    }

    /// The authorization decision for `addr`, with default options.
    pub fn check(&self, addr: IpAddr, env: &AclEnv) -> Decision {
        self.match_addr(addr, env, &MatchOptions::default()).decision()
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ ")?;
        for elm in self.elements() {
            write!(f, "{}; ", elm)?;
        }
        write!(f, "}}")
    }
}

//------------ Rule ----------------------------------------------------------

/// A parsed address match list entry, as produced by a configuration
/// parser. See [build_acl].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// An address prefix that denotes a permit or a deny.
    Prefix { prefix: Prefix, sense: Sense },
    /// All addresses of all families: `any` (positive) or `none`
    /// (negative).
    Any { sense: Sense },
    /// One of the run time address sets.
    Named { set: NamedSet, negated: bool },
    /// A nested list.
    Nested { rules: Vec<Rule>, negated: bool },
}

/// Build an [Acl] from parsed rules, keeping their order. Every rule becomes
/// one element.
///
/// This only fails when memory runs out, in which case nothing of the
/// list is kept.
pub fn build_acl(rules: &[Rule]) -> FatalResult<Acl> {
    let mut elements = Vec::new();
    elements.try_reserve(rules.len()).map_err(|_| FatalError)?;

    for rule in rules {
        let elm = match rule {
            Rule::Prefix { prefix, sense } => {
                AclElement::table(single(prefix, *sense)?, false)
            }
            Rule::Any { sense } => {
                AclElement::table(single(&Prefix::any(Family::V4), *sense)?, false)
            }
            Rule::Named { set, negated } => AclElement::Named {
                set: *set,
                negated: *negated,
            },
            Rule::Nested { rules, negated } => AclElement::Nested {
                acl: build_acl(rules)?,
                negated: *negated,
            },
        };
        elements.push(elm);
    }

    Acl::new(elements)
}

fn single(prefix: &Prefix, sense: Sense) -> FatalResult<AddressTable> {
    let mut table = AddressTable::new();
    // A validated prefix on a fresh table can only fail to allocate.
    table.add_prefix(prefix, sense).map_err(|_| FatalError)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::str::FromStr;

    fn pfx(s: &str, sense: Sense) -> Result<Rule, Box<dyn Error>> {
        Ok(Rule::Prefix {
            prefix: Prefix::from_str(s)?,
            sense,
        })
    }

    fn addr(s: &str) -> Result<IpAddr, Box<dyn Error>> {
        Ok(IpAddr::from_str(s)?)
    }

    #[test]
    fn first_reached_element_decides() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        let acl = build_acl(&[
            pfx("192.168.1.0/24", Sense::Negative)?,
            pfx("192.168.0.0/16", Sense::Positive)?,
        ])?;

        assert_eq!(acl.check(addr("192.168.1.7")?, &env), Decision::Deny);
        assert_eq!(acl.check(addr("192.168.2.7")?, &env), Decision::Permit);
        assert_eq!(acl.check(addr("10.0.0.1")?, &env), Decision::Unmatched);
        Ok(())
    }

    #[test]
    fn negated_nested_list_never_permits() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        // !{ !10.1.0.0/16; 10.0.0.0/8; }; any;
        let acl = build_acl(&[
            Rule::Nested {
                rules: vec![
                    pfx("10.1.0.0/16", Sense::Negative)?,
                    pfx("10.0.0.0/8", Sense::Positive)?,
                ],
                negated: true,
            },
            Rule::Any {
                sense: Sense::Positive,
            },
        ])?;

        // Permitted by the nested list, so denied by its negation.
        assert_eq!(acl.check(addr("10.2.0.1")?, &env), Decision::Deny);
        // Denied by the nested list: no match, falls through to `any`.
        assert_eq!(acl.check(addr("10.1.0.1")?, &env), Decision::Permit);
        Ok(())
    }

    #[test]
    fn negated_table_keeps_deny_entries() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        let mut table = AddressTable::new();
        table.add_prefix(&Prefix::from_str("10.0.0.0/8")?, Sense::Negative)?;
        let acl = Acl::new(vec![AclElement::table(table, true)])?;

        assert_eq!(acl.check(addr("10.0.0.1")?, &env), Decision::Deny);
        Ok(())
    }

    #[test]
    fn empty_nested_list_is_skipped() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        let acl = build_acl(&[
            Rule::Nested {
                rules: vec![],
                negated: false,
            },
            pfx("2001:db8::/32", Sense::Positive)?,
        ])?;

        let res = acl.match_addr(
            addr("2001:db8::53")?,
            &env,
            &MatchOptions {
                include_element: true,
                ..Default::default()
            },
        );
        assert_eq!(
            res.outcome,
            AclMatch::Match {
                index: 1,
                sense: Sense::Positive
            }
        );
        assert!(res.element.is_some());
        Ok(())
    }

    #[test]
    fn mapped_ipv4_matches_ipv4_entries() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        let acl = build_acl(&[pfx("192.0.2.0/24", Sense::Positive)?])?;
        let mapped = addr("::ffff:192.0.2.10")?;

        assert_eq!(acl.check(mapped, &env), Decision::Permit);
        let res = acl.match_addr(
            mapped,
            &env,
            &MatchOptions {
                include_element: false,
                map_ipv4: false,
            },
        );
        assert_eq!(res.decision(), Decision::Unmatched);
        assert!(res.element.is_none());
        Ok(())
    }

    #[test]
    fn order_table_flattens_nested_lists() -> Result<(), Box<dyn Error>> {
        let acl = build_acl(&[
            pfx("10.1.0.0/16", Sense::Positive)?,
            Rule::Nested {
                rules: vec![pfx("10.2.0.0/16", Sense::Positive)?],
                negated: true,
            },
            Rule::Named {
                set: NamedSet::Localnets,
                negated: false,
            },
        ])?;

        let order = acl.order_table();
        assert_eq!(order.stats().total_prefixes(), 2);
        assert_eq!(
            order.lookup(addr("10.2.3.4")?).map(|m| (m.sense, m.seq)),
            Some((Sense::Negative, 1))
        );
        Ok(())
    }

    #[test]
    fn resolved_named_sets_keep_their_tables() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        env.refresh_from_interfaces(&[(addr("192.0.2.1")?, 24)])?;
        // { 10.0.0.0/8; !localhost; localnets; }
        let acl = build_acl(&[
            pfx("10.0.0.0/8", Sense::Positive)?,
            Rule::Named {
                set: NamedSet::Localhost,
                negated: true,
            },
            Rule::Named {
                set: NamedSet::Localnets,
                negated: false,
            },
        ])?;
        assert!(acl.has_named());
        assert_eq!(acl.order_table().stats().total_prefixes(), 1);

        let resolved = acl.resolve_named(&env.snapshot())?;
        assert!(!resolved.has_named());
        assert_eq!(resolved.order_table().stats().total_prefixes(), 3);

        env.refresh_from_interfaces(&[])?;
        for (a, decision) in [
            ("192.0.2.1", Decision::Deny),
            ("192.0.2.9", Decision::Permit),
            ("198.51.100.1", Decision::Unmatched),
        ] {
            assert_eq!(resolved.check(addr(a)?, &env), decision, "{}", a);
            assert_eq!(acl.check(addr(a)?, &env), Decision::Unmatched, "{}", a);
        }

        let plain = build_acl(&[pfx("10.0.0.0/8", Sense::Positive)?])?;
        assert!(!plain.has_named());
        let same = plain.resolve_named(&env.snapshot())?;
        assert_eq!(same.to_string(), plain.to_string());
        Ok(())
    }
}

use std::fmt;
use std::net::IpAddr;

use crate::acl::Acl;
use crate::env::{AclEnv, EnvSnapshot};
use crate::table::{AddressTable, TableMatch};
use crate::types::errors::FatalResult;
use crate::types::match_options::{AclMatch, Sense};

//------------ NamedSet ------------------------------------------------------

/// The address sets that are only known at run time, and are looked up in
/// the [AclEnv] for every match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NamedSet {
    /// The addresses of the local interfaces.
    Localhost,
    /// The networks the local interfaces are attached to.
    Localnets,
}

impl fmt::Display for NamedSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NamedSet::Localhost => write!(f, "localhost"),
            NamedSet::Localnets => write!(f, "localnets"),
        }
    }
}

//------------ NamedSets -----------------------------------------------------

/// Where [NamedSet] elements are looked up while an element is evaluated.
pub(crate) trait NamedSets {
    fn lookup(&self, set: NamedSet, addr: IpAddr) -> Option<TableMatch>;
}

impl NamedSets for AclEnv {
    fn lookup(&self, set: NamedSet, addr: IpAddr) -> Option<TableMatch> {
        self.lookup(set, addr)
    }
}

impl NamedSets for EnvSnapshot {
    fn lookup(&self, set: NamedSet, addr: IpAddr) -> Option<TableMatch> {
        self.table(set).lookup(addr)
    }
}

/// No named sets at all. Elements that had their named sets resolved with
/// [AclElement::resolve_named] don't need any.
pub(crate) struct Unbound;

impl NamedSets for Unbound {
    fn lookup(&self, _set: NamedSet, _addr: IpAddr) -> Option<TableMatch> {
        None
    }
}

//------------ AclElement ----------------------------------------------------

/// One entry of an [Acl].
///
/// Every kind of element can be negated. Negation only ever turns a permit
/// into a deny: a deny entry in a negated table stays a deny, and a nested
/// ACL or named set that denies an address is no match at all for the
/// enclosing list.
#[derive(Clone, Debug)]
pub enum AclElement {
    Table { table: AddressTable, negated: bool },
    Nested { acl: Acl, negated: bool },
    Named { set: NamedSet, negated: bool },
}

impl AclElement {
    pub fn table(table: AddressTable, negated: bool) -> Self {
        AclElement::Table { table, negated }
    }

    pub fn nested(acl: Acl) -> Self {
        AclElement::Nested {
            acl,
            negated: false,
        }
    }

    pub fn named(set: NamedSet) -> Self {
        AclElement::Named {
            set,
            negated: false,
        }
    }

    /// Flip the negation flag.
    pub fn negate(self) -> Self {
        match self {
            AclElement::Table { table, negated } => AclElement::Table {
                table,
                negated: !negated,
            },
            AclElement::Nested { acl, negated } => AclElement::Nested {
                acl,
                negated: !negated,
            },
            AclElement::Named { set, negated } => AclElement::Named {
                set,
                negated: !negated,
            },
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            AclElement::Table { negated, .. }
            | AclElement::Nested { negated, .. }
            | AclElement::Named { negated, .. } => *negated,
        }
    }

    /// The definite outcome of this element for `addr`, if it has one.
    /// `None` means the element does not apply and the next element of the
    /// enclosing list should be tried.
    pub(crate) fn evaluate<S>(&self, addr: IpAddr, sets: &S) -> Option<Sense>
    where
        S: NamedSets + ?Sized,
    {
        match self {
            AclElement::Table { table, negated } => {
                table.lookup(addr).map(|m| m.sense.negate_if(*negated))
            }
            AclElement::Nested { acl, negated } => match acl.find_in(addr, sets) {
                AclMatch::Match {
                    sense: Sense::Positive,
                    ..
                } => Some(Sense::Positive.negate_if(*negated)),
                _ => None,
            },
            AclElement::Named { set, negated } => match sets.lookup(*set, addr) {
                Some(m) if m.sense.is_positive() => {
                    Some(Sense::Positive.negate_if(*negated))
                }
                _ => None,
            },
        }
    }

    /// Whether this element permits `addr`.
    pub fn matches(&self, addr: IpAddr, env: &AclEnv) -> bool {
        self.evaluate(addr, env) == Some(Sense::Positive)
    }

    /// Whether this element contains a named set, directly or in a nested
    /// list.
    pub fn has_named(&self) -> bool {
        match self {
            AclElement::Table { .. } => false,
            AclElement::Nested { acl, .. } => acl.has_named(),
            AclElement::Named { .. } => true,
        }
    }

    /// A copy of this element with every named set replaced by the table
    /// it has in `snapshot`. The copy matches exactly like the element did
    /// in that snapshot, and never looks at the environment again.
    ///
    /// A named set becomes a nested list holding the table, so that deny
    /// entries in the table remain no match, as they are for a named set.
    pub fn resolve_named(&self, snapshot: &EnvSnapshot) -> FatalResult<Self> {
        Ok(match self {
            AclElement::Table { .. } => self.clone(),
            AclElement::Nested { acl, negated } => AclElement::Nested {
                acl: acl.resolve_named(snapshot)?,
                negated: *negated,
            },
            AclElement::Named { set, negated } => AclElement::Nested {
                acl: Acl::new(vec![AclElement::table(
                    snapshot.table(*set).attach(),
                    false,
                )])?,
                negated: *negated,
            },
        })
    }
}

impl fmt::Display for AclElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_negated() {
            write!(f, "!")?;
        }
        match self {
            AclElement::Table { table, .. } => {
                let entries = table.entries();
                match entries.as_slice() {
                    [(pfx, sense)] => match sense {
                        Sense::Positive => write!(f, "{}", pfx),
                        Sense::Negative => write!(f, "!{}", pfx),
                    },
                    _ => {
                        write!(f, "{{ ")?;
                        for (pfx, sense) in entries {
                            if !sense.is_positive() {
                                write!(f, "!")?;
                            }
                            write!(f, "{}; ", pfx)?;
                        }
                        write!(f, "}}")
                    }
                }
            }
            AclElement::Nested { acl, .. } => write!(f, "{}", acl),
            AclElement::Named { set, .. } => write!(f, "{}", set),
        }
    }
}

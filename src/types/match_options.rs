use std::fmt;

use crate::acl::AclElement;

//------------ Sense ---------------------------------------------------------

/// What a matching entry denotes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sense {
    /// Permit
    Positive,
    /// Deny
    Negative,
}

impl Sense {
    pub fn is_positive(self) -> bool {
        matches!(self, Sense::Positive)
    }

    /// Apply a negation flag. Only a positive outcome can be flipped, a
    /// negative outcome stays negative.
    pub(crate) fn negate_if(self, negated: bool) -> Self {
        match (self, negated) {
            (Sense::Positive, true) => Sense::Negative,
            (sense, _) => sense,
        }
    }
}

impl From<bool> for Sense {
    fn from(pos: bool) -> Self {
        if pos {
            Sense::Positive
        } else {
            Sense::Negative
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sense::Positive => write!(f, "positive"),
            Sense::Negative => write!(f, "negative"),
        }
    }
}

//------------ Decision ------------------------------------------------------

/// The authorization decision for an address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Permit,
    Deny,
    /// No element of the ACL applied to the address.
    Unmatched,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Decision::Permit => write!(f, "permit"),
            Decision::Deny => write!(f, "deny"),
            Decision::Unmatched => write!(f, "unmatched"),
        }
    }
}

//------------ AclMatch ------------------------------------------------------

/// The result of matching an address against an ACL.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AclMatch {
    NoMatch,
    /// The element at `index` was the first to produce a definite outcome.
    Match { index: usize, sense: Sense },
}

impl AclMatch {
    pub fn decision(&self) -> Decision {
        match self {
            AclMatch::NoMatch => Decision::Unmatched,
            AclMatch::Match {
                sense: Sense::Positive,
                ..
            } => Decision::Permit,
            AclMatch::Match {
                sense: Sense::Negative,
                ..
            } => Decision::Deny,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            AclMatch::Match {
                sense: Sense::Positive,
                ..
            }
        )
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            AclMatch::NoMatch => None,
            AclMatch::Match { index, .. } => Some(*index),
        }
    }
}

//------------ MatchOptions --------------------------------------------------

/// Options for the [crate::Acl::match_addr] method.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Whether to return a reference to the matching element, e.g. to
    /// resolve a sort order from it.
    pub include_element: bool,
    /// Whether IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are matched as
    /// the IPv4 address they carry.
    pub map_ipv4: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            include_element: false,
            map_ipv4: true,
        }
    }
}

//------------- QueryResult -------------------------------------------------

/// The type that is returned by [crate::Acl::match_addr].
#[derive(Clone, Debug)]
pub struct QueryResult<'a> {
    pub outcome: AclMatch,
    /// The element that decided the outcome, if requested in the
    /// [MatchOptions].
    pub element: Option<&'a AclElement>,
}

impl QueryResult<'_> {
    pub fn empty() -> Self {
        QueryResult {
            outcome: AclMatch::NoMatch,
            element: None,
        }
    }

    pub fn decision(&self) -> Decision {
        self.outcome.decision()
    }
}

impl fmt::Display for QueryResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.outcome {
            AclMatch::NoMatch => write!(f, "{}", Decision::Unmatched),
            AclMatch::Match { index, .. } => {
                write!(f, "{} (element {})", self.decision(), index)
            }
        }
    }
}

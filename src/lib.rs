#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

//! A library that provides address match lists (ACLs) for IPv4 and IPv6, as
//! used by name servers and other network services to decide which clients
//! are allowed to do what, and to order the addresses in a response by how
//! close they are to the client.
//!
//! The building blocks, from the bottom up:
//!
//! * [AddressTable]: a binary trie of prefixes, each marked as a permit or a
//!   deny, answering longest-prefix queries. Tables are built once and
//!   then shared read-only through reference counted handles.
//! * [Acl]: an ordered list of [AclElement]s (tables, nested lists, and the
//!   run time sets `localhost` and `localnets`). The first element that has
//!   an outcome for an address decides.
//! * [AclEnv]: the current `localhost` and `localnets` tables, which can be
//!   replaced at any time without blocking readers.
//! * [SortSpec]: derived from a sortlist ACL for one client, ranks the
//!   candidate addresses of a response.
//!
//! Matching never allocates, never blocks, and can be done from any number
//! of threads at once.
//!
//! ```
//! use std::str::FromStr;
//! use prefix_acl::{Acl, AclElement, AclEnv, AddressTable, Decision};
//! use prefix_acl::{Prefix, Sense, SortSpec};
//!
//! let mut t1 = AddressTable::new();
//! t1.add_prefix(&Prefix::from_str("10.0.0.0/8").unwrap(), Sense::Positive)
//!     .unwrap();
//! let acl = Acl::new(vec![AclElement::table(t1.attach(), false)]).unwrap();
//! let env = AclEnv::new();
//!
//! let near = "10.5.6.7".parse().unwrap();
//! let far = "192.168.1.1".parse().unwrap();
//! assert_eq!(acl.check(near, &env), Decision::Permit);
//! assert_eq!(acl.check(far, &env), Decision::Unmatched);
//!
//! let spec = SortSpec::OneElement(AclElement::table(t1, false));
//! assert!(spec.compare(near, far).is_lt());
//! ```
mod acl;
mod env;
mod sortlist;
mod table;
mod trie;
mod types;

/// Policies read from configuration
pub mod config;

// Public Interfaces on the root of the crate

/// Address match lists and how to build them
pub use acl::{build_acl, Acl, AclElement, NamedSet, Rule};

/// The run time address sets
pub use env::{AclEnv, EnvSnapshot};

/// Response address ordering
pub use sortlist::{
    negative_rank, positive_rank, Rank, SortSpec, RANK_MATCHED, RANK_MAX,
    RANK_UNMATCHED,
};

/// Reference counted prefix tables
pub use table::{AddressTable, TableMatch};

/// Address families and prefixes
pub use types::af::Family;
pub use types::prefix::Prefix;

/// Types used to match addresses against an ACL
pub use types::match_options;
pub use types::match_options::{
    AclMatch, Decision, MatchOptions, QueryResult, Sense,
};

/// Error types
pub use types::errors;
pub use types::errors::{AclError, FatalError};

/// Statistics types returned by an address table
pub use types::stats::TableStats;

//------------ Config --------------------------------------------------------

//! Address match lists from configuration.
//!
//! A policy is a set of named lists, read from JSON. Every entry in a list
//! is one of:
//!
//! * a string term: an address or prefix (`"192.0.2.1"`, `"10.0.0.0/8"`),
//!   `"any"`, `"none"`, `"localhost"`, `"localnets"`, or the name of
//!   another list in the policy. Any term can be negated with a leading
//!   `!`. IPv4 prefixes with a length may leave out trailing zero octets:
//!   `"10/8"`.
//! * an array: a nested list.
//! * `{ "not": [ ... ] }`: a negated nested list.
//!
//! ```
//! use prefix_acl::config::PolicyConfig;
//! use prefix_acl::{AclEnv, Decision};
//!
//! let config = PolicyConfig::from_json(r#"{
//!     "acls": {
//!         "internal": [ "!10.1.0.0/16", "10.0.0.0/8" ],
//!         "allow-query": [ "internal", "localhost" ]
//!     }
//! }"#).unwrap();
//! let policy = config.build().unwrap();
//!
//! let acl = policy.acl("allow-query").unwrap();
//! let env = AclEnv::new();
//! assert_eq!(acl.check("10.2.0.1".parse().unwrap(), &env), Decision::Permit);
//! assert_eq!(acl.check("10.1.0.1".parse().unwrap(), &env), Decision::Unmatched);
//! ```
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde_derive::Deserialize;

use crate::acl::{build_acl, Acl, NamedSet, Rule};
use crate::types::errors::{AclError, FatalError};
use crate::types::match_options::Sense;
use crate::types::prefix::Prefix;

//------------ ConfigError ---------------------------------------------------

/// Errors returned while reading or building a policy. No part of a policy
/// is built if any of these occur.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration is not valid JSON, or has the wrong shape.
    Json(serde_json::Error),
    /// A term refers to a list that is not defined.
    UnknownAcl(String),
    /// A list refers to itself, directly or through other lists.
    RecursiveAcl(String),
    /// A term is neither a prefix, a keyword, nor a list name.
    InvalidTerm(String),
    /// A list is defined with the name of a keyword.
    ReservedName(String),
    /// Building the list failed.
    Acl(AclError),
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(err) => Some(err),
            ConfigError::Acl(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Json(err) => {
                write!(f, "Error: Cannot read policy: {}", err)
            }
            ConfigError::UnknownAcl(name) => {
                write!(f, "Error: Undefined ACL '{}'.", name)
            }
            ConfigError::RecursiveAcl(name) => {
                write!(f, "Error: ACL '{}' includes itself.", name)
            }
            ConfigError::InvalidTerm(term) => {
                write!(f, "Error: Invalid address match term '{}'.", term)
            }
            ConfigError::ReservedName(name) => {
                write!(f, "Error: '{}' is a keyword and cannot be redefined.", name)
            }
            ConfigError::Acl(err) => write!(f, "{}", err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl From<AclError> for ConfigError {
    fn from(err: AclError) -> Self {
        ConfigError::Acl(err)
    }
}

impl From<FatalError> for ConfigError {
    fn from(err: FatalError) -> Self {
        ConfigError::Acl(err.into())
    }
}

//------------ RuleConfig ----------------------------------------------------

/// One entry of an address match list, as it appears in the configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RuleConfig {
    Term(String),
    List(Vec<RuleConfig>),
    Not { not: Vec<RuleConfig> },
}

const KEYWORDS: [&str; 4] = ["any", "none", "localhost", "localnets"];

//------------ PolicyConfig --------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub acls: BTreeMap<String, Vec<RuleConfig>>,
}

impl PolicyConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: std::io::Read>(rdr: R) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(rdr)?)
    }

    /// Resolve all lists and build them.
    pub fn build(&self) -> Result<Policy, ConfigError> {
        let mut acls = BTreeMap::new();
        for name in self.acls.keys() {
            if KEYWORDS.contains(&name.as_str()) {
                return Err(ConfigError::ReservedName(name.clone()));
            }
            let rules = self.resolve_list(name, &mut vec![])?;
            acls.insert(name.clone(), build_acl(&rules)?);
        }
        debug!("built policy with {} acls", acls.len());
        Ok(Policy { acls })
    }

    // Turn the named list into rules, following references to other lists.
    // `stack` holds the names being resolved, to catch cycles.
    fn resolve_list(
        &self,
        name: &str,
        stack: &mut Vec<String>,
    ) -> Result<Vec<Rule>, ConfigError> {
        if stack.iter().any(|n| n == name) {
            return Err(ConfigError::RecursiveAcl(name.to_string()));
        }
        let list = self
            .acls
            .get(name)
            .ok_or_else(|| ConfigError::UnknownAcl(name.to_string()))?;

        stack.push(name.to_string());
        let rules = self.resolve_rules(list, stack)?;
        stack.pop();
        Ok(rules)
    }

    fn resolve_rules(
        &self,
        list: &[RuleConfig],
        stack: &mut Vec<String>,
    ) -> Result<Vec<Rule>, ConfigError> {
        list.iter()
            .map(|rc| match rc {
                RuleConfig::Term(term) => self.resolve_term(term, stack),
                RuleConfig::List(list) => Ok(Rule::Nested {
                    rules: self.resolve_rules(list, stack)?,
                    negated: false,
                }),
                RuleConfig::Not { not } => Ok(Rule::Nested {
                    rules: self.resolve_rules(not, stack)?,
                    negated: true,
                }),
            })
            .collect()
    }

    fn resolve_term(
        &self,
        term: &str,
        stack: &mut Vec<String>,
    ) -> Result<Rule, ConfigError> {
        let (negated, body) = match term.trim().strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, term.trim()),
        };

        let rule = match body {
            "any" => Rule::Any {
                sense: Sense::from(!negated),
            },
            "none" => Rule::Any {
                sense: Sense::from(negated),
            },
            "localhost" => Rule::Named {
                set: NamedSet::Localhost,
                negated,
            },
            "localnets" => Rule::Named {
                set: NamedSet::Localnets,
                negated,
            },
            _ if self.acls.contains_key(body) => Rule::Nested {
                rules: self.resolve_list(body, stack)?,
                negated,
            },
            _ if looks_like_address(body) => Rule::Prefix {
                prefix: parse_prefix(body)
                    .ok_or_else(|| ConfigError::InvalidTerm(term.to_string()))?,
                sense: Sense::from(!negated),
            },
            _ if body.is_empty() => {
                return Err(ConfigError::InvalidTerm(term.to_string()))
            }
            _ => return Err(ConfigError::UnknownAcl(body.to_string())),
        };
        Ok(rule)
    }
}

fn looks_like_address(term: &str) -> bool {
    term.contains(':')
        || term.chars().next().is_some_and(|c| c.is_ascii_digit())
}

// IPv4 prefixes may leave out trailing zero octets if they give a length,
// `10/8` is `10.0.0.0/8`.
fn parse_prefix(body: &str) -> Option<Prefix> {
    let padded = match body.split_once('/') {
        Some((addr, len)) if !addr.contains(':') => {
            let octets = addr.split('.').count();
            if octets < 4 {
                Cow::Owned(format!("{}{}/{}", addr, ".0".repeat(4 - octets), len))
            } else {
                Cow::Borrowed(body)
            }
        }
        _ => Cow::Borrowed(body),
    };
    Prefix::from_str(&padded).ok()
}

//------------ Policy --------------------------------------------------------

/// A set of built, named address match lists.
#[derive(Clone, Debug, Default)]
pub struct Policy {
    acls: BTreeMap<String, Acl>,
}

impl Policy {
    pub fn acl(&self, name: &str) -> Option<&Acl> {
        self.acls.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.acls.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.acls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acls.is_empty()
    }
}

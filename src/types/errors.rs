use std::fmt;

/// Possible errors returned while building address tables and ACLs. Only
/// [AclError::FatalError] is unrecoverable, like the stand-alone type. None
/// of these can occur while matching.
#[derive(Debug, PartialEq, Eq)]
pub enum AclError {
    /// The requested prefix length exceeds the width of the address family.
    PrefixLengthInvalid,
    /// The address could not be parsed, or the number of octets does not
    /// fit the address family.
    AddressLengthInvalid,
    /// The table is already shared with other handles, e.g. an ACL that is
    /// being matched against. Tables can only be modified while the caller
    /// holds the only handle. Build a new table instead.
    TableShared,
    /// Memory for the table could not be allocated. The policy under
    /// construction must be discarded. This error variant is the same as the
    /// `FatalError` type, but is used as a return for methods that can also
    /// return non-fatal errors.
    FatalError,
}

impl std::error::Error for AclError {}

impl fmt::Display for AclError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AclError::PrefixLengthInvalid => {
                write!(f, "Error: The specified Prefix length is invalid.")
            }
            AclError::AddressLengthInvalid => {
                write!(
                    f,
                    "Error: The address is invalid for its address family."
                )
            }
            AclError::TableShared => {
                write!(
                    f,
                    "Error: The address table is shared and can no longer \
                    be modified."
                )
            }
            AclError::FatalError => {
                write!(
                    f,
                    "FATAL: Memory for the address table could not be \
                    allocated. The policy under construction must be \
                    discarded."
                )
            }
        }
    }
}

impl From<FatalError> for AclError {
    fn from(_: FatalError) -> Self {
        AclError::FatalError
    }
}

/// An unrecoverable error, that can only occur while allocating trie nodes.
/// A policy that was being built when this error was returned must not be
/// published.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FatalError;

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: A Fatal error has occurred. Memory for the address \
             table could not be allocated."
        )
    }
}

pub type FatalResult<T> = Result<T, FatalError>;

impl std::error::Error for FatalError {}

use std::net::IpAddr;
use std::str::FromStr;

use crate::types::af::{self, Family};
use crate::types::errors::AclError;

//------------ Prefix --------------------------------------------------------

/// An address family, a length, and that many significant bits.
///
/// The bits are kept left-aligned in a `u128` (see [Family]) and are always
/// truncated to the length, so two prefixes that cover the same range
/// compare equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Prefix {
    family: Family,
    len: u8,
    bits: u128,
}

impl Prefix {
    /// Create a prefix from left-aligned bits. Bits beyond `len` are
    /// discarded.
    pub fn new(family: Family, bits: u128, len: u8) -> Result<Self, AclError> {
        if len > family.bits() {
            return Err(AclError::PrefixLengthInvalid);
        }
        Ok(Self {
            family,
            len,
            bits: af::truncate_to_len(bits, len),
        })
    }

    pub fn from_ipaddr(addr: IpAddr, len: u8) -> Result<Self, AclError> {
        let (family, bits) = af::into_bits(addr);
        Self::new(family, bits, len)
    }

    /// Create a prefix from network-order octets, as handed over by a
    /// configuration parser.
    pub fn from_octets(
        family: Family,
        octets: &[u8],
        len: u8,
    ) -> Result<Self, AclError> {
        let addr = match family {
            Family::V4 => <[u8; 4]>::try_from(octets)
                .map(|o| IpAddr::from(o))
                .map_err(|_| AclError::AddressLengthInvalid)?,
            Family::V6 => <[u8; 16]>::try_from(octets)
                .map(|o| IpAddr::from(o))
                .map_err(|_| AclError::AddressLengthInvalid)?,
        };
        Self::from_ipaddr(addr, len)
    }

    /// A prefix that covers exactly one address.
    pub fn host(addr: IpAddr) -> Self {
        let (family, bits) = af::into_bits(addr);
        Self {
            family,
            len: family.bits(),
            bits,
        }
    }

    /// The zero-length prefix of a family, i.e. "any address".
    pub fn any(family: Family) -> Self {
        Self {
            family,
            len: 0,
            bits: 0,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_any(&self) -> bool {
        self.len == 0
    }

    pub fn addr(&self) -> IpAddr {
        af::from_bits(self.family, self.bits)
    }

    pub(crate) fn bits(&self) -> u128 {
        self.bits
    }

    /// Whether `addr` falls within this prefix. Addresses of the other
    /// family are never covered.
    pub fn covers(&self, addr: IpAddr) -> bool {
        let (family, bits) = af::into_bits(addr);
        family == self.family && af::truncate_to_len(bits, self.len) == self.bits
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr(), self.len)
    }
}

/// Parses `addr/len`, or a bare address as a host prefix. Host bits set
/// beyond the length are ignored.
impl FromStr for Prefix {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr, len)) => {
                let addr = IpAddr::from_str(addr)
                    .map_err(|_| AclError::AddressLengthInvalid)?;
                let len = u8::from_str(len)
                    .map_err(|_| AclError::PrefixLengthInvalid)?;
                Self::from_ipaddr(addr, len)
            }
            None => IpAddr::from_str(s)
                .map(Self::host)
                .map_err(|_| AclError::AddressLengthInvalid),
        }
    }
}

// inetnum prefixes never exceed the length of their family.
#[allow(clippy::unwrap_used)]
impl From<inetnum::addr::Prefix> for Prefix {
    fn from(value: inetnum::addr::Prefix) -> Self {
        Self::from_ipaddr(value.addr(), value.len()).unwrap()
    }
}

// There is no reasonable way for this to panic, the bits are truncated to
// the length on creation.
#[allow(clippy::unwrap_used)]
impl From<Prefix> for inetnum::addr::Prefix {
    fn from(value: Prefix) -> Self {
        Self::new(value.addr(), value.len()).unwrap()
    }
}

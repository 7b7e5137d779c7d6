use std::net::IpAddr;

//------------ Family --------------------------------------------------------
//
/// The address family of a prefix or a probe address.
///
/// Both families share one trie: an IPv4 address is stored left-aligned in a
/// `u128`, so that bit 0 is always the most significant bit of the address,
/// whatever the family. The family only decides how deep a walk may go, and
/// which slot of a trie node holds the outcome.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    V4,
    V6,
}

/// The number of families, i.e. the number of outcome slots in a trie node.
pub(crate) const FAMILIES: usize = 2;

impl Family {
    pub const ALL: [Family; FAMILIES] = [Family::V4, Family::V6];

    /// The number of bits in an address of this family.
    pub const fn bits(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }

    /// The number of octets in an address of this family.
    pub const fn octets(self) -> usize {
        match self {
            Family::V4 => 4,
            Family::V6 => 16,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Family::V4 => 0,
            Family::V6 => 1,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Family::V4 => write!(f, "ipv4"),
            Family::V6 => write!(f, "ipv6"),
        }
    }
}

//------------ Bit helpers ---------------------------------------------------

/// Turn an address into its family and its left-aligned bits.
pub(crate) fn into_bits(addr: IpAddr) -> (Family, u128) {
    match addr {
        IpAddr::V4(a) => (Family::V4, (u32::from(a) as u128) << 96),
        IpAddr::V6(a) => (Family::V6, u128::from(a)),
    }
}

/// Turn left-aligned bits back into an address of the given family.
pub(crate) fn from_bits(family: Family, bits: u128) -> IpAddr {
    match family {
        Family::V4 => IpAddr::V4(std::net::Ipv4Addr::from((bits >> 96) as u32)),
        Family::V6 => IpAddr::V6(std::net::Ipv6Addr::from(bits)),
    }
}

/// Returns the bit at position `pos`, counting from the most significant
/// bit. `pos` must be smaller than 128.
pub(crate) fn bit_at(bits: u128, pos: u8) -> usize {
    ((bits >> (127 - pos as u32)) & 1) as usize
}

/// Set the bit at position `pos`, counting from the most significant bit.
pub(crate) fn with_bit(bits: u128, pos: u8, bit: usize) -> u128 {
    bits | ((bit as u128) << (127 - pos as u32))
}

/// Fill all bits after `len` with zeros.
pub(crate) fn truncate_to_len(bits: u128, len: u8) -> u128 {
    match len {
        0 => 0,
        1..=127 => bits & (u128::MAX << (128 - len as u32)),
        _ => bits,
    }
}

/// Strip the `::ffff:0:0/96` wrapper off an IPv4-mapped IPv6 address.
pub(crate) fn unmap_ipv4(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(a) => match a.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => addr,
        },
        v4 => v4,
    }
}

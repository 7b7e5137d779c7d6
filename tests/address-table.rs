use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use log::trace;
use prefix_acl::{AclError, AddressTable, Family, Prefix, Sense, TableMatch};
use rand::Rng;

mod common {
    use std::io::Write;

    pub fn init() {
        let _ = env_logger::builder()
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .is_test(true)
            .try_init();
    }
}

#[test]
fn test_longest_prefix_wins() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let table = AddressTable::from_prefixes([
        (Prefix::from_str("10.0.0.0/8")?, Sense::Positive),
        (Prefix::from_str("10.1.0.0/16")?, Sense::Negative),
        (Prefix::from_str("10.1.2.0/24")?, Sense::Positive),
        (Prefix::from_str("2001:db8::/32")?, Sense::Negative),
    ])?;

    let m = table.lookup(IpAddr::from_str("10.1.2.3")?);
    assert_eq!(
        m,
        Some(TableMatch {
            sense: Sense::Positive,
            specificity: 24,
            seq: 2
        })
    );
    let m = table.lookup(IpAddr::from_str("10.1.3.3")?);
    assert_eq!(m.map(|m| (m.sense, m.specificity)), Some((Sense::Negative, 16)));
    let m = table.lookup(IpAddr::from_str("10.9.9.9")?);
    assert_eq!(m.map(|m| (m.sense, m.specificity)), Some((Sense::Positive, 8)));
    assert_eq!(table.lookup(IpAddr::from_str("11.0.0.1")?), None);

    let m = table.lookup(IpAddr::from_str("2001:db8:1::1")?);
    assert_eq!(m.map(|m| m.sense), Some(Sense::Negative));

    assert_eq!(table.stats().prefixes_count(Family::V4), 3);
    assert_eq!(table.stats().prefixes_count(Family::V6), 1);
    Ok(())
}

#[test]
fn test_first_insertion_wins() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let mut table = AddressTable::new();
    table.add_prefix(&Prefix::from_str("192.0.2.0/24")?, Sense::Negative)?;
    table.add_prefix(&Prefix::from_str("192.0.2.0/24")?, Sense::Positive)?;
    // Same prefix with host bits set is the same entry.
    table.add_prefix(&Prefix::from_str("192.0.2.99/24")?, Sense::Positive)?;

    let m = table.lookup(IpAddr::from_str("192.0.2.1")?);
    assert_eq!(m.map(|m| (m.sense, m.seq)), Some((Sense::Negative, 0)));
    assert_eq!(table.stats().total_prefixes(), 1);
    Ok(())
}

#[test]
fn test_families_do_not_alias() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    // The bits of 10.0.0.0/8 and 0a00::/8 are the same.
    let table = AddressTable::from_prefixes([
        (Prefix::from_str("10.0.0.0/8")?, Sense::Positive),
        (Prefix::from_str("a00::/8")?, Sense::Negative),
    ])?;

    assert_eq!(
        table.lookup(IpAddr::from_str("10.0.0.1")?).map(|m| m.sense),
        Some(Sense::Positive)
    );
    assert_eq!(
        table.lookup(IpAddr::from_str("a00::1")?).map(|m| m.sense),
        Some(Sense::Negative)
    );
    assert_eq!(table.lookup(IpAddr::from_str("b00::1")?), None);
    Ok(())
}

#[test]
fn test_any_covers_both_families() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let mut table = AddressTable::new();
    table.add_prefix(&Prefix::any(Family::V6), Sense::Positive)?;

    for addr in ["0.0.0.0", "255.255.255.255", "::", "2001:db8::1"] {
        let m = table.lookup(IpAddr::from_str(addr)?);
        assert_eq!(m.map(|m| (m.sense, m.specificity)), Some((Sense::Positive, 0)));
    }
    Ok(())
}

#[test]
fn test_negated_merge_keeps_denies() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let src = AddressTable::from_prefixes([
        (Prefix::from_str("10.0.0.0/8")?, Sense::Positive),
        (Prefix::from_str("10.1.0.0/16")?, Sense::Negative),
    ])?;

    let mut dst = AddressTable::new();
    dst.merge(&src, false)?;

    for addr in ["10.0.0.1", "10.1.0.1"] {
        let m = dst.lookup(IpAddr::from_str(addr)?);
        trace!("{} -> {:?}", addr, m);
        assert_eq!(m.map(|m| m.sense), Some(Sense::Negative));
    }

    let mut pos = AddressTable::new();
    pos.merge(&src, true)?;
    assert_eq!(pos.entries(), src.entries());
    Ok(())
}

#[test]
fn test_shared_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let mut table = AddressTable::new();
    table.add_prefix(&Prefix::from_str("10.0.0.0/8")?, Sense::Positive)?;

    let handle = table.attach();
    assert_eq!(table.refcount(), 2);
    assert!(handle.ptr_eq(&table));
    assert_eq!(
        table.add_prefix(&Prefix::from_str("11.0.0.0/8")?, Sense::Positive),
        Err(AclError::TableShared)
    );

    assert!(!handle.detach());
    assert_eq!(table.refcount(), 1);
    table.add_prefix(&Prefix::from_str("11.0.0.0/8")?, Sense::Positive)?;
    assert!(table.detach());
    Ok(())
}

// Compare lookups against a linear scan over the inserted prefixes.
#[test]
fn test_random_lookups_match_linear_scan() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let mut rng = rand::rng();

    let mut inserted: Vec<(Prefix, Sense)> = vec![];
    for _ in 0..500 {
        let bits = (rng.random_range(10_u32..=12) << 24) | (rng.random::<u32>() >> 8);
        let len = rng.random_range(8_u8..=24);
        let pfx = Prefix::from_ipaddr(IpAddr::V4(Ipv4Addr::from(bits)), len)?;
        inserted.push((pfx, Sense::from(rng.random_bool(0.5))));
    }

    let table = AddressTable::from_prefixes(inserted.iter().copied())?;

    // Every distinct prefix keeps the sense of its first insertion, and is
    // numbered in the order it first appeared.
    let mut stored: Vec<(Prefix, Sense, u32)> = vec![];
    for (pfx, sense) in &inserted {
        if !stored.iter().any(|(p, _, _)| p == pfx) {
            let seq = stored.len() as u32;
            stored.push((*pfx, *sense, seq));
        }
    }
    assert_eq!(table.stats().total_prefixes(), stored.len());

    for _ in 0..2000 {
        let bits = (rng.random_range(9_u32..=13) << 24) | (rng.random::<u32>() >> 8);
        let addr = IpAddr::V4(Ipv4Addr::from(bits));

        let expected = stored
            .iter()
            .filter(|(p, _, _)| p.covers(addr))
            .max_by_key(|(p, _, _)| p.len())
            .map(|(p, sense, seq)| TableMatch {
                sense: *sense,
                specificity: p.len(),
                seq: *seq,
            });
        assert_eq!(table.lookup(addr), expected, "lookup of {}", addr);
    }
    Ok(())
}

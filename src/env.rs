//! The run time address sets `localhost` and `localnets`.
use std::net::IpAddr;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use crossbeam_utils::Backoff;
use log::{debug, log_enabled, trace};

use crate::acl::NamedSet;
use crate::table::{AddressTable, TableMatch};
use crate::types::errors::AclError;
use crate::types::match_options::Sense;
use crate::types::prefix::Prefix;

//------------ EnvSnapshot ---------------------------------------------------

/// One published version of the run time address sets.
#[derive(Clone, Debug, Default)]
pub struct EnvSnapshot {
    pub version: u64,
    pub localhost: AddressTable,
    pub localnets: AddressTable,
}

impl EnvSnapshot {
    pub fn table(&self, set: NamedSet) -> &AddressTable {
        match set {
            NamedSet::Localhost => &self.localhost,
            NamedSet::Localnets => &self.localnets,
        }
    }
}

//------------ AclEnv --------------------------------------------------------

/// The environment ACLs are matched in.
///
/// Holds the current `localhost` and `localnets` tables as one immutable
/// snapshot behind an epoch-managed pointer. Readers never block: they pin
/// the epoch, take a handle to the table they need and unpin. Writers build
/// a complete new snapshot and swap it in. A replaced snapshot is destroyed
/// once no reader can observe it anymore, the tables in it live on for as
/// long as someone holds a handle to them.
#[derive(Debug)]
pub struct AclEnv {
    snapshot: Atomic<EnvSnapshot>,
}

impl AclEnv {
    /// Create an environment with empty address sets.
    pub fn new() -> Self {
        Self {
            snapshot: Atomic::new(EnvSnapshot::default()),
        }
    }

    /// Get a handle to the current table for `set`. Returns `None` only if
    /// nothing was ever published.
    pub fn table(&self, set: NamedSet) -> Option<AddressTable> {
        let guard = &epoch::pin();
        let current = self.snapshot.load(Ordering::Acquire, guard);
        // The snapshot is only destroyed through `defer_destroy`, which
        // waits for our guard to be dropped.
        unsafe { current.as_ref() }.map(|s| s.table(set).attach())
    }

    /// Look up `addr` in the current table for `set`. Doesn't touch the
    /// reference count of the table.
    pub fn lookup(&self, set: NamedSet, addr: IpAddr) -> Option<TableMatch> {
        let guard = &epoch::pin();
        let current = self.snapshot.load(Ordering::Acquire, guard);
        unsafe { current.as_ref() }.and_then(|s| s.table(set).lookup(addr))
    }

    pub fn localhost(&self) -> Option<AddressTable> {
        self.table(NamedSet::Localhost)
    }

    pub fn localnets(&self) -> Option<AddressTable> {
        self.table(NamedSet::Localnets)
    }

    /// A copy of the whole current snapshot.
    pub fn snapshot(&self) -> EnvSnapshot {
        let guard = &epoch::pin();
        let current = self.snapshot.load(Ordering::Acquire, guard);
        unsafe { current.as_ref() }.cloned().unwrap_or_default()
    }

    /// The version of the current snapshot. Every update increments it.
    pub fn version(&self) -> u64 {
        let guard = &epoch::pin();
        let current = self.snapshot.load(Ordering::Acquire, guard);
        unsafe { current.as_ref() }.map_or(0, |s| s.version)
    }

    /// Replace the `localhost` table. Returns the new version.
    pub fn set_localhost(&self, table: AddressTable) -> u64 {
        self.update(|cur| EnvSnapshot {
            version: cur.version + 1,
            localhost: table.attach(),
            localnets: cur.localnets.attach(),
        })
    }

    /// Replace the `localnets` table. Returns the new version.
    pub fn set_localnets(&self, table: AddressTable) -> u64 {
        self.update(|cur| EnvSnapshot {
            version: cur.version + 1,
            localhost: cur.localhost.attach(),
            localnets: table.attach(),
        })
    }

    /// Replace both tables at once, so that no reader ever sees one table
    /// from before and one from after the change. Returns the new version.
    pub fn set_tables(
        &self,
        localhost: AddressTable,
        localnets: AddressTable,
    ) -> u64 {
        self.update(|cur| EnvSnapshot {
            version: cur.version + 1,
            localhost: localhost.attach(),
            localnets: localnets.attach(),
        })
    }

    /// Rebuild both tables from the addresses of the local interfaces,
    /// given as (address, prefix length) pairs. `localhost` gets every
    /// address as a host prefix, `localnets` every network. Nothing is
    /// published if any of the interfaces is invalid.
    pub fn refresh_from_interfaces(
        &self,
        interfaces: &[(IpAddr, u8)],
    ) -> Result<u64, AclError> {
        let mut localhost = AddressTable::new();
        let mut localnets = AddressTable::new();

        for (addr, len) in interfaces {
            let net = Prefix::from_ipaddr(*addr, *len)?;
            localhost.add_prefix(&Prefix::host(*addr), Sense::Positive)?;
            localnets.add_prefix(&net, Sense::Positive)?;
        }

        let version = self.set_tables(localhost, localnets);
        debug!(
            "refreshed localhost/localnets from {} interfaces (version {})",
            interfaces.len(),
            version
        );
        Ok(version)
    }

    // Compare-and-swap `make(current)` into place until no other writer got
    // in between.
    fn update(&self, make: impl Fn(&EnvSnapshot) -> EnvSnapshot) -> u64 {
        let guard = &epoch::pin();
        let backoff = Backoff::new();
        let empty = EnvSnapshot::default();

        loop {
            let current = self.snapshot.load(Ordering::Acquire, guard);
            let next = make(unsafe { current.as_ref() }.unwrap_or(&empty));
            let version = next.version;

            match self.snapshot.compare_exchange(
                current,
                Owned::new(next),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    if !current.is_null() {
                        // No new reader can load `current` anymore, the
                        // ones that did still hold a guard.
                        unsafe { guard.defer_destroy(current) };
                    }
                    return version;
                }
                Err(_) => {
                    if log_enabled!(log::Level::Trace) {
                        trace!("lost env update race, retrying");
                    }
                    backoff.spin();
                }
            }
        }
    }
}

impl Default for AclEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AclEnv {
    fn drop(&mut self) {
        // We have exclusive access, no reader can hold a guard on the
        // snapshot anymore.
        unsafe {
            let guard = epoch::unprotected();
            let current = self.snapshot.swap(Shared::null(), Ordering::Relaxed, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::str::FromStr;

    #[test]
    fn updates_bump_version() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        assert_eq!(env.version(), 0);

        let mut lh = AddressTable::new();
        lh.add_prefix(&Prefix::from_str("127.0.0.1")?, Sense::Positive)?;
        assert_eq!(env.set_localhost(lh), 1);
        assert_eq!(env.set_localnets(AddressTable::new()), 2);

        let lh = env.localhost().ok_or("no localhost")?;
        assert!(lh.lookup(IpAddr::from_str("127.0.0.1")?).is_some());
        assert!(env.localnets().ok_or("no localnets")?.is_empty());
        Ok(())
    }

    #[test]
    fn handles_outlive_replaced_snapshots() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        env.refresh_from_interfaces(&[(IpAddr::from_str("192.0.2.10")?, 24)])?;
        let old = env.localnets().ok_or("no localnets")?;

        env.refresh_from_interfaces(&[(IpAddr::from_str("198.51.100.1")?, 24)])?;
        assert!(old.lookup(IpAddr::from_str("192.0.2.99")?).is_some());
        assert!(env
            .localnets()
            .ok_or("no localnets")?
            .lookup(IpAddr::from_str("192.0.2.99")?)
            .is_none());
        Ok(())
    }

    #[test]
    fn invalid_interface_publishes_nothing() -> Result<(), Box<dyn Error>> {
        let env = AclEnv::new();
        let res = env.refresh_from_interfaces(&[
            (IpAddr::from_str("192.0.2.10")?, 24),
            (IpAddr::from_str("192.0.2.11")?, 33),
        ]);
        assert_eq!(res, Err(AclError::PrefixLengthInvalid));
        assert_eq!(env.version(), 0);
        Ok(())
    }
}

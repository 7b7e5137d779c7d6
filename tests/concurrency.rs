use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prefix_acl::{build_acl, AclEnv, Decision, NamedSet, Prefix, Rule, Sense, SortSpec};

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
fn test_match_during_env_updates() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let acl = build_acl(&[
        Rule::Prefix {
            prefix: Prefix::from_str("10.0.0.0/8")?,
            sense: Sense::Negative,
        },
        Rule::Named {
            set: NamedSet::Localnets,
            negated: false,
        },
    ])?;
    let env = Arc::new(AclEnv::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4_u8)
        .map(|n| {
            let acl = acl.clone();
            let env = env.clone();
            let done = done.clone();
            std::thread::Builder::new()
                .name(format!("reader-{}", n))
                .spawn(move || {
                    let denied = IpAddr::V4(Ipv4Addr::new(10, n, 0, 1));
                    let probe = IpAddr::V4(Ipv4Addr::new(192, 0, 2, n));
                    let mut rounds = 0_usize;
                    while !done.load(Ordering::Acquire) || rounds == 0 {
                        assert_eq!(acl.check(denied, &env), Decision::Deny);
                        // Either before or after an update, never anything
                        // else.
                        let d = acl.check(probe, &env);
                        assert!(matches!(d, Decision::Permit | Decision::Unmatched));
                        rounds += 1;
                    }
                    rounds
                })
        })
        .collect::<Result<_, _>>()?;

    let mut last = env.version();
    for i in 0..200_u32 {
        let interfaces = if i % 2 == 0 {
            vec![(IpAddr::from_str("192.0.2.1")?, 24)]
        } else {
            vec![(IpAddr::from_str("198.51.100.1")?, 24)]
        };
        let version = env.refresh_from_interfaces(&interfaces)?;
        assert!(version > last);
        last = version;
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        let rounds = reader.join().map_err(|_| "reader panicked")?;
        assert!(rounds > 0);
    }
    assert_eq!(env.version(), last);
    Ok(())
}

#[test]
fn test_concurrent_writers() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let env = Arc::new(AclEnv::new());
    let start = env.version();

    let writers: Vec<_> = (0..4_u8)
        .map(|n| {
            let env = env.clone();
            std::thread::Builder::new()
                .name(format!("writer-{}", n))
                .spawn(move || -> Result<(), prefix_acl::AclError> {
                    for i in 0..50_u8 {
                        let addr = IpAddr::V4(Ipv4Addr::new(10, n, i, 1));
                        env.refresh_from_interfaces(&[(addr, 24)])?;
                    }
                    Ok(())
                })
        })
        .collect::<Result<_, _>>()?;

    for writer in writers {
        writer.join().map_err(|_| "writer panicked")??;
    }

    // No update was lost.
    assert_eq!(env.version(), start + 200);
    let localhost = env.localhost().ok_or("no localhost")?;
    assert_eq!(localhost.stats().total_prefixes(), 1);
    Ok(())
}

#[test]
fn test_sort_spec_outlives_update() -> Result<(), Box<dyn std::error::Error>> {
    crate::common::init();

    let env = AclEnv::new();
    env.refresh_from_interfaces(&[(IpAddr::from_str("192.0.2.1")?, 24)])?;

    let sortlist = build_acl(&[Rule::Nested {
        rules: vec![
            Rule::Any {
                sense: Sense::Positive,
            },
            Rule::Named {
                set: NamedSet::Localnets,
                negated: false,
            },
        ],
        negated: false,
    }])?;
    let spec = SortSpec::new(&sortlist, IpAddr::from_str("203.0.113.1")?, &env);

    // The sort spec holds its own handle to the table it was made with.
    env.refresh_from_interfaces(&[(IpAddr::from_str("198.51.100.1")?, 24)])?;
    let mut addrs = vec![
        IpAddr::from_str("198.51.100.7")?,
        IpAddr::from_str("192.0.2.7")?,
    ];
    spec.sort(&mut addrs);
    assert_eq!(addrs.first(), Some(&IpAddr::from_str("192.0.2.7")?));
    Ok(())
}

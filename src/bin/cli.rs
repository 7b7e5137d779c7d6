#![cfg(feature = "cli")]

use ansi_term::Colour;
use clap::Parser;
use log::debug;

use prefix_acl::config::PolicyConfig;
use prefix_acl::{AclEnv, Decision, MatchOptions, SortSpec};

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON file with the named address match lists
    #[arg(short, long)]
    policy: PathBuf,

    /// The list to match the client against
    #[arg(short, long)]
    acl: String,

    /// The client address
    #[arg(short, long)]
    client: IpAddr,

    /// The list to order the response addresses with
    #[arg(short, long)]
    sortlist: Option<String>,

    /// A local interface as ADDR/LEN, may be given more than once
    #[arg(short, long, value_parser = parse_interface)]
    interface: Vec<(IpAddr, u8)>,

    /// Response addresses to sort
    addrs: Vec<IpAddr>,
}

fn parse_interface(s: &str) -> Result<(IpAddr, u8), String> {
    let (addr, len) = s
        .split_once('/')
        .ok_or_else(|| format!("expected ADDR/LEN, got '{}'", s))?;
    let addr = addr.parse::<IpAddr>().map_err(|e| e.to_string())?;
    let len = len.parse::<u8>().map_err(|e| e.to_string())?;
    Ok((addr, len))
}

fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let file = File::open(&args.policy)?;
    let policy = PolicyConfig::from_reader(BufReader::new(file))?.build()?;
    debug!("loaded {} acls from {}", policy.len(), args.policy.display());

    let env = AclEnv::new();
    if !args.interface.is_empty() {
        env.refresh_from_interfaces(&args.interface)?;
    }

    let acl = policy
        .acl(&args.acl)
        .ok_or_else(|| format!("no acl named '{}'", args.acl))?;
    let res = acl.match_addr(
        args.client,
        &env,
        &MatchOptions {
            include_element: true,
            ..Default::default()
        },
    );

    let decision = match res.decision() {
        Decision::Permit => Colour::Green.paint("permit"),
        Decision::Deny => Colour::Red.paint("deny"),
        Decision::Unmatched => Colour::Yellow.paint("unmatched"),
    };
    print!("{} {}: {}", args.acl, args.client, decision);
    match (res.outcome.index(), res.element) {
        (Some(index), Some(elm)) => {
            println!(" (element {}: {})", index, elm)
        }
        _ => println!(),
    }

    let Some(name) = args.sortlist else {
        return Ok(());
    };
    let sortlist = policy
        .acl(&name)
        .ok_or_else(|| format!("no acl named '{}'", name))?;
    let spec = SortSpec::new(sortlist, args.client, &env);
    if spec.is_none() {
        println!("{}", Colour::Yellow.paint("no sortlist entry applies"));
    }

    let mut addrs = args.addrs;
    spec.sort(&mut addrs);
    for addr in addrs {
        match spec.rank(addr) {
            Some(rank) => println!("{:<40} {}", addr, Colour::Blue.paint(rank.to_string())),
            None => println!("{}", addr),
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{}", Colour::Red.paint(err.to_string()));
        process::exit(1);
    }
}

//! k2filter-check: CLI tool for checking names and addresses against filter lists.

use clap::{Parser, Subcommand};
use k2filter::matcher::PatternKind;
use k2filter::reload::{build, digest_hex};
use k2filter::source::{entries_from_config, fetch, FileSource};
use k2filter::{FilterConfig, FilterSet, ListKind, Polarity};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "k2filter-check")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Check names and addresses against DNS filter lists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide names or addresses against the configured lists
    Check {
        /// Filter config (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Names or IP addresses to decide
        #[arg(required = true)]
        queries: Vec<String>,

        /// Show which list and pattern kind matched
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the digest of every configured list's content
    Digest {
        /// Filter config (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Parse one list file and report what it contains
    Lint {
        /// List file
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the file as a CIDR list instead of name patterns
        #[arg(long)]
        cidr: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            config,
            queries,
            verbose,
        } => check(&config, &queries, verbose),
        Commands::Digest { config } => digest(&config),
        Commands::Lint { input, cidr } => lint(&input, cidr),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_set(config_path: &PathBuf) -> Result<(FilterSet, String), Box<dyn std::error::Error>> {
    let config = FilterConfig::load(config_path)?;
    let entries = entries_from_config(&config);
    let (set, digest) = build(&entries)?;
    Ok((set, digest_hex(&digest)))
}

fn check(config_path: &PathBuf, queries: &[String], verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (set, _) = load_set(config_path)?;

    for query in queries {
        if let Ok(ip) = query.parse::<IpAddr>() {
            let decision = set.decide_address(ip);
            if verbose {
                let network = set
                    .allow_nets()
                    .longest_match(ip)
                    .map(|net| format!("allow {}", net))
                    .or_else(|| set.deny_nets().longest_match(ip).map(|net| format!("deny {}", net)))
                    .unwrap_or_else(|| "no match".to_string());
                println!("{}\t{}\t{}", query, decision, network);
            } else {
                println!("{}\t{}", query, decision);
            }
            continue;
        }

        let verdict = set.explain(query);
        if verbose {
            let matched = match verdict.matched {
                Some((polarity, kind)) => format!("{} {}", polarity, kind),
                None => "no match".to_string(),
            };
            println!("{}\t{}\t{}", query, verdict.decision, matched);
        } else {
            println!("{}\t{}", query, verdict.decision);
        }
    }

    Ok(())
}

fn digest(config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let (set, digest) = load_set(config_path)?;
    println!("{}", digest);
    println!("allow entries: {}", set.allow_len());
    println!("deny entries: {}", set.deny_len());
    Ok(())
}

fn lint(input: &PathBuf, cidr: bool) -> Result<(), Box<dyn std::error::Error>> {
    let kind = if cidr { ListKind::Cidr } else { ListKind::Names };
    let data = fetch(&FileSource::new(input))?;

    let mut builder = FilterSet::builder();
    let summary = builder.load(&mut data.as_slice(), Polarity::Deny, kind)?;
    let set = builder.build();

    println!("{:?} ({} list)", input, kind);
    println!("  added: {}", summary.added);
    println!("  duplicates: {}", summary.duplicates);
    println!("  skipped: {}", summary.skipped);

    match kind {
        ListKind::Names => {
            let names = set.deny_names();
            for pattern_kind in [
                PatternKind::Exact,
                PatternKind::Prefix,
                PatternKind::Suffix,
                PatternKind::Substring,
                PatternKind::Regex,
            ] {
                println!("  {}: {}", pattern_kind, names.count(pattern_kind));
            }
        }
        ListKind::Cidr => {
            let nets = set.deny_nets();
            println!("  ipv4: {}", nets.v4_count());
            println!("  ipv6: {}", nets.v6_count());
        }
    }

    Ok(())
}

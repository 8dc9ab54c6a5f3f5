//! K2Filter - A DNS query filtering engine.
//!
//! This crate decides whether DNS queries should be answered normally or
//! blocked, based on allow and deny lists of name patterns and IP ranges.
//!
//! # Features
//!
//! - **Name patterns**: Exact, prefix (`ads.*`), label-aware suffix
//!   (`*example.com`), substring (`*track*`) and regex matching
//! - **IP-CIDR matching**: Longest-prefix IPv4 and IPv6 range matching
//! - **Allow precedence**: An allow-list match always overrides a deny match
//! - **Uncloaking**: Blocks replies whose CNAME/SVCB/HTTPS targets or
//!   addresses are deny-listed
//! - **Hot reload**: Lists rebuild in the background and swap in atomically;
//!   unchanged content is detected by digest and skipped
//! - **List sources**: Local files, HTTP(S) URLs, gzip-compressed payloads
//!
//! # Quick Start
//!
//! ```ignore
//! use k2filter::{Decision, FilterSet, ListKind, Polarity};
//!
//! let mut builder = FilterSet::builder();
//! builder.load_str("*tracker.com\n", Polarity::Deny, ListKind::Names)?;
//! builder.load_str("ok.tracker.com\n", Polarity::Allow, ListKind::Names)?;
//! let set = builder.build();
//!
//! assert_eq!(set.decide("ads.tracker.com."), Decision::Blocked);
//! assert_eq!(set.decide("ok.tracker.com."), Decision::Allowed);
//! ```
//!
//! # Serving Queries
//!
//! A host decodes DNS messages into [`dns::Message`] and hands them to a
//! [`DnsFilter`] together with the rest of its handler chain:
//!
//! ```ignore
//! use k2filter::{DnsFilter, FilterConfig, ReloadCoordinator, ReloadOptions, ReloadTask};
//! use k2filter::source::entries_from_config;
//! use std::sync::Arc;
//!
//! let config = FilterConfig::load("k2filter.yaml")?;
//! let coordinator = Arc::new(ReloadCoordinator::start(
//!     entries_from_config(&config),
//!     ReloadOptions::from_config(&config),
//! )?);
//! let filter = DnsFilter::from_coordinator(&coordinator, &config);
//!
//! // Periodic reload, stopped when `task` is dropped
//! let task = match config.reload_interval() {
//!     Some(interval) => Some(ReloadTask::spawn(coordinator.clone(), interval)?),
//!     None => None,
//! };
//!
//! let reply = filter.serve(&query, &upstream)?;
//! ```
//!
//! # Decision Order
//!
//! Names are checked against the allow list first, then the deny list.
//! Within one list the kinds are tried in this order:
//! 1. Exact
//! 2. Prefix
//! 3. Suffix (whole labels only)
//! 4. Substring
//! 5. Regex
//!
//! Names and addresses that match neither list are allowed.

mod decision;
mod error;

pub mod config;
pub mod dns;
pub mod filter;
pub mod filterset;
pub mod matcher;
pub mod reload;
pub mod source;
pub mod stats;

// Re-export core types
pub use decision::{Decision, ListKind, Polarity};
pub use error::{CidrLineError, Error, Result};

// Re-export configuration
pub use config::{BlockPolicy, FilterConfig, ReloadConfig, SourceSpec};

// Re-export filter set types
pub use filterset::{FilterSet, FilterSetBuilder, NameVerdict};

// Re-export query path
pub use filter::{DnsFilter, Handler, QueryAction};

// Re-export reload management
pub use reload::{FilterHandle, ReloadCoordinator, ReloadOptions, ReloadOutcome, ReloadTask};

// Re-export sources and counters
pub use source::{FileSource, HttpSource, ListEntry, ListSource, MemorySource};
pub use stats::{FilterStats, StatsSnapshot};

//! Query-path facade.

use std::sync::Arc;

use crate::config::FilterConfig;
use crate::dns::{Message, Synthesizer, UncloakOutcome, Uncloaker};
use crate::matcher::normalize_name;
use crate::reload::{FilterHandle, ReloadCoordinator};
use crate::stats::FilterStats;
use crate::{FilterSet, Result};

/// The rest of the host's handler chain.
pub trait Handler {
    /// Resolve `query` and return the reply.
    fn serve(&self, query: &Message) -> Result<Message>;
}

impl<F> Handler for F
where
    F: Fn(&Message) -> Result<Message>,
{
    fn serve(&self, query: &Message) -> Result<Message> {
        self(query)
    }
}

/// What to do with a query before it is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAction {
    /// Pass the query down the chain
    Forward,
    /// Answer with this reply instead
    Block(Message),
}

impl QueryAction {
    pub fn is_blocked(&self) -> bool {
        matches!(self, QueryAction::Block(_))
    }
}

/// DnsFilter decides queries and inspects their replies against the
/// current [`FilterSet`].
///
/// # Example
///
/// ```ignore
/// use k2filter::{DnsFilter, FilterConfig, ReloadCoordinator, ReloadOptions};
/// use k2filter::source::entries_from_config;
///
/// let config = FilterConfig::load("k2filter.yaml")?;
/// let coordinator = ReloadCoordinator::start(
///     entries_from_config(&config),
///     ReloadOptions::from_config(&config),
/// )?;
/// let filter = DnsFilter::from_coordinator(&coordinator, &config);
///
/// // `upstream` is anything implementing Handler, e.g. a closure
/// let reply = filter.serve(&query, &upstream)?;
/// ```
pub struct DnsFilter {
    handle: FilterHandle,
    uncloaker: Uncloaker,
    uncloak: bool,
    stats: Arc<FilterStats>,
}

impl DnsFilter {
    /// A filter reading sets from `handle`, with its own counters.
    pub fn new(handle: FilterHandle, config: &FilterConfig) -> Self {
        Self {
            handle,
            uncloaker: Uncloaker::new(Synthesizer::new(config.policy, config.block_ttl)),
            uncloak: config.uncloak,
            stats: Arc::new(FilterStats::new()),
        }
    }

    /// A filter over a coordinator's sets, sharing its counters.
    pub fn from_coordinator(coordinator: &ReloadCoordinator, config: &FilterConfig) -> Self {
        Self::new(coordinator.handle(), config).with_stats(coordinator.stats().clone())
    }

    pub fn with_stats(mut self, stats: Arc<FilterStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<FilterStats> {
        &self.stats
    }

    /// The set the next query will be decided on.
    pub fn snapshot(&self) -> Arc<FilterSet> {
        self.handle.snapshot()
    }

    /// Decide `query`, forward it through `next` if allowed, and inspect
    /// the reply. One snapshot serves the whole exchange.
    pub fn serve<H>(&self, query: &Message, next: &H) -> Result<Message>
    where
        H: Handler + ?Sized,
    {
        let Some(name) = query_name(query) else {
            return next.serve(query);
        };
        let set = self.handle.snapshot();

        if let QueryAction::Block(reply) = self.check_name(&set, query, &name) {
            return Ok(reply);
        }
        let reply = next.serve(query)?;
        Ok(self.inspect_name(&set, query, &name, reply))
    }

    /// Decide a query without forwarding it.
    pub fn check(&self, query: &Message) -> QueryAction {
        match query_name(query) {
            Some(name) => self.check_name(&self.handle.snapshot(), query, &name),
            None => QueryAction::Forward,
        }
    }

    /// Inspect the upstream reply to `query` and return what the client
    /// should receive.
    pub fn inspect(&self, query: &Message, reply: Message) -> Message {
        match query_name(query) {
            Some(name) => self.inspect_name(&self.handle.snapshot(), query, &name, reply),
            None => reply,
        }
    }

    fn check_name(&self, set: &FilterSet, query: &Message, name: &str) -> QueryAction {
        self.stats.record_inspected();

        let verdict = set.explain(name);
        if !verdict.decision.is_blocked() {
            return QueryAction::Forward;
        }
        self.stats.record_blocked_by_name();
        if let Some((_, kind)) = verdict.matched {
            log::debug!("Blocked {} ({} match)", name, kind);
        }
        QueryAction::Block(self.uncloaker.synthesizer().block(query))
    }

    fn inspect_name(&self, set: &FilterSet, query: &Message, name: &str, reply: Message) -> Message {
        if !self.uncloak {
            return reply;
        }
        let outcome = self.uncloaker.inspect(set, query, name, reply);
        match &outcome {
            UncloakOutcome::Blocked { record, .. } => {
                self.stats.record_blocked_by_uncloak(0);
                log::debug!("Blocked {} via uncloaked {}", name, record);
            }
            UncloakOutcome::Stripped { removed, .. } => {
                self.stats.record_blocked_by_uncloak(*removed);
                log::debug!("Stripped {} answer records from {}", removed, name);
            }
            UncloakOutcome::Passed(_) | UncloakOutcome::Forwarded(_) => {}
        }
        outcome.into_message()
    }
}

/// The normalized name to decide, or `None` for root and question-less queries.
fn query_name(query: &Message) -> Option<String> {
    let question = query.question()?;
    let name = normalize_name(&question.name);
    if name.is_empty() {
        None
    } else {
        Some(name.into_owned())
    }
}

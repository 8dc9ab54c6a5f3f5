//! Allow/deny filter sets.

use std::io::BufRead;
use std::net::IpAddr;

use crate::matcher::{ListMatcher, LoadSummary, PatternKind, PatternMatcher, RangeMatcher};
use crate::{Decision, ListKind, Polarity, Result};

/// FilterSet pairs allow and deny matchers for names and addresses.
///
/// An allow match always wins: a name present in both lists is allowed.
/// Names and addresses that match neither list are allowed.
///
/// A FilterSet is immutable once built; reloads build a new one and swap
/// it in (see [`ReloadCoordinator`](crate::ReloadCoordinator)).
///
/// # Examples
/// ```
/// use k2filter::{Decision, FilterSet, ListKind, Polarity};
///
/// let mut builder = FilterSet::builder();
/// builder.load_str("*tracker.com", Polarity::Deny, ListKind::Names).unwrap();
/// builder.load_str("ok.tracker.com", Polarity::Allow, ListKind::Names).unwrap();
/// let set = builder.build();
///
/// assert_eq!(set.decide("ads.tracker.com."), Decision::Blocked);
/// assert_eq!(set.decide("ok.tracker.com."), Decision::Allowed);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    allow_names: PatternMatcher,
    deny_names: PatternMatcher,
    allow_nets: RangeMatcher,
    deny_nets: RangeMatcher,
}

/// Which list entry produced a name decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameVerdict {
    pub decision: Decision,
    /// `None` when no list matched
    pub matched: Option<(Polarity, PatternKind)>,
}

impl FilterSet {
    /// A set with no entries; every decision is [`Decision::Allowed`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a new set.
    pub fn builder() -> FilterSetBuilder {
        FilterSetBuilder::new()
    }

    /// Decide a query or indirection target name.
    pub fn decide(&self, name: &str) -> Decision {
        self.explain(name).decision
    }

    /// Decide a name and report which list matched.
    pub fn explain(&self, name: &str) -> NameVerdict {
        if let Some(kind) = self.allow_names.find(name) {
            return NameVerdict {
                decision: Decision::Allowed,
                matched: Some((Polarity::Allow, kind)),
            };
        }
        if let Some(kind) = self.deny_names.find(name) {
            return NameVerdict {
                decision: Decision::Blocked,
                matched: Some((Polarity::Deny, kind)),
            };
        }
        NameVerdict {
            decision: Decision::Allowed,
            matched: None,
        }
    }

    /// Decide a resolved address.
    pub fn decide_address(&self, ip: IpAddr) -> Decision {
        if self.allow_nets.contains(ip) {
            Decision::Allowed
        } else if self.deny_nets.contains(ip) {
            Decision::Blocked
        } else {
            Decision::Allowed
        }
    }

    /// Check if `name` is on the allow list.
    pub fn is_allowed_name(&self, name: &str) -> bool {
        self.allow_names.matches(name)
    }

    pub fn allow_names(&self) -> &PatternMatcher {
        &self.allow_names
    }

    pub fn deny_names(&self) -> &PatternMatcher {
        &self.deny_names
    }

    pub fn allow_nets(&self) -> &RangeMatcher {
        &self.allow_nets
    }

    pub fn deny_nets(&self) -> &RangeMatcher {
        &self.deny_nets
    }

    /// Number of allow entries (names and networks).
    pub fn allow_len(&self) -> usize {
        self.allow_names.len() + self.allow_nets.len()
    }

    /// Number of deny entries (names and networks).
    pub fn deny_len(&self) -> usize {
        self.deny_names.len() + self.deny_nets.len()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.allow_len() + self.deny_len()
    }

    /// Check if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for a [`FilterSet`]. Lists are loaded in order; the set is
/// only observable once [`build`](FilterSetBuilder::build) returns.
#[derive(Debug, Default)]
pub struct FilterSetBuilder {
    set: FilterSet,
    summary: LoadSummary,
}

impl FilterSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn target(&mut self, polarity: Polarity, kind: ListKind) -> &mut dyn ListMatcher {
        match (polarity, kind) {
            (Polarity::Allow, ListKind::Names) => &mut self.set.allow_names,
            (Polarity::Deny, ListKind::Names) => &mut self.set.deny_names,
            (Polarity::Allow, ListKind::Cidr) => &mut self.set.allow_nets,
            (Polarity::Deny, ListKind::Cidr) => &mut self.set.deny_nets,
        }
    }

    /// Load one list into the matcher selected by `polarity` and `kind`.
    ///
    /// An invalid regex in a name list is returned as an error; the
    /// builder should then be discarded.
    pub fn load(
        &mut self,
        reader: &mut dyn BufRead,
        polarity: Polarity,
        kind: ListKind,
    ) -> Result<LoadSummary> {
        let summary = self.target(polarity, kind).load(reader)?;
        self.summary.merge(summary);
        Ok(summary)
    }

    /// Load a list held in memory.
    pub fn load_str(&mut self, text: &str, polarity: Polarity, kind: ListKind) -> Result<LoadSummary> {
        self.load(&mut text.as_bytes(), polarity, kind)
    }

    /// Totals across every list loaded so far.
    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Finish building.
    pub fn build(self) -> FilterSet {
        self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(allow: &str, deny: &str) -> FilterSet {
        let mut builder = FilterSet::builder();
        builder.load_str(allow, Polarity::Allow, ListKind::Names).unwrap();
        builder.load_str(deny, Polarity::Deny, ListKind::Names).unwrap();
        builder.build()
    }

    #[test]
    fn test_allow_dominates_deny() {
        let set = set("example.com\n*safe.net\n", "example.com\nwww.safe.net\n*\n");

        assert_eq!(set.decide("example.com"), Decision::Allowed);
        assert_eq!(set.decide("www.safe.net"), Decision::Allowed);
    }

    #[test]
    fn test_default_open() {
        let set = set("", "ads.example.com\n");

        assert_eq!(set.decide("unlisted.org"), Decision::Allowed);
        assert_eq!(set.decide("ads.example.com."), Decision::Blocked);
        assert_eq!(FilterSet::empty().decide("anything.com"), Decision::Allowed);
    }

    #[test]
    fn test_explain() {
        let set = set("*good.com", "*.good.com\n*bad*\n");

        assert_eq!(
            set.explain("www.good.com").matched,
            Some((Polarity::Allow, PatternKind::Suffix))
        );
        assert_eq!(
            set.explain("verybad.org"),
            NameVerdict {
                decision: Decision::Blocked,
                matched: Some((Polarity::Deny, PatternKind::Substring)),
            }
        );
        assert_eq!(set.explain("neutral.org").matched, None);
    }

    #[test]
    fn test_address_precedence() {
        let mut builder = FilterSet::builder();
        builder
            .load_str("10.0.0.0/8\n2001:db8::/32\n", Polarity::Deny, ListKind::Cidr)
            .unwrap();
        builder
            .load_str("10.1.0.0/16\n", Polarity::Allow, ListKind::Cidr)
            .unwrap();
        let set = builder.build();

        assert_eq!(set.decide_address("10.2.3.4".parse().unwrap()), Decision::Blocked);
        assert_eq!(set.decide_address("10.1.3.4".parse().unwrap()), Decision::Allowed);
        assert_eq!(set.decide_address("2001:db8::1".parse().unwrap()), Decision::Blocked);
        assert_eq!(set.decide_address("192.0.2.1".parse().unwrap()), Decision::Allowed);
    }

    #[test]
    fn test_counts_and_summary() {
        let mut builder = FilterSet::builder();
        builder.load_str("a.com\nb.com\n", Polarity::Deny, ListKind::Names).unwrap();
        builder.load_str("10.0.0.0/8\nbogus\n", Polarity::Deny, ListKind::Cidr).unwrap();
        builder.load_str("c.com\n", Polarity::Allow, ListKind::Names).unwrap();

        assert_eq!(builder.summary(), LoadSummary { added: 4, duplicates: 0, skipped: 1 });
        let set = builder.build();
        assert_eq!(set.deny_len(), 3);
        assert_eq!(set.allow_len(), 1);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_invalid_regex_aborts_load() {
        let mut builder = FilterSet::builder();
        let result = builder.load_str("ok.com\nbroken[\n", Polarity::Deny, ListKind::Names);
        assert!(matches!(result, Err(crate::Error::InvalidPattern { .. })));
    }
}

//! Name pattern classification and matching.

use ahash::AHashSet;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::io::BufRead;

use super::{for_each_line, normalize_name, ListMatcher, LoadSummary, NameTrie};
use crate::{Error, Result};

/// Characters that turn a list line into a regular expression.
const REGEX_TRIGGERS: &[char] = &['[', ']', '(', ')', '|', '?', '+', '$', '{', '}', '^'];

/// One classified list entry.
///
/// # Pattern Formats
/// - `ads.example.com` - exact name
/// - `ads*` - names starting with `ads`
/// - `*example.com` / `*.example.com` - `example.com` and every name below it
/// - `*track*` - names containing `track`
/// - `^ad[0-9]+\.` - any line containing a regex metacharacter, compiled
///   case-insensitively
#[derive(Debug, Clone)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
    /// Stored without the leading wildcard or dot, matched on label boundaries
    Suffix(String),
    Substring(String),
    Regex(Regex),
}

impl Pattern {
    /// Classify an already cleaned list line.
    ///
    /// Returns `Ok(None)` for wildcard lines that carry no usable text
    /// (`*`, `**`, `*.`) or place the wildcard mid-name.
    pub fn parse(line: &str) -> Result<Option<Pattern>> {
        if line.contains(REGEX_TRIGGERS) {
            // Names are matched lowercased
            let regex = RegexBuilder::new(line)
                .case_insensitive(true)
                .build()
                .map_err(|source| Error::InvalidPattern {
                    pattern: line.to_string(),
                    source,
                })?;
            return Ok(Some(Pattern::Regex(regex)));
        }

        let line = line.to_ascii_lowercase();
        if !line.contains('*') {
            let name = line.strip_suffix('.').unwrap_or(&line);
            return Ok(non_empty(name).map(Pattern::Exact));
        }

        let starts = line.starts_with('*');
        let ends = line.ends_with('*');
        let pattern = if starts && ends {
            let inner = line.trim_start_matches('*').trim_end_matches('*');
            non_empty(inner).map(Pattern::Substring)
        } else if ends {
            let prefix = line.trim_end_matches('*');
            let prefix = prefix.strip_suffix('.').unwrap_or(prefix);
            non_empty(prefix).map(Pattern::Prefix)
        } else if starts {
            let suffix = line.trim_start_matches('*');
            let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
            let suffix = suffix.strip_suffix('.').unwrap_or(suffix);
            non_empty(suffix).map(Pattern::Suffix)
        } else {
            None
        };

        if pattern.is_none() {
            log::warn!("Ignoring unsupported wildcard pattern: {}", line);
        }
        Ok(pattern)
    }

    /// Get the kind of this pattern.
    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Exact(_) => PatternKind::Exact,
            Pattern::Prefix(_) => PatternKind::Prefix,
            Pattern::Suffix(_) => PatternKind::Suffix,
            Pattern::Substring(_) => PatternKind::Substring,
            Pattern::Regex(_) => PatternKind::Regex,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Matching strategy of a [`Pattern`], in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternKind {
    Exact,
    Prefix,
    Suffix,
    Substring,
    Regex,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Exact => "exact",
            PatternKind::Prefix => "prefix",
            PatternKind::Suffix => "suffix",
            PatternKind::Substring => "substring",
            PatternKind::Regex => "regex",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// PatternMatcher stores classified name patterns and answers membership
/// queries, cheapest strategy first.
///
/// # Examples
/// ```
/// use k2filter::matcher::PatternMatcher;
///
/// let mut matcher = PatternMatcher::new();
/// matcher.add("*example.com").unwrap();
/// matcher.add("ads.*").unwrap();
///
/// assert!(matcher.matches("www.example.com."));
/// assert!(matcher.matches("ads123.net"));
/// assert!(!matcher.matches("notexample.com"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    exacts: AHashSet<String>,
    prefixes: NameTrie,
    /// Reversed suffix keys
    suffixes: NameTrie,
    substrings: Vec<String>,
    regexes: Vec<Regex>,
}

impl PatternMatcher {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and register one raw list line.
    ///
    /// Returns `Ok(false)` for comments, blank lines and duplicates.
    pub fn add(&mut self, line: &str) -> Result<bool> {
        match super::clean_line(line) {
            Some(line) => self.add_clean(line).map(|added| added == Some(true)),
            None => Ok(false),
        }
    }

    /// `Some(added)` for a usable pattern, `None` for an ignored one.
    fn add_clean(&mut self, line: &str) -> Result<Option<bool>> {
        Ok(Pattern::parse(line)?.map(|pattern| self.insert(pattern)))
    }

    /// Register a classified pattern. Returns `false` if already present.
    pub fn insert(&mut self, pattern: Pattern) -> bool {
        match pattern {
            Pattern::Exact(name) => self.exacts.insert(name),
            Pattern::Prefix(prefix) => self.prefixes.insert(prefix.as_bytes()),
            Pattern::Suffix(suffix) => {
                let reversed: Vec<u8> = suffix.bytes().rev().collect();
                self.suffixes.insert(&reversed)
            }
            Pattern::Substring(s) => {
                if self.substrings.contains(&s) {
                    return false;
                }
                self.substrings.push(s);
                true
            }
            Pattern::Regex(regex) => {
                if self.regexes.iter().any(|r| r.as_str() == regex.as_str()) {
                    return false;
                }
                self.regexes.push(regex);
                true
            }
        }
    }

    /// Check if `name` matches any stored pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Return the first strategy that matches `name`.
    ///
    /// Strategies are tried exact → prefix → suffix → substring → regex.
    pub fn find(&self, name: &str) -> Option<PatternKind> {
        let name = normalize_name(name);
        let name = name.as_ref();
        if name.is_empty() {
            return None;
        }

        if self.exacts.contains(name) {
            return Some(PatternKind::Exact);
        }
        if self.prefixes.longest_prefix(name.as_bytes()).is_some() {
            return Some(PatternKind::Prefix);
        }
        if self.match_suffix(name) {
            return Some(PatternKind::Suffix);
        }
        if self.substrings.iter().any(|s| name.contains(s.as_str())) {
            return Some(PatternKind::Substring);
        }
        if self.regexes.iter().any(|r| r.is_match(name)) {
            return Some(PatternKind::Regex);
        }
        None
    }

    /// Label-aware suffix match: a stored key must cover whole labels,
    /// so `example.com` matches `example.com` and `a.example.com` but not
    /// `notexample.com`.
    fn match_suffix(&self, name: &str) -> bool {
        if self.suffixes.is_empty() {
            return false;
        }
        let bytes = name.as_bytes();
        let len = bytes.len();
        self.suffixes
            .longest_match(bytes.iter().rev().copied(), |n| {
                n > 0 && (n == len || bytes[len - n - 1] == b'.')
            })
            .is_some()
    }

    /// Number of patterns of the given kind.
    pub fn count(&self, kind: PatternKind) -> usize {
        match kind {
            PatternKind::Exact => self.exacts.len(),
            PatternKind::Prefix => self.prefixes.len(),
            PatternKind::Suffix => self.suffixes.len(),
            PatternKind::Substring => self.substrings.len(),
            PatternKind::Regex => self.regexes.len(),
        }
    }

    /// Total number of patterns.
    pub fn len(&self) -> usize {
        self.exacts.len()
            + self.prefixes.len()
            + self.suffixes.len()
            + self.substrings.len()
            + self.regexes.len()
    }

    /// Check if no patterns are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListMatcher for PatternMatcher {
    /// Load name patterns. A regex that fails to compile aborts the load.
    fn load(&mut self, reader: &mut dyn BufRead) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        for_each_line(reader, |line| {
            match self.add_clean(line)? {
                Some(true) => summary.added += 1,
                Some(false) => summary.duplicates += 1,
                None => summary.skipped += 1,
            }
            Ok(())
        })?;
        Ok(summary)
    }

    fn len(&self) -> usize {
        PatternMatcher::len(self)
    }
}

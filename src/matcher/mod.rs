//! Name and address matchers and the list format they share.
//!
//! Both list kinds are line oriented:
//! - empty lines and lines starting with `#` are ignored
//! - anything after an inline `#` is a comment
//! - surrounding whitespace is trimmed

mod ip_trie;
mod name_trie;
mod pattern;
mod range;

pub use ip_trie::{IpTrie, TrieKey};
pub use name_trie::NameTrie;
pub use pattern::{Pattern, PatternKind, PatternMatcher};
pub use range::RangeMatcher;

use std::borrow::Cow;
use std::io::BufRead;

use crate::Result;

/// Counts reported by a single list load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Entries registered
    pub added: usize,
    /// Entries that were already present
    pub duplicates: usize,
    /// Non-comment lines that were rejected and skipped
    pub skipped: usize,
}

impl LoadSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: LoadSummary) {
        self.added += other.added;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
    }
}

/// A matcher that can be populated from a line-oriented list.
///
/// Matchers are mutated only while a [`FilterSet`](crate::FilterSet) is
/// being built; once published they are read-only.
pub trait ListMatcher: Send + Sync {
    /// Read every line from `reader` into this matcher.
    fn load(&mut self, reader: &mut dyn BufRead) -> Result<LoadSummary>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Check if no entries are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip comments and whitespace from a list line.
///
/// Returns `None` for lines that carry no entry.
pub fn clean_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = match line.find('#') {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    };
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Canonical form of a query name for matching: one trailing root dot
/// removed, ASCII lowercase.
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// Drive `add` over every line in `reader`.
pub(crate) fn for_each_line<F>(reader: &mut dyn BufRead, mut add: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            return Ok(());
        }
        if let Some(line) = clean_line(&buf) {
            add(line)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line(""), None);
        assert_eq!(clean_line("   "), None);
        assert_eq!(clean_line("# comment"), None);
        assert_eq!(clean_line("  # indented comment"), None);
        assert_eq!(clean_line("ads.example.com"), Some("ads.example.com"));
        assert_eq!(clean_line("ads.example.com # tracker"), Some("ads.example.com"));
        assert_eq!(clean_line("10.0.0.0/8#private"), Some("10.0.0.0/8"));
        assert_eq!(clean_line("  padded.com\r\n"), Some("padded.com"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("example.com."), "example.com");
        assert_eq!(normalize_name("example.com"), "example.com");
        assert_eq!(normalize_name("Ads.Example.COM."), "ads.example.com");
        assert_eq!(normalize_name("."), "");
        assert!(matches!(normalize_name("plain.net"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_summary_merge() {
        let mut total = LoadSummary::default();
        total.merge(LoadSummary { added: 2, duplicates: 1, skipped: 0 });
        total.merge(LoadSummary { added: 3, duplicates: 0, skipped: 4 });
        assert_eq!(total, LoadSummary { added: 5, duplicates: 1, skipped: 4 });
    }

    #[test]
    fn test_for_each_line_skips_comments() {
        let text = "# header\none.com\n\ntwo.com # inline\n";
        let mut seen = Vec::new();
        for_each_line(&mut text.as_bytes(), |line| {
            seen.push(line.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["one.com", "two.com"]);
    }
}

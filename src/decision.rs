//! Filtering decision types.

use std::fmt;

/// Decision is the outcome of evaluating a name or address against a
/// [`FilterSet`](crate::FilterSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    /// Let the query (or record) through
    #[default]
    Allowed,
    /// Answer with a synthesized block response
    Blocked,
}

impl Decision {
    /// Returns `true` for [`Decision::Blocked`].
    pub fn is_blocked(self) -> bool {
        matches!(self, Decision::Blocked)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "ALLOWED",
            Decision::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which list a source contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Matches force [`Decision::Allowed`]
    Allow,
    /// Matches force [`Decision::Blocked`] unless also allowed
    Deny,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Allow => "allow",
            Polarity::Deny => "deny",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a list source contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Name patterns (exact, wildcard or regex)
    Names,
    /// Bare IP addresses and CIDR networks
    Cidr,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Names => "names",
            ListKind::Cidr => "cidr",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_default_is_allowed() {
        assert_eq!(Decision::default(), Decision::Allowed);
        assert!(!Decision::Allowed.is_blocked());
        assert!(Decision::Blocked.is_blocked());
    }

    #[test]
    fn test_display() {
        assert_eq!(Decision::Blocked.to_string(), "BLOCKED");
        assert_eq!(Polarity::Allow.to_string(), "allow");
        assert_eq!(ListKind::Cidr.to_string(), "cidr");
    }
}

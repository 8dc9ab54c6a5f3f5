//! Filter configuration.
//!
//! Configuration is plain data. Hosts either build a [`FilterConfig`] in
//! code or load it from YAML:
//!
//! ```yaml
//! lists:
//!   - location: /etc/k2filter/allow.txt
//!     polarity: allow
//!   - location: https://example.com/lists/ads.txt
//!     polarity: deny
//!   - location: /etc/k2filter/sinkholes.txt
//!     polarity: deny
//!     kind: cidr
//! block_ttl: 3600
//! uncloak: true
//! policy: nxdomain
//! reload:
//!   interval_secs: 3600
//!   hash_gated: true
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::{ListKind, Polarity};

/// Default TTL of synthesized block answers, in seconds.
pub const DEFAULT_BLOCK_TTL: u32 = 3600;

/// Default timeout for fetching one list source, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// How blocked queries and uncloaked replies are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockPolicy {
    /// NXDOMAIN with a synthetic SOA in the authority section.
    /// Uncloaking replaces the whole reply on the first blocked record.
    #[default]
    Nxdomain,
    /// `0.0.0.0` for A, `::` for AAAA, NXDOMAIN for anything else.
    /// Uncloaking replaces the whole reply on the first blocked record.
    Sinkhole,
    /// Direct blocks answer NXDOMAIN; uncloaking removes only the offending
    /// records and answers SERVFAIL if nothing survives.
    Strip,
}

impl BlockPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockPolicy::Nxdomain => "nxdomain",
            BlockPolicy::Sinkhole => "sinkhole",
            BlockPolicy::Strip => "strip",
        }
    }
}

/// One configured list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    /// File path, or an `http://` / `https://` URL
    pub location: String,
    pub polarity: Polarity,
    #[serde(default = "default_kind")]
    pub kind: ListKind,
}

fn default_kind() -> ListKind {
    ListKind::Names
}

impl SourceSpec {
    pub fn new(location: impl Into<String>, polarity: Polarity, kind: ListKind) -> Self {
        Self {
            location: location.into(),
            polarity,
            kind,
        }
    }

    /// Check if the location is fetched over HTTP.
    pub fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }
}

/// Reload scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Period between background reloads; `None` disables them
    pub interval_secs: Option<u64>,
    /// Skip rebuilding when the sources' digest is unchanged
    pub hash_gated: bool,
    /// Per-source fetch timeout
    pub fetch_timeout_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            hash_gated: true,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

/// Top-level filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lists in load order
    pub lists: Vec<SourceSpec>,
    /// TTL of synthesized answers
    pub block_ttl: u32,
    /// Inspect upstream replies for blocked CNAME/SVCB/HTTPS targets and addresses
    pub uncloak: bool,
    pub policy: BlockPolicy,
    pub reload: ReloadConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lists: Vec::new(),
            block_ttl: DEFAULT_BLOCK_TTL,
            uncloak: true,
            policy: BlockPolicy::default(),
            reload: ReloadConfig::default(),
        }
    }
}

impl FilterConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Reject values the filter cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.block_ttl == 0 {
            return Err(Error::Config("block_ttl must be greater than 0".to_string()));
        }
        if self.reload.interval_secs == Some(0) {
            return Err(Error::Config(
                "reload.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.reload.fetch_timeout_secs == 0 {
            return Err(Error::Config(
                "reload.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(spec) = self.lists.iter().find(|s| s.location.trim().is_empty()) {
            return Err(Error::Config(format!(
                "{} list has an empty location",
                spec.polarity
            )));
        }
        Ok(())
    }

    /// Background reload period, if enabled.
    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload.interval_secs.map(Duration::from_secs)
    }

    /// Per-source fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.reload.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.block_ttl, 3600);
        assert!(config.uncloak);
        assert_eq!(config.policy, BlockPolicy::Nxdomain);
        assert!(config.reload.hash_gated);
        assert_eq!(config.reload_interval(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
lists:
  - location: ./lists/allow.txt
    polarity: allow
  - location: https://example.com/deny.txt
    polarity: deny
  - location: ./lists/nets.txt
    polarity: deny
    kind: cidr
block_ttl: 600
policy: strip
reload:
  interval_secs: 900
"#;
        let config = FilterConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.lists.len(), 3);
        assert_eq!(config.lists[0].kind, ListKind::Names);
        assert_eq!(config.lists[2].kind, ListKind::Cidr);
        assert!(config.lists[1].is_remote());
        assert!(!config.lists[0].is_remote());
        assert_eq!(config.block_ttl, 600);
        assert!(config.uncloak);
        assert_eq!(config.policy, BlockPolicy::Strip);
        assert_eq!(config.reload_interval(), Some(Duration::from_secs(900)));
        assert!(config.reload.hash_gated);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            FilterConfig::from_yaml_str("block_ttl: 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FilterConfig::from_yaml_str("reload:\n  interval_secs: 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FilterConfig::from_yaml_str("lists:\n  - location: ''\n    polarity: deny"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FilterConfig::from_yaml_str("policy: reject"),
            Err(Error::Yaml(_))
        ));
    }
}

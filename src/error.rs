//! Error types for k2filter.

use thiserror::Error;

/// Error type for k2filter operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A list line looked like a regex but failed to compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A list source could not be opened or read.
    #[error("list source {name:?} unavailable: {source}")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Download error
    #[error("download error: {0}")]
    Download(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for k2filter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error for a single CIDR list line.
///
/// These are never fatal to a load: the line is logged and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrLineError {
    /// Neither a bare address nor valid CIDR notation
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
}

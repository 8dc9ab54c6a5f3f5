//! List sources.
//!
//! A [`ListSource`] only knows how to produce the bytes of one list.
//! Which matcher the bytes feed is carried next to it in a [`ListEntry`].

use flate2::read::GzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{FilterConfig, SourceSpec};
use crate::error::{Error, Result};
use crate::{ListKind, Polarity};

/// A readable list. Closing is dropping the returned reader.
pub trait ListSource: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Open a fresh byte stream over the list.
    fn open(&self) -> Result<Box<dyn Read + Send>>;
}

/// A list on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

impl ListSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|source| Error::Source {
            name: self.name.clone(),
            source,
        })?;
        Ok(Box::new(file))
    }
}

/// A list fetched over HTTP(S) with a blocking request.
///
/// The agent timeout bounds the whole fetch, so a hung server fails the
/// build instead of stalling it.
pub struct HttpSource {
    url: String,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSource").field("url", &self.url).finish()
    }
}

impl ListSource for HttpSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let response = self.agent.get(&self.url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                Error::Download(format!("{}: HTTP error: {}", self.url, code))
            }
            ureq::Error::Transport(t) => {
                Error::Download(format!("{}: transport error: {}", self.url, t))
            }
        })?;
        Ok(Box::new(response.into_reader()))
    }
}

/// A list held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ListSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

/// A source together with the matcher it feeds.
pub struct ListEntry {
    pub source: Box<dyn ListSource>,
    pub polarity: Polarity,
    pub kind: ListKind,
}

impl ListEntry {
    pub fn new(source: impl ListSource + 'static, polarity: Polarity, kind: ListKind) -> Self {
        Self {
            source: Box::new(source),
            polarity,
            kind,
        }
    }

    /// Build the entry a configured list describes.
    pub fn from_spec(spec: &SourceSpec, timeout: Duration) -> Self {
        let source: Box<dyn ListSource> = if spec.is_remote() {
            Box::new(HttpSource::new(&spec.location, timeout))
        } else {
            Box::new(FileSource::new(&spec.location))
        };
        Self {
            source,
            polarity: spec.polarity,
            kind: spec.kind,
        }
    }
}

impl fmt::Debug for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListEntry")
            .field("source", &self.source.name())
            .field("polarity", &self.polarity)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Entries for every list in `config`, in configuration order.
pub fn entries_from_config(config: &FilterConfig) -> Vec<ListEntry> {
    let timeout = config.fetch_timeout();
    config
        .lists
        .iter()
        .map(|spec| ListEntry::from_spec(spec, timeout))
        .collect()
}

/// Check if data is gzip compressed.
fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Read a source to the end, decompressing gzip payloads.
pub fn fetch(source: &dyn ListSource) -> Result<Vec<u8>> {
    let read_error = |source_err| Error::Source {
        name: source.name().to_string(),
        source: source_err,
    };

    let mut raw = Vec::new();
    source
        .open()?
        .read_to_end(&mut raw)
        .map_err(read_error)?;

    if !is_gzip(&raw) {
        return Ok(raw);
    }

    let mut data = Vec::new();
    GzDecoder::new(&raw[..])
        .read_to_end(&mut data)
        .map_err(read_error)?;
    log::debug!(
        "Decompressed {}: {} bytes (compressed: {} bytes)",
        source.name(),
        data.len(),
        raw.len()
    );
    Ok(data)
}

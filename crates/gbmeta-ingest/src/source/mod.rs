// Source file providers
//
// A provider lists candidate division files with a fingerprint and fetches
// one of them into a worker's workspace. Everything downstream only sees
// local paths.

pub mod ftp;
pub mod local;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::IngestError;

pub use ftp::{FtpConfig, FtpEntry, FtpSource};
pub use local::LocalSource;

/// Change-detection signature of a source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size.map_or_else(|| "?".to_string(), |s| s.to_string());
        write!(
            f,
            "size={} modified={} checksum={}",
            size,
            self.modified.as_deref().unwrap_or("?"),
            self.checksum.as_deref().unwrap_or("?")
        )
    }
}

/// A candidate source file as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Provider-relative path, e.g. `/genbank/gbvrl1.seq.gz`
    pub filename: String,
    pub fingerprint: Fingerprint,
}

impl SourceItem {
    pub fn new(filename: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            filename: filename.into(),
            fingerprint,
        }
    }

    /// Last path component of `filename`
    pub fn base_name(&self) -> &str {
        self.filename
            .rsplit('/')
            .next()
            .unwrap_or(&self.filename)
    }
}

/// A source file available on local disk
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub path: PathBuf,

    /// Downloaded copy that the worker deletes after processing
    pub temporary: bool,
}

impl FetchedFile {
    /// Delete the file if it is a temporary download
    pub fn release(self) {
        if self.temporary {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to delete '{}': {}", self.path.display(), e);
            }
        }
    }
}

/// Lists and fetches source files
pub trait SourceProvider: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Files matching `filter`, a `<directory>/<glob>` pattern
    fn list(&self, filter: &str) -> anyhow::Result<Vec<SourceItem>>;

    /// Make `item` available locally, downloading into `dest_dir` if needed
    fn fetch(&self, item: &SourceItem, dest_dir: &Path) -> Result<FetchedFile, IngestError>;

    /// Release identifier of the remote data set, if the provider has one
    fn current_release(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Split a `<directory>/<glob>` filter into its two halves
pub fn split_filter(filter: &str) -> (&str, &str) {
    match filter.rfind('/') {
        Some(0) => ("/", &filter[1..]),
        Some(i) => (&filter[..i], &filter[i + 1..]),
        None => ("", filter),
    }
}

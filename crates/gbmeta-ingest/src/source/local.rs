//! Division files already on local disk

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gbmeta_common::checksum::sha256_file;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{split_filter, FetchedFile, Fingerprint, SourceItem, SourceProvider};
use crate::error::IngestError;

/// Serves files from one directory. Only the file-name half of each filter
/// is used; its directory half is ignored.
pub struct LocalSource {
    root: PathBuf,
    checksum: bool,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            checksum: false,
        }
    }

    /// Include a SHA-256 of the file contents in every fingerprint
    pub fn with_checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        let checksum = if self.checksum {
            Some(sha256_file(path).with_context(|| format!("Failed to hash {}", path.display()))?)
        } else {
            None
        };

        Ok(Fingerprint {
            size: Some(meta.len()),
            modified,
            checksum,
        })
    }
}

impl SourceProvider for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn list(&self, filter: &str) -> Result<Vec<SourceItem>> {
        let (_, pattern) = split_filter(filter);
        let full = self.root.join(pattern);
        let full = full
            .to_str()
            .with_context(|| format!("Non UTF-8 path: {}", full.display()))?;

        let mut items = Vec::new();
        for entry in glob::glob(full).with_context(|| format!("Invalid filter '{}'", filter))? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                },
            };
            if !path.is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            debug!("Found local file {}", path.display());
            items.push(SourceItem::new(name, self.fingerprint(&path)?));
        }

        info!("{} files in {} match '{}'", items.len(), self.root.display(), pattern);
        Ok(items)
    }

    fn fetch(&self, item: &SourceItem, _dest_dir: &Path) -> Result<FetchedFile, IngestError> {
        let path = self.root.join(item.base_name());
        if !path.is_file() {
            return Err(IngestError::transfer(
                &item.filename,
                format!("{} does not exist", path.display()),
            ));
        }

        Ok(FetchedFile {
            path,
            temporary: false,
        })
    }
}

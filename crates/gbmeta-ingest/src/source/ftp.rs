//! NCBI FTP source
//!
//! Synchronous `suppaftp` client used from worker threads. Every operation
//! opens its own connection in extended passive mode and is retried with a
//! linearly growing delay.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use suppaftp::FtpStream;
use tracing::{debug, info, warn};

use super::{split_filter, FetchedFile, Fingerprint, SourceItem, SourceProvider};
use crate::error::IngestError;

/// Maximum number of attempts for one FTP operation
pub const MAX_RETRIES: u32 = 3;

/// Base delay between attempts; attempt `n` waits `n` times this
pub const RETRY_DELAY_SECS: u64 = 5;

/// Connection settings for the FTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "ftp.ncbi.nlm.nih.gov".to_string(),
            port: 21,
            username: "anonymous".to_string(),
            password: "anonymous".to_string(),
        }
    }
}

/// Division files served over FTP
pub struct FtpSource {
    config: FtpConfig,
    release_path: String,
    retry_delay: Duration,
}

impl FtpSource {
    pub fn new(config: FtpConfig, release_path: impl Into<String>) -> Self {
        Self {
            config,
            release_path: release_path.into(),
            retry_delay: Duration::from_secs(RETRY_DELAY_SECS),
        }
    }

    /// Override the base retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn with_retry<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            debug!("{} attempt {}/{}", what, attempt, MAX_RETRIES);
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_RETRIES => {
                    let delay = self.retry_delay * attempt;
                    warn!(
                        "{} attempt {}/{} failed: {:#}. Retrying in {:?}...",
                        what, attempt, MAX_RETRIES, e, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                },
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("{} failed after {} attempts", what, MAX_RETRIES))
                },
            }
        }
    }

    fn connect(&self) -> Result<FtpStream> {
        debug!("Connecting to FTP server: {}:{}", self.config.host, self.config.port);

        let mut ftp = FtpStream::connect(format!("{}:{}", self.config.host, self.config.port))
            .context("Failed to connect to FTP server")?;
        ftp.set_mode(suppaftp::Mode::ExtendedPassive);
        ftp.login(&self.config.username, &self.config.password)
            .context("Failed to login to FTP server")?;
        ftp.transfer_type(suppaftp::types::FileType::Binary)
            .context("Failed to set binary mode")?;

        Ok(ftp)
    }

    fn list_once(&self, dir: &str) -> Result<Vec<FtpEntry>> {
        let mut ftp = self.connect()?;
        let lines = ftp
            .list(Some(dir))
            .with_context(|| format!("Failed to list directory: {}", dir))?;
        quit(&mut ftp);

        Ok(lines.iter().filter_map(|l| FtpEntry::parse(l)).collect())
    }

    fn download_once(&self, remote: &str, dest: &Path) -> Result<u64> {
        let mut ftp = self.connect()?;

        let mut out = BufWriter::new(
            File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?,
        );
        let mut stream = ftp
            .retr_as_stream(remote)
            .with_context(|| format!("Failed to retrieve {}", remote))?;
        let bytes = io::copy(&mut stream, &mut out).context("Failed to read file data")?;
        ftp.finalize_retr_stream(stream)
            .context("Failed to complete transfer")?;
        out.flush()?;
        quit(&mut ftp);

        Ok(bytes)
    }

    fn read_small_file(&self, remote: &str) -> Result<String> {
        let mut ftp = self.connect()?;
        let cursor = ftp
            .retr_as_buffer(remote)
            .with_context(|| format!("Failed to retrieve {}", remote))?;
        quit(&mut ftp);

        String::from_utf8(cursor.into_inner()).context("File is not UTF-8")
    }
}

impl SourceProvider for FtpSource {
    fn name(&self) -> &str {
        &self.config.host
    }

    fn list(&self, filter: &str) -> Result<Vec<SourceItem>> {
        let (dir, pattern) = split_filter(filter);
        let pattern = glob::Pattern::new(pattern)
            .with_context(|| format!("Invalid filename filter '{}'", filter))?;

        let entries = self.with_retry(&format!("LIST {}", dir), || self.list_once(dir))?;
        let items: Vec<SourceItem> = entries
            .into_iter()
            .filter(|e| !e.is_directory && pattern.matches(&e.name))
            .map(|e| {
                let fingerprint = Fingerprint {
                    size: e.size,
                    modified: e.modified,
                    checksum: None,
                };
                SourceItem::new(format!("{}/{}", dir.trim_end_matches('/'), e.name), fingerprint)
            })
            .collect();

        info!("{} files on {} match '{}'", items.len(), self.config.host, filter);
        Ok(items)
    }

    fn fetch(&self, item: &SourceItem, dest_dir: &Path) -> Result<FetchedFile, IngestError> {
        let dest = dest_dir.join(item.base_name());
        let bytes = self
            .with_retry(&format!("RETR {}", item.filename), || {
                self.download_once(&item.filename, &dest)
            })
            .map_err(|e| IngestError::transfer(&item.filename, format!("{:#}", e)))?;

        debug!("Downloaded {} ({} bytes)", item.filename, bytes);
        Ok(FetchedFile {
            path: dest,
            temporary: true,
        })
    }

    fn current_release(&self) -> Result<Option<String>> {
        let text = self.with_retry(&format!("RETR {}", self.release_path), || {
            self.read_small_file(&self.release_path)
        })?;
        let release = text.trim().to_string();
        info!("Current remote release: {}", release);
        Ok(Some(release))
    }
}

fn quit(ftp: &mut FtpStream) {
    if let Err(e) = ftp.quit() {
        warn!("Failed to quit FTP session gracefully: {}", e);
    }
}

/// Parsed line of a Unix-style `LIST` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: Option<u64>,

    /// Date columns as printed by the server, e.g. `Jan 15 12:00`
    pub modified: Option<String>,
}

impl FtpEntry {
    /// `-rw-r--r--   1 ftp anonymous 12345678 Jan 15 12:00 gbvrl1.seq.gz`
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }

        let is_directory = parts[0].starts_with('d');
        let name = parts.last()?.to_string();
        let size = parts.get(4).and_then(|s| s.parse().ok());
        let modified = (parts.len() >= 9).then(|| parts[5..8].join(" "));

        Some(Self {
            name,
            is_directory,
            size,
            modified,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_entry() {
        let entry =
            FtpEntry::parse("-r--r--r--   1 ftp anonymous 262563487 Dec 14 02:24 gbbct1.seq.gz")
                .unwrap();
        assert_eq!(entry.name, "gbbct1.seq.gz");
        assert!(!entry.is_directory);
        assert_eq!(entry.size, Some(262563487));
        assert_eq!(entry.modified.as_deref(), Some("Dec 14 02:24"));
    }

    #[test]
    fn test_parse_directory_entry() {
        let entry = FtpEntry::parse("drwxr-xr-x   2 ftp ftp  4096 Jan 15  2024 complete").unwrap();
        assert!(entry.is_directory);
        assert_eq!(entry.modified.as_deref(), Some("Jan 15 2024"));
    }

    #[test]
    fn test_parse_short_line() {
        assert!(FtpEntry::parse("").is_none());
        assert!(FtpEntry::parse("total 12").is_none());
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let source = FtpSource::new(FtpConfig::default(), "/genbank/GB_Release_Number")
            .with_retry_delay(Duration::ZERO);
        let mut calls = 0;

        let result: Result<()> = source.with_retry("noop", || {
            calls += 1;
            anyhow::bail!("unreachable host")
        });

        assert!(result.is_err());
        assert_eq!(calls, MAX_RETRIES);
    }

    #[test]
    fn test_retry_returns_first_success() {
        let source = FtpSource::new(FtpConfig::default(), "/genbank/GB_Release_Number")
            .with_retry_delay(Duration::ZERO);
        let mut calls = 0;

        let value = source
            .with_retry("flaky", || {
                calls += 1;
                if calls < 2 {
                    anyhow::bail!("timeout")
                }
                Ok(calls)
            })
            .unwrap();

        assert_eq!(value, 2);
    }
}

//! Item-level failures
//!
//! Any of these aborts processing of one source file. The worker logs it,
//! discards the file's staged rows and moves on; the file stays out of the
//! ledger so the next run retries it.

use thiserror::Error;

use crate::genbank::RecordError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("record starting on line {line} rejected: {source}")]
    Record {
        line: usize,
        #[source]
        source: RecordError,
    },

    #[error("transfer of '{filename}' failed: {reason}")]
    Transfer { filename: String, reason: String },

    #[error("fingerprint mismatch for '{filename}': expected {expected}, got {actual}")]
    FingerprintMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("failed to commit rows to table '{table}': {source}")]
    Commit {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rows committed but ledger update failed: {0}")]
    Ledger(#[from] gbmeta_common::GbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn transfer(filename: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transfer {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }
}

//! gbmeta ingest library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns GenBank/RefSeq flat files into load-ready, tab-delimited table files
//! and bulk-loads them into PostgreSQL.
//!
//! The pipeline for one source file is
//! [`PreFilter`](genbank::PreFilter) → [`RecordSplitter`](genbank::RecordSplitter)
//! → [`RecordParser`](genbank::RecordParser) → [`TableSet`](table::TableSet).
//! The [`orchestrator`] runs that pipeline on a pool of worker threads against
//! a [`WorkQueue`](queue::WorkQueue) derived from the processing
//! [`Ledger`](queue::Ledger).

pub mod config;
pub mod error;
pub mod genbank;
pub mod loader;
pub mod orchestrator;
pub mod queue;
pub mod release;
pub mod source;
pub mod table;

pub use config::IngestConfig;
pub use error::IngestError;

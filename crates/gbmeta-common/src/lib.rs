//! gbmeta common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging setup and file fingerprint helpers for the
//! gbmeta workspace.
//!
//! - **Error Handling**: [`GbError`] and the [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//! - **Checksums**: content digests used for source fingerprints and partition keys
//!
//! # Example
//!
//! ```no_run
//! use gbmeta_common::{checksum, Result};
//!
//! fn fingerprint(path: &str) -> Result<String> {
//!     checksum::sha256_file(path)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{GbError, Result};

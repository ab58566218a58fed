//! One worker of the pool
//!
//! A worker owns a scratch directory, a parser and a set of table writers.
//! It pops source files until the queue is empty. Each file is either fully
//! committed and recorded in the ledger, or leaves no trace in the output.

use flate2::read::MultiGzDecoder;
use std::any::Any;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::error::IngestError;
use crate::genbank::{filter_lines, lossy_lines, project, RecordParser, RecordSplitter, Table};
use crate::queue::{Ledger, QueueItem, WorkQueue};
use crate::source::{SourceItem, SourceProvider};
use crate::table::{CommitLocks, TableSet};

/// State shared by every worker of a run
pub struct SharedState<'a> {
    pub provider: &'a dyn SourceProvider,
    pub queue: &'a WorkQueue<SourceItem>,
    pub ledger: &'a Ledger,
    pub locks: &'a CommitLocks,
    pub output_dir: &'a Path,
    pub work_dir: &'a Path,
}

/// A source file the worker gave up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub filename: String,
    pub worker: i64,
    pub error: String,
}

/// What one worker did before the queue ran dry
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub processed: usize,
    pub records: u64,
    pub failed: Vec<FailedItem>,
}

pub struct Worker<'a> {
    id: i64,
    shared: &'a SharedState<'a>,
    parser: RecordParser,
    tables: TableSet<Table>,
    // Dropped last so the table temp files inside it are gone first
    workspace: TempDir,
}

impl<'a> Worker<'a> {
    pub fn new(id: i64, shared: &'a SharedState<'a>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(shared.work_dir)?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("gbmeta-worker-{}-", id))
            .tempdir_in(shared.work_dir)?;

        let tables = TableSet::open(&workspace.path().join("tables"), shared.output_dir, shared.locks)?;

        Ok(Self {
            id,
            shared,
            parser: RecordParser::new()?,
            tables,
            workspace,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Process items until the queue is empty
    pub fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport::default();
        debug!("[{}] started in {}", self.id, self.workspace.path().display());

        while let Some(QueueItem { item, number }) = self.shared.queue.pop_next() {
            let total = self.shared.queue.total();
            info!(
                "[{}] ({}/{}, {:.1}%) processing '{}'",
                self.id,
                number,
                total,
                number as f64 * 100.0 / total as f64,
                item.filename
            );

            let error = match panic::catch_unwind(AssertUnwindSafe(|| self.process(&item))) {
                Ok(Ok(records)) => {
                    report.processed += 1;
                    report.records += records;
                    continue;
                },
                Ok(Err(e)) => {
                    error!("[{}] failed to process '{}': {}", self.id, item.filename, e);
                    e.to_string()
                },
                Err(payload) => {
                    self.tables.discard_all();
                    let message = format!("worker panicked: {}", panic_message(payload.as_ref()));
                    error!("[{}] {} while processing '{}'", self.id, message, item.filename);
                    message
                },
            };
            report.failed.push(FailedItem {
                filename: item.filename.clone(),
                worker: self.id,
                error,
            });
        }

        debug!("[{}] queue empty, stopping", self.id);
        report
    }

    /// Fetch, parse and commit one source file. Returns the record count.
    fn process(&mut self, item: &SourceItem) -> Result<u64, IngestError> {
        let fetched = self.shared.provider.fetch(item, self.workspace.path())?;

        let result = check_size(item, &fetched.path).and_then(|()| self.ingest(item, &fetched.path));
        fetched.release();

        match result {
            Ok(records) => {
                self.shared.ledger.record(item)?;
                Ok(records)
            },
            Err(e) => {
                self.tables.discard_all();
                Err(e)
            },
        }
    }

    fn ingest(&mut self, item: &SourceItem, path: &Path) -> Result<u64, IngestError> {
        let reader = open_source(path)?;
        let mut splitter = RecordSplitter::new(filter_lines(lossy_lines(reader)));
        let mut records = 0u64;

        for raw in splitter.by_ref() {
            let raw = raw?;
            let record = match self.parser.parse(&raw.text) {
                Ok(record) => record,
                Err(source) => {
                    error!(
                        "[{}] record at line {} of '{}' ({} bytes) rejected: {}",
                        self.id,
                        raw.first_line,
                        item.filename,
                        raw.size(),
                        source
                    );
                    error!("[{}] rejected record text:\n{}", self.id, raw.text);
                    return Err(IngestError::Record {
                        line: raw.first_line,
                        source,
                    });
                },
            };

            project(&record, &mut self.tables)?;
            records += 1;
        }

        let replaced = splitter.get_ref().get_ref().replaced();
        if replaced > 0 {
            warn!(
                "[{}] '{}' has {} lines with invalid UTF-8; the bad bytes were replaced with U+FFFD",
                self.id, item.filename, replaced
            );
        }

        let stats = splitter.get_ref().stats();
        if stats.single_line_translations > 0 {
            warn!(
                "[{}] '{}' has {} single-line /translation values; following lines were dropped until the next closing quote",
                self.id, item.filename, stats.single_line_translations
            );
        }
        debug!(
            "[{}] '{}': {} of {} lines kept, {} records, {} rows staged",
            self.id,
            item.filename,
            stats.lines_emitted,
            stats.lines_read,
            records,
            self.tables.pending_rows()
        );

        self.tables.commit()?;
        Ok(records)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}

fn check_size(item: &SourceItem, path: &Path) -> Result<(), IngestError> {
    let Some(expected) = item.fingerprint.size else {
        return Ok(());
    };

    let actual = std::fs::metadata(path)?.len();
    if actual != expected {
        return Err(IngestError::FingerprintMismatch {
            filename: item.filename.clone(),
            expected: format!("{} bytes", expected),
            actual: format!("{} bytes", actual),
        });
    }
    Ok(())
}

/// Line reader over a plain or gzip-compressed file
fn open_source(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");

    Ok(if is_gzip {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

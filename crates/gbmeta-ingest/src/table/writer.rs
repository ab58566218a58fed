// Buffered, two-phase table writer
//
// add_row -> in-memory buffer
// flush   -> worker temp file (repeatable, not a commit)
// finalize_updates -> master file (once per source file, the commit point)

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use super::locks::CommitLocks;
use super::value::{encode_row, FieldValue, LINE_DELIM};
use crate::error::IngestError;

/// Buffered bytes that trigger an automatic flush to the temp file
pub const BYTE_THRESHOLD: usize = 500_000;

/// Output buffer for one table of one worker
pub struct BufferedTableWriter {
    table: String,
    temp_path: PathBuf,
    master_path: PathBuf,
    buffer: String,
    buffered_bytes: usize,
    pending_rows: u64,
    locks: CommitLocks,
}

impl BufferedTableWriter {
    /// Create a writer staging into `temp_dir` and committing into
    /// `output_dir/file_name`. The master file is created empty if missing.
    pub fn new(
        table: impl Into<String>,
        file_name: &str,
        temp_dir: &Path,
        output_dir: &Path,
        locks: CommitLocks,
    ) -> io::Result<Self> {
        fs::create_dir_all(temp_dir)?;
        fs::create_dir_all(output_dir)?;

        let master_path = output_dir.join(file_name);
        OpenOptions::new().create(true).append(true).open(&master_path)?;

        Ok(Self {
            table: table.into(),
            temp_path: temp_dir.join(file_name),
            master_path,
            buffer: String::new(),
            buffered_bytes: 0,
            pending_rows: 0,
            locks,
        })
    }

    pub fn master_path(&self) -> &Path {
        &self.master_path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Rows added since the last commit or discard
    pub fn pending_rows(&self) -> u64 {
        self.pending_rows
    }

    /// Buffer one row. All-null rows are skipped and `false` is returned.
    pub fn add_row(&mut self, fields: &[FieldValue<'_>]) -> io::Result<bool> {
        let Some(line) = encode_row(fields) else {
            return Ok(false);
        };

        self.buffered_bytes += line.len();
        self.buffer.push_str(&line);
        self.buffer.push(LINE_DELIM);
        self.pending_rows += 1;

        if self.buffered_bytes >= BYTE_THRESHOLD {
            self.flush()?;
        }
        Ok(true)
    }

    /// Append buffered rows to the temp file and empty the buffer
    pub fn flush(&mut self) -> io::Result<()> {
        let data = std::mem::take(&mut self.buffer);
        self.buffered_bytes = 0;

        let mut temp = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.temp_path)?;
        temp.write_all(data.as_bytes())?;
        temp.flush()
    }

    /// Append everything staged for this source file to the master file,
    /// then delete the temp file.
    ///
    /// Appends to one master file are serialised across workers. If the
    /// append fails the master file is cut back to its previous length, so
    /// either all of this writer's rows land or none do.
    pub fn finalize_updates(&mut self) -> Result<u64, IngestError> {
        if !self.buffer.is_empty() {
            self.flush().map_err(|source| self.commit_error(source))?;
        }

        let result = self.append_temp_to_master();
        self.remove_temp();
        let rows = std::mem::take(&mut self.pending_rows);

        match result {
            Ok(bytes) => {
                debug!("Committed {} rows ({} bytes) to {}", rows, bytes, self.table);
                Ok(rows)
            },
            Err(source) => {
                error!(
                    "Failed to append staged rows to '{}'; master file restored",
                    self.master_path.display()
                );
                Err(self.commit_error(source))
            },
        }
    }

    /// Drop buffered and staged rows without touching the master file
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.buffered_bytes = 0;
        self.pending_rows = 0;
        self.remove_temp();
    }

    fn append_temp_to_master(&self) -> io::Result<u64> {
        let mut temp = match File::open(&self.temp_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let lock = self.locks.get(&self.table);
        let _guard = lock.lock();

        let mut master = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.master_path)?;
        let committed_len = master.metadata()?.len();

        let appended = io::copy(&mut temp, &mut master).and_then(|bytes| {
            master.sync_data()?;
            Ok(bytes)
        });

        if appended.is_err() {
            if let Err(e) = master.set_len(committed_len) {
                warn!(
                    "Could not truncate '{}' back to {} bytes: {}",
                    self.master_path.display(),
                    committed_len,
                    e
                );
            }
        }
        appended
    }

    fn remove_temp(&self) {
        match fs::remove_file(&self.temp_path) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => warn!("Failed to delete temp file '{}': {}", self.temp_path.display(), e),
        }
    }

    fn commit_error(&self, source: io::Error) -> IngestError {
        IngestError::Commit {
            table: self.table.clone(),
            source,
        }
    }
}

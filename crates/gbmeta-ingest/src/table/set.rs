// The writers of one worker, one per output table

use std::io;
use std::marker::PhantomData;
use std::path::Path;
use tracing::warn;

use super::locks::CommitLocks;
use super::writer::BufferedTableWriter;
use crate::error::IngestError;

/// A fixed family of output tables
pub trait TableKind: Copy + 'static {
    /// Every table, in commit and load order
    fn all() -> &'static [Self];

    /// Position of this table in [`all`](Self::all)
    fn index(self) -> usize;

    /// Table name, also used as the commit lock name
    fn name(self) -> &'static str;

    /// Master file name inside the output directory
    fn file_name(self) -> &'static str;
}

/// One [`BufferedTableWriter`] per table of `T`
pub struct TableSet<T: TableKind> {
    writers: Vec<BufferedTableWriter>,
    _kind: PhantomData<T>,
}

impl<T: TableKind> TableSet<T> {
    pub fn open(temp_dir: &Path, output_dir: &Path, locks: &CommitLocks) -> io::Result<Self> {
        let writers = T::all()
            .iter()
            .map(|t| {
                BufferedTableWriter::new(t.name(), t.file_name(), temp_dir, output_dir, locks.clone())
            })
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            writers,
            _kind: PhantomData,
        })
    }

    /// Create every master file in `output_dir` that does not exist yet
    pub fn create_master_files(output_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(output_dir)?;
        for table in T::all() {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(output_dir.join(table.file_name()))?;
        }
        Ok(())
    }

    pub fn writer(&mut self, table: T) -> &mut BufferedTableWriter {
        &mut self.writers[table.index()]
    }

    /// Flush and finalize every table. Returns the number of rows committed.
    ///
    /// Tables commit independently: when one fails, the ones before it stay
    /// committed and the ones after it are discarded.
    pub fn commit(&mut self) -> Result<u64, IngestError> {
        let mut rows = 0;
        for i in 0..self.writers.len() {
            match self.writers[i].finalize_updates() {
                Ok(n) => rows += n,
                Err(e) => {
                    if i > 0 {
                        warn!(
                            "{} of {} tables were already committed before the failure",
                            i,
                            self.writers.len()
                        );
                    }
                    self.writers[i + 1..].iter_mut().for_each(BufferedTableWriter::discard);
                    return Err(e);
                },
            }
        }
        Ok(rows)
    }

    /// Throw away everything staged since the last commit
    pub fn discard_all(&mut self) {
        self.writers.iter_mut().for_each(BufferedTableWriter::discard);
    }

    pub fn pending_rows(&self) -> u64 {
        self.writers.iter().map(BufferedTableWriter::pending_rows).sum()
    }
}

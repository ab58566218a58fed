//! Append-only record of committed source files
//!
//! One JSON object per line in `<output_dir>/.metadata`. The whole file is
//! read at startup into a map keyed by filename; later lines win.

use gbmeta_common::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::source::{Fingerprint, SourceItem};

/// Ledger file name inside the output directory
pub const LEDGER_FILE: &str = ".metadata";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub filename: String,
    pub fingerprint: Fingerprint,
}

impl From<&SourceItem> for LedgerEntry {
    fn from(item: &SourceItem) -> Self {
        Self {
            filename: item.filename.clone(),
            fingerprint: item.fingerprint.clone(),
        }
    }
}

struct LedgerState {
    entries: HashMap<String, Fingerprint>,
    file: File,
    /// A previous append failed part way; the file may end mid-line
    torn: bool,
}

/// Shared, thread-safe handle to the ledger file
pub struct Ledger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Load `<output_dir>/.metadata`, creating it if missing
    pub fn open(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(LEDGER_FILE);

        let entries = if path.exists() {
            read_entries(&path)?
        } else {
            HashMap::new()
        };
        info!("Ledger {} has {} completed files", path.display(), entries.len());

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if !ends_with_newline(&path)? {
            file.write_all(b"\n")?;
        }
        Ok(Self {
            path,
            state: Mutex::new(LedgerState {
                entries,
                file,
                torn: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if `item` was committed before with the same fingerprint
    pub fn has_completed(&self, item: &SourceItem) -> bool {
        self.state
            .lock()
            .entries
            .get(&item.filename)
            .is_some_and(|fp| *fp == item.fingerprint)
    }

    /// Append `item` and flush it to disk
    pub fn record(&self, item: &SourceItem) -> Result<()> {
        self.record_all(std::slice::from_ref(item))
    }

    /// Append every item with a single sync
    pub fn record_all(&self, items: &[SourceItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut lines = String::new();
        for item in items {
            lines.push_str(&serde_json::to_string(&LedgerEntry::from(item))?);
            lines.push('\n');
        }

        let mut state = self.state.lock();
        let LedgerState { file, torn, .. } = &mut *state;
        append(file, torn, lines.as_bytes())?;
        file.flush()?;
        file.sync_data()?;
        for item in items {
            state
                .entries
                .insert(item.filename.clone(), item.fingerprint.clone());
        }

        match items {
            [item] => debug!("Recorded {} in ledger", item.filename),
            _ => debug!("Recorded {} files in ledger", items.len()),
        }
        Ok(())
    }

    /// Rewrite the file with one line per filename
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.lock();
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        let mut names: Vec<&String> = state.entries.keys().collect();
        names.sort();

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for name in names {
            let entry = LedgerEntry {
                filename: name.clone(),
                fingerprint: state.entries[name].clone(),
            };
            writeln!(tmp, "{}", serde_json::to_string(&entry)?)?;
        }
        tmp.as_file().sync_data()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        state.file = OpenOptions::new().append(true).open(&self.path)?;
        state.torn = false;
        debug!("Compacted ledger to {} entries", state.entries.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write `data`, first ending any line a failed write left open
fn append(out: &mut impl Write, torn: &mut bool, data: &[u8]) -> io::Result<()> {
    if *torn {
        out.write_all(b"\n")?;
        *torn = false;
    }
    out.write_all(data).inspect_err(|_| *torn = true)
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn read_entries(path: &Path) -> Result<HashMap<String, Fingerprint>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = HashMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LedgerEntry>(&line) {
            Ok(entry) => {
                entries.insert(entry.filename, entry.fingerprint);
            },
            Err(e) => warn!("Skipping unreadable ledger line {} in {}: {}", idx + 1, path.display(), e),
        }
    }

    Ok(entries)
}

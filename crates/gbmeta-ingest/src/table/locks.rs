// Per-name locks created on first use

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Map from a name to its own mutex-guarded state.
///
/// The outer lock is held only while looking up or creating an entry, so work
/// under different names never contends after the first access.
pub struct NamedLocks<T> {
    entries: Arc<Mutex<HashMap<String, Arc<Mutex<T>>>>>,
}

impl<T: Default> NamedLocks<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The lock for `name`, created with `T::default()` on first request
    pub fn get(&self, name: &str) -> Arc<Mutex<T>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(name) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(Mutex::new(T::default()));
        entries.insert(name.to_string(), Arc::clone(&entry));
        entry
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Default> Default for NamedLocks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for NamedLocks<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

/// Serialises appends to each master file across workers
pub type CommitLocks = NamedLocks<()>;

// Surrogate key allocation

use std::collections::HashMap;

use super::locks::NamedLocks;

#[derive(Debug, Default)]
struct TableKeys {
    last_id: i64,
    ids: HashMap<String, i64>,
}

impl TableKeys {
    fn allocate(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Process-wide integer ids, counted separately for each table.
///
/// Ids start at 1 and are never reused until [`reset`](Self::reset). Callers
/// for different tables do not block each other. Clones share state.
#[derive(Clone, Default)]
pub struct KeyRegistry {
    tables: NamedLocks<TableKeys>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused id for `table`
    pub fn next_id(&self, table: &str) -> i64 {
        self.tables.get(table).lock().allocate()
    }

    /// Id already assigned to `key` in `table`, or a newly allocated one
    pub fn id_for(&self, table: &str, key: &str) -> i64 {
        let entry = self.tables.get(table);
        let mut keys = entry.lock();
        if let Some(id) = keys.ids.get(key) {
            return *id;
        }
        let id = keys.allocate();
        keys.ids.insert(key.to_string(), id);
        id
    }

    /// Forget every table and key. Must not race with allocation.
    pub fn reset(&self) {
        self.tables.clear();
    }
}

//! Pending work for one run

use gbmeta_common::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

use super::ledger::Ledger;
use crate::source::SourceItem;

/// An item handed to a worker with its 1-based position in the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem<T> {
    pub item: T,
    pub number: usize,
}

/// FIFO shared by all workers of a run. Items are never re-enqueued.
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    total: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let items: VecDeque<T> = items.into_iter().collect();
        let total = items.len();
        Self {
            items: Mutex::new(items),
            total,
        }
    }

    /// Remove and return the next item, or `None` once the queue is drained
    pub fn pop_next(&self) -> Option<QueueItem<T>> {
        let mut items = self.items.lock();
        let item = items.pop_front()?;
        let number = self.total - items.len();
        Some(QueueItem { item, number })
    }

    /// Number of items the queue started with
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Outcome of comparing discovered files against the ledger
pub struct QueuePlan {
    pub queue: WorkQueue<SourceItem>,
    pub skipped: usize,
}

/// Enqueue every discovered item whose fingerprint is not in the ledger.
/// Unchanged items are skipped and recorded again.
pub fn plan(discovered: Vec<SourceItem>, ledger: &Ledger) -> Result<QueuePlan> {
    let mut pending = Vec::with_capacity(discovered.len());
    let mut unchanged = Vec::new();

    for item in discovered {
        if ledger.has_completed(&item) {
            debug!("Skipping unchanged {}", item.filename);
            unchanged.push(item);
        } else {
            pending.push(item);
        }
    }
    ledger.record_all(&unchanged)?;

    Ok(QueuePlan {
        queue: WorkQueue::new(pending),
        skipped: unchanged.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::Fingerprint;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn item(name: &str, size: u64) -> SourceItem {
        SourceItem::new(
            name,
            Fingerprint {
                size: Some(size),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_pop_numbers_from_one() {
        let queue = WorkQueue::new(["a", "b", "c"]);
        assert_eq!(queue.total(), 3);

        assert_eq!(queue.pop_next(), Some(QueueItem { item: "a", number: 1 }));
        assert_eq!(queue.pop_next(), Some(QueueItem { item: "b", number: 2 }));
        assert_eq!(queue.remaining(), 1);
        assert_eq!(queue.pop_next(), Some(QueueItem { item: "c", number: 3 }));
        assert_eq!(queue.pop_next(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_pops_hand_out_each_item_once() {
        let queue = Arc::new(WorkQueue::new(0..1000));
        let seen = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(next) = queue.pop_next() {
                        seen.lock().push((next.item, next.number));
                    }
                });
            }
        });

        let seen = seen.into_inner();
        assert_eq!(seen.len(), 1000);
        let items: HashSet<i32> = seen.iter().map(|(i, _)| *i).collect();
        let numbers: HashSet<usize> = seen.iter().map(|(_, n)| *n).collect();
        assert_eq!(items.len(), 1000);
        assert_eq!(numbers, (1..=1000).collect());
    }

    #[test]
    fn test_plan_skips_unchanged_and_requeues_changed() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.record(&item("done", 10)).unwrap();
        ledger.record(&item("changed", 10)).unwrap();

        let plan = plan(
            vec![item("done", 10), item("changed", 11), item("new", 1)],
            &ledger,
        )
        .unwrap();

        assert_eq!(plan.skipped, 1);
        let mut names = Vec::new();
        while let Some(next) = plan.queue.pop_next() {
            names.push(next.item.filename);
        }
        assert_eq!(names, vec!["changed", "new"]);

        // the unchanged file is recorded again, in one batch
        let text = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().last().unwrap().contains("\"done\""));
    }
}

//! Worker pool sizing

use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// Host resources the pool is sized against
pub trait ResourceProbe: Send + Sync {
    fn cores(&self) -> usize;

    fn available_memory_mb(&self) -> u64;
}

/// Reads the running host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ResourceProbe for SystemProbe {
    fn cores(&self) -> usize {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    fn available_memory_mb(&self) -> u64 {
        use sysinfo::System;

        let mut system = System::new();
        system.refresh_memory();
        system.available_memory() / (1024 * 1024)
    }
}

/// Fixed values, for tests and for a configured memory budget
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe {
    pub cores: usize,
    pub available_memory_mb: u64,
}

impl ResourceProbe for FixedProbe {
    fn cores(&self) -> usize {
        self.cores
    }

    fn available_memory_mb(&self) -> u64 {
        self.available_memory_mb
    }
}

/// Number of workers to start.
///
/// One worker on hosts with two cores or fewer. Otherwise as many as the
/// memory allows, at least one and leaving two cores free. Never more than
/// there are queued items.
pub fn worker_count(cores: usize, available_mb: u64, per_worker_mb: u64, queue_len: usize) -> usize {
    let by_host = if cores <= 2 {
        1
    } else {
        let by_memory = usize::try_from(available_mb / per_worker_mb.max(1)).unwrap_or(usize::MAX);
        by_memory.min(cores - 2).max(1)
    };
    by_host.min(queue_len)
}

/// Pool size for this host, with the optional hard cap applied. Warns when
/// the host has less memory than one worker needs.
pub fn plan_workers(
    probe: &dyn ResourceProbe,
    per_worker_mb: u64,
    max_workers: Option<usize>,
    queue_len: usize,
) -> usize {
    let cores = probe.cores();
    let available_mb = probe.available_memory_mb();

    if available_mb < per_worker_mb {
        warn!(
            "Available memory ({} MB) is {} MB below the {} MB a worker needs; expect degraded performance",
            available_mb,
            per_worker_mb - available_mb,
            per_worker_mb
        );
    }

    let mut count = worker_count(cores, available_mb, per_worker_mb, queue_len);
    if let Some(cap) = max_workers {
        count = count.min(cap);
    }

    debug!(
        "{} cores, {} MB available, {} MB per worker, {} queued -> {} workers",
        cores, available_mb, per_worker_mb, queue_len, count
    );
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_hosts_get_one_worker() {
        assert_eq!(worker_count(1, 100_000, 400, 10), 1);
        assert_eq!(worker_count(2, 100_000, 400, 10), 1);
        assert_eq!(worker_count(1, 0, 400, 10), 1);
    }

    #[test]
    fn test_memory_bound() {
        assert_eq!(worker_count(8, 1000, 400, 10), 2);
        assert_eq!(worker_count(8, 100, 400, 10), 1);
    }

    #[test]
    fn test_core_bound() {
        assert_eq!(worker_count(8, 100_000, 400, 100), 6);
    }

    #[test]
    fn test_queue_bound() {
        assert_eq!(worker_count(8, 100_000, 400, 3), 3);
        assert_eq!(worker_count(8, 100_000, 400, 0), 0);
        assert_eq!(worker_count(1, 100_000, 400, 0), 0);
    }

    #[test]
    fn test_plan_workers_applies_cap() {
        let probe = FixedProbe {
            cores: 16,
            available_memory_mb: 64_000,
        };
        assert_eq!(plan_workers(&probe, 400, None, 50), 14);
        assert_eq!(plan_workers(&probe, 400, Some(4), 50), 4);
    }

    #[test]
    fn test_plan_workers_low_memory_still_runs() {
        let probe = FixedProbe {
            cores: 8,
            available_memory_mb: 100,
        };
        assert_eq!(plan_workers(&probe, 400, None, 5), 1);
    }

    proptest! {
        #[test]
        fn prop_count_within_bounds(
            cores in 1usize..64,
            mem in 0u64..1_000_000,
            per in 1u64..10_000,
            queue in 0usize..100,
        ) {
            let n = worker_count(cores, mem, per, queue);
            prop_assert!(n <= queue);
            prop_assert!(n <= cores.saturating_sub(2).max(1));
            if queue > 0 {
                prop_assert!(n >= 1);
            }
        }
    }
}

// Prepare-mode orchestration
//
// Idle -> Discovering -> Queued -> Running -> Draining -> Done
//
// Discovery lists every configured filter on the source, the ledger decides
// what still needs work, and a pool of OS threads drains the queue. Workers
// only share the queue, the ledger and the per-table commit locks.

pub mod pool;
pub mod worker;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::genbank::Table;
use crate::queue::{plan, Ledger};
use crate::release::ReleaseMarker;
use crate::source::{SourceItem, SourceProvider};
use crate::table::{CommitLocks, KeyRegistry, TableSet};

pub use pool::{plan_workers, worker_count, FixedProbe, ResourceProbe, SystemProbe};
pub use worker::{FailedItem, SharedState, Worker, WorkerReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Discovering,
    Queued,
    Running,
    Draining,
    Done,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Discovering => "discovering",
            OrchestratorState::Queued => "queued",
            OrchestratorState::Running => "running",
            OrchestratorState::Draining => "draining",
            OrchestratorState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of one prepare run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub discovered: usize,
    pub skipped: usize,
    pub queued: usize,
    pub workers: usize,
    pub processed: usize,
    pub failed: Vec<FailedItem>,
    pub records: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} discovered, {} unchanged, {} queued, {} processed, {} failed, {} records with {} workers in {:.2}s",
            self.discovered,
            self.skipped,
            self.queued,
            self.processed,
            self.failed.len(),
            self.records,
            self.workers,
            self.elapsed.as_secs_f64()
        )
    }
}

pub struct Orchestrator {
    config: IngestConfig,
    probe: Box<dyn ResourceProbe>,
    registry: KeyRegistry,
    locks: CommitLocks,
    state: OrchestratorState,
}

impl Orchestrator {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            probe: Box::new(SystemProbe),
            registry: KeyRegistry::new(),
            locks: CommitLocks::new(),
            state: OrchestratorState::Idle,
        }
    }

    /// Size the pool against `probe` instead of the running host
    pub fn with_probe(mut self, probe: impl ResourceProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn transition(&mut self, next: OrchestratorState) {
        info!("Orchestrator {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run one prepare pass against `provider`.
    ///
    /// Bootstrap failures (bad config, release check, discovery, ledger) are
    /// returned as errors. Failures of individual files are listed in the
    /// summary and retried on the next run.
    pub fn run(&mut self, provider: &dyn SourceProvider) -> Result<RunSummary> {
        let started = Instant::now();
        self.config.validate()?;
        self.registry.reset();
        self.locks.clear();
        self.state = OrchestratorState::Idle;

        let output_dir = self.config.output_dir.clone();
        let work_dir = self.config.work_dir.clone();

        if let Some(release) = provider
            .current_release()
            .context("Failed to read current release")?
        {
            ReleaseMarker::sync(&output_dir, &release).context("Failed to sync release marker")?;
        }

        TableSet::<Table>::create_master_files(&output_dir)
            .with_context(|| format!("Failed to create master files in {}", output_dir.display()))?;
        let ledger = Ledger::open(&output_dir).context("Failed to open ledger")?;
        ledger.compact().context("Failed to compact ledger")?;

        self.transition(OrchestratorState::Discovering);
        let discovered = self.discover(provider)?;
        let discovered_count = discovered.len();

        self.transition(OrchestratorState::Queued);
        let plan = plan(discovered, &ledger).context("Failed to update ledger")?;
        let queue = plan.queue;
        info!(
            "{} files discovered, {} unchanged, {} queued",
            discovered_count,
            plan.skipped,
            queue.total()
        );

        self.transition(OrchestratorState::Running);
        let workers = self.pool_size(queue.total());

        let shared = SharedState {
            provider,
            queue: &queue,
            ledger: &ledger,
            locks: &self.locks,
            output_dir: &output_dir,
            work_dir: &work_dir,
        };
        let mut pool = Vec::with_capacity(workers);
        for _ in 0..workers {
            let id = self.registry.next_id("worker");
            pool.push(Worker::new(id, &shared).with_context(|| format!("Failed to start worker {}", id))?);
        }

        let reports = std::thread::scope(|scope| -> Result<Vec<WorkerReport>> {
            let mut handles = Vec::with_capacity(pool.len());
            for worker in pool {
                let id = worker.id();
                let handle = std::thread::Builder::new()
                    .name(format!("worker-{}", id))
                    .spawn_scoped(scope, move || worker.run())
                    .with_context(|| format!("Failed to spawn worker {}", id))?;
                handles.push((id, handle));
            }

            self.state = OrchestratorState::Draining;
            info!("Orchestrator running -> draining ({} workers)", handles.len());

            let mut reports = Vec::with_capacity(handles.len());
            for (id, handle) in handles {
                match handle.join() {
                    Ok(report) => reports.push(report),
                    Err(_) => {
                        error!("[{}] worker panicked between files", id);
                        reports.push(WorkerReport {
                            failed: vec![FailedItem {
                                filename: String::new(),
                                worker: id,
                                error: "worker panicked between files".to_string(),
                            }],
                            ..Default::default()
                        });
                    },
                }
            }
            Ok(reports)
        })?;

        let mut summary = RunSummary {
            discovered: discovered_count,
            skipped: plan.skipped,
            queued: queue.total(),
            workers,
            ..Default::default()
        };
        for report in reports {
            summary.processed += report.processed;
            summary.records += report.records;
            summary.failed.extend(report.failed);
        }
        summary.elapsed = started.elapsed();

        for failed in &summary.failed {
            error!("[{}] '{}' failed: {}", failed.worker, failed.filename, failed.error);
        }

        self.transition(OrchestratorState::Done);
        info!("Prepare finished: {}", summary);
        Ok(summary)
    }

    fn discover(&self, provider: &dyn SourceProvider) -> Result<Vec<SourceItem>> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for filter in &self.config.filename_filters {
            let listed = provider
                .list(filter)
                .with_context(|| format!("Failed to list '{}' on {}", filter, provider.name()))?;
            items.extend(listed.into_iter().filter(|i| seen.insert(i.filename.clone())));
        }

        Ok(items)
    }

    fn pool_size(&self, queue_len: usize) -> usize {
        let per_worker = self.config.memory_per_worker_mb;
        let max_workers = self.config.max_workers;

        match self.config.memory_budget_mb {
            Some(budget) => {
                let probe = FixedProbe {
                    cores: self.probe.cores(),
                    available_memory_mb: budget,
                };
                plan_workers(&probe, per_worker, max_workers, queue_len)
            },
            None => plan_workers(self.probe.as_ref(), per_worker, max_workers, queue_len),
        }
    }
}

//! Main synchronization engine

use crate::{
    canonical::PathCanonicalizer,
    diff::DiffEngine,
    executor::Executor,
    progress::ProgressReporter,
    scanner::TreeScanner,
};
use dirmirror_config::{EngineSettings, RunContext, TaskEntry};
use dirmirror_types::{Concurrency, Error, ItemFailure, Result, SyncStats, SyncTask};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{error, info};

/// Outcome of one task that ran to completion
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// The task, with the roots actually used
    pub task: SyncTask,
    /// Counters
    pub stats: SyncStats,
    /// Per-item failures that were contained
    pub failures: Vec<ItemFailure>,
    /// Nothing had to be copied or deleted
    pub already_synchronized: bool,
    /// Wall-clock time of the task
    pub elapsed: Duration,
}

impl TaskReport {
    /// Whether every item succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A task that stopped before execution because of a non-fatal error
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    /// The task as it was given
    pub task: SyncTask,
    /// What went wrong
    pub message: String,
}

/// Aggregate over all tasks of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Reports of completed tasks, in run order
    pub reports: Vec<TaskReport>,
    /// Tasks that could not be completed
    pub failed_tasks: Vec<TaskFailure>,
    /// Wall-clock time across all tasks
    pub elapsed: Duration,
}

impl RunSummary {
    /// Counters summed over every completed task
    pub fn totals(&self) -> SyncStats {
        let mut totals = SyncStats::new();
        for report in &self.reports {
            totals.merge(&report.stats);
        }
        totals
    }

    /// Whether any task failed or any item failed
    pub fn has_failures(&self) -> bool {
        !self.failed_tasks.is_empty() || self.reports.iter().any(|r| !r.is_clean())
    }
}

/// Main synchronization engine
#[derive(Debug, Clone)]
pub struct SyncEngine {
    canonicalizer: PathCanonicalizer,
    scanner: TreeScanner,
    diff_engine: DiffEngine,
    executor: Executor,
    reporter: ProgressReporter,
    concurrency: Concurrency,
}

impl SyncEngine {
    /// Create an engine resolving paths against `context`
    pub fn new(context: &RunContext, settings: &EngineSettings) -> Self {
        let concurrency = settings.max_concurrency;
        let reporter = ProgressReporter::disabled();

        Self {
            canonicalizer: PathCanonicalizer::from_context(context, settings.env_marker_char()),
            scanner: TreeScanner::new(),
            diff_engine: DiffEngine::new(concurrency),
            executor: Executor::new(concurrency, reporter.clone()),
            reporter,
            concurrency,
        }
    }

    /// Send progress events to `reporter`
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.executor = Executor::new(self.concurrency, reporter.clone());
        self.reporter = reporter;
        self
    }

    /// Build a task from two user-supplied paths
    pub async fn task_from_paths(&self, source: &str, destination: &str) -> SyncTask {
        let source = self.canonicalizer.canonicalize(source).await;
        let destination = self.canonicalizer.canonicalize(destination).await;
        SyncTask::new(source, destination).with_origin("command line")
    }

    /// Build tasks from task-list entries, in list order
    pub async fn tasks_from_entries(&self, entries: &[TaskEntry]) -> Vec<SyncTask> {
        let mut tasks = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let task = self.task_from_paths(&entry.from, &entry.to).await;
            tasks.push(task.with_origin(format!("task list entry #{}", index + 1)));
        }
        tasks
    }

    /// Mirror `task.source` onto `task.destination`.
    ///
    /// Fails with [`Error::SourceMissing`] or [`Error::SourceNotDirectory`] when
    /// the source is unusable, and with an I/O error when the destination cannot
    /// be created or either tree cannot be scanned. Per-item failures during
    /// execution are returned inside the report.
    pub async fn sync(&self, mut task: SyncTask) -> Result<TaskReport> {
        let start_time = Instant::now();

        info!("Sync From: {} To: {}", task.source, task.destination);
        self.reporter.task_started(&task);

        check_source(&task).await?;
        ensure_destination(&task).await?;
        task.source = task.source.with_trailing_separator();
        let destination = task.destination.clone().with_trailing_separator();
        task.set_destination(destination);

        let (source_files, dest_files) = futures::try_join!(
            self.scanner.scan_files(&task.source),
            self.scanner.scan_files(&task.destination)
        )?;

        let mut stats = SyncStats::new();
        stats.source_files = source_files.len() as u64;
        stats.destination_files = dest_files.len() as u64;

        let plan = self
            .diff_engine
            .plan(&task, &source_files, &dest_files)
            .await;
        info!(
            "(source files {}, to copy {}, to delete {})",
            stats.source_files,
            plan.copies.len(),
            plan.deletions.len()
        );

        let already_synchronized = plan.is_synchronized();
        let failures = if already_synchronized {
            info!("already synchronized");
            Vec::new()
        } else {
            let outcome = self.executor.execute(&task.destination, &plan).await;
            stats.merge(&outcome.stats);
            outcome.failures
        };

        let elapsed = start_time.elapsed();
        stats.duration = elapsed;
        self.reporter.task_completed(task.id, &stats);

        info!(
            "Task finished in {:?}: {} copied, {} deleted, {} dirs pruned, {} failures",
            elapsed, stats.files_copied, stats.files_deleted, stats.directories_pruned, stats.failures
        );

        Ok(TaskReport {
            task,
            stats,
            failures,
            already_synchronized,
            elapsed,
        })
    }

    /// Run `tasks` strictly one after another.
    ///
    /// A fatal error ends the run and is returned. Any other task-level error
    /// is recorded in the summary and the next task starts.
    pub async fn sync_all(&self, tasks: Vec<SyncTask>) -> Result<RunSummary> {
        let start_time = Instant::now();
        let mut summary = RunSummary::default();

        for task in tasks {
            match self.sync(task.clone()).await {
                Ok(report) => summary.reports.push(report),
                Err(e) if e.is_fatal() => {
                    error!("{}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Task {} -> {} failed: {}", task.source, task.destination, e);
                    summary.failed_tasks.push(TaskFailure {
                        task,
                        message: e.to_string(),
                    });
                }
            }
        }

        summary.elapsed = start_time.elapsed();
        info!(
            "All tasks done in {:?} ({} completed, {} failed)",
            summary.elapsed,
            summary.reports.len(),
            summary.failed_tasks.len()
        );
        Ok(summary)
    }
}

async fn check_source(task: &SyncTask) -> Result<()> {
    let path = PathBuf::from(task.source.as_str());
    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::SourceNotDirectory { path }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::SourceMissing { path }),
        Err(e) => Err(Error::io_at(&path, &e)),
    }
}

/// Create the destination if it is missing
async fn ensure_destination(task: &SyncTask) -> Result<()> {
    let path = task.destination.as_path();
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::PathIo {
            path: path.to_path_buf(),
            message: "destination exists and is not a directory".to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating destination {}", task.destination);
            fs::create_dir_all(path)
                .await
                .map_err(|e| Error::io_at(path, &e))
        }
        Err(e) => Err(Error::io_at(path, &e)),
    }
}

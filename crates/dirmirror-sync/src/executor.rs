//! Phase execution
//!
//! Each phase dispatches its items concurrently and joins them before the next
//! phase starts. A failing item is logged, reported and recorded in the phase
//! outcome; it never stops its siblings or the phases that follow.

use crate::diff::SyncPlan;
use crate::progress::ProgressReporter;
use dirmirror_types::{
    CanonicalPath, Concurrency, DirectorySet, ItemFailure, Operation, OperationSet, Phase,
    SyncStats, SEPARATOR,
};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of one phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// Items that completed, in completion order
    pub completed: Vec<CanonicalPath>,
    /// Bytes written by completed items
    pub bytes: u64,
    /// Items that failed
    pub failures: Vec<ItemFailure>,
}

impl PhaseOutcome {
    /// Number of completed items
    pub fn completed_count(&self) -> u64 {
        self.completed.len() as u64
    }

    fn record_failure(&mut self, reporter: &ProgressReporter, failure: ItemFailure) {
        warn!("{}", failure);
        reporter.item_failed(&failure);
        self.failures.push(failure);
    }
}

/// Result of all phases of one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Counters filled by the phases
    pub stats: SyncStats,
    /// Every contained failure, phase by phase
    pub failures: Vec<ItemFailure>,
}

impl ExecutionOutcome {
    fn absorb(&mut self, outcome: PhaseOutcome) {
        self.stats.failures += outcome.failures.len() as u64;
        self.failures.extend(outcome.failures);
    }
}

/// What the emptiness check found for one prune candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupancy {
    Empty,
    Occupied,
    Vanished,
}

/// Applies a [`SyncPlan`] to the filesystem
#[derive(Debug, Clone)]
pub struct Executor {
    concurrency: Concurrency,
    reporter: ProgressReporter,
}

impl Executor {
    /// Create an executor; `concurrency` bounds in-flight items per phase
    pub fn new(concurrency: Concurrency, reporter: ProgressReporter) -> Self {
        Self {
            concurrency,
            reporter,
        }
    }

    /// Run allocate, copy, delete and prune, in that order.
    ///
    /// Pruning only considers directories that held a successfully deleted file.
    /// `destination_root` itself is removed when nothing is left in it; the next
    /// run recreates it.
    pub async fn execute(&self, destination_root: &CanonicalPath, plan: &SyncPlan) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();

        let allocated = self.allocate(&plan.directories).await;
        outcome.stats.directories_created = allocated.completed_count();
        outcome.absorb(allocated);

        let copied = self.copy(&plan.copies).await;
        outcome.stats.files_copied = copied.completed_count();
        outcome.stats.bytes_copied = copied.bytes;
        outcome.absorb(copied);

        let deleted = self.delete(&plan.deletions).await;
        outcome.stats.files_deleted = deleted.completed_count();
        let pruned = self.prune(destination_root, &deleted.completed).await;
        outcome.absorb(deleted);

        outcome.stats.directories_pruned = pruned.completed_count();
        outcome.absorb(pruned);

        outcome
    }

    /// Create every directory in `directories`, ancestors included
    pub async fn allocate(&self, directories: &DirectorySet) -> PhaseOutcome {
        let items: Vec<CanonicalPath> = directories.iter().cloned().collect();

        self.run_phase(Phase::Allocate, items, |dir| {
            let target = dir.clone();
            (dir, async move {
                fs::create_dir_all(target.as_path()).await?;
                Ok::<u64, io::Error>(0)
            })
        })
        .await
    }

    /// Copy each operation's source onto its target, overwriting
    pub async fn copy(&self, copies: &OperationSet) -> PhaseOutcome {
        let items: Vec<Operation> = copies.iter().cloned().collect();

        self.run_phase(Phase::Copy, items, |operation| {
            let target = operation.target.clone();
            (target, async move {
                let source = operation.source.as_ref().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "copy operation without a source")
                })?;
                let bytes = fs::copy(source.as_path(), operation.target.as_path()).await?;
                debug!("Copied {} ({} bytes, {})", operation.target, bytes, operation.reason);
                Ok::<u64, io::Error>(bytes)
            })
        })
        .await
    }

    /// Remove each operation's target file
    pub async fn delete(&self, deletions: &OperationSet) -> PhaseOutcome {
        let items: Vec<CanonicalPath> = deletions.targets().cloned().collect();

        self.run_phase(Phase::Delete, items, |file| {
            let target = file.clone();
            (file, async move {
                fs::remove_file(target.as_path()).await?;
                Ok::<u64, io::Error>(0)
            })
        })
        .await
    }

    /// Remove directories left without files after `deleted` were removed.
    ///
    /// Candidates are processed deepest first, one depth level at a time, so a
    /// directory is only examined after all of its candidate descendants. Once a
    /// directory is removed its parent becomes a candidate, up to and including
    /// `root`.
    pub async fn prune(&self, root: &CanonicalPath, deleted: &[CanonicalPath]) -> PhaseOutcome {
        let mut levels: BTreeMap<usize, BTreeSet<CanonicalPath>> = BTreeMap::new();
        for dir in deleted.iter().filter_map(|file| prune_candidate(root, file)) {
            levels.entry(depth(&dir)).or_default().insert(dir);
        }

        let mut outcome = PhaseOutcome::default();
        if levels.is_empty() {
            return outcome;
        }

        let mut total: u64 = levels.values().map(|dirs| dirs.len() as u64).sum();
        let mut examined = 0u64;
        info!("{}: {} candidates", Phase::Prune, total);
        self.reporter.phase_started(Phase::Prune, total);

        while let Some((_, dirs)) = levels.pop_last() {
            let mut results = stream::iter(dirs)
                .map(|dir| async move {
                    let result = prune_directory(&dir).await;
                    (dir, result)
                })
                .buffer_unordered(self.concurrency.get());

            while let Some((dir, result)) = results.next().await {
                examined += 1;
                let climb = match result {
                    Ok(Occupancy::Empty) => {
                        debug!("Removed empty directory {}", dir);
                        self.reporter.item_completed(Phase::Prune, examined, total, &dir);
                        outcome.completed.push(dir.clone());
                        true
                    }
                    Ok(Occupancy::Vanished) => true,
                    Ok(Occupancy::Occupied) => false,
                    Err(e) => {
                        outcome.record_failure(
                            &self.reporter,
                            ItemFailure {
                                phase: Phase::Prune,
                                path: dir.clone(),
                                message: e.to_string(),
                            },
                        );
                        false
                    }
                };

                if climb {
                    if let Some(parent) = prune_candidate(root, &dir) {
                        if levels.entry(depth(&parent)).or_default().insert(parent) {
                            total += 1;
                        }
                    }
                }
            }
        }

        info!(
            "{}: {} removed, {} failed",
            Phase::Prune,
            outcome.completed.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// Dispatch `items` concurrently and collect their results.
    ///
    /// `action` maps an item to the path reported for it and the future doing
    /// the work; the future resolves to the number of bytes written.
    async fn run_phase<T, F, Fut>(&self, phase: Phase, items: Vec<T>, action: F) -> PhaseOutcome
    where
        F: Fn(T) -> (CanonicalPath, Fut),
        Fut: Future<Output = io::Result<u64>>,
    {
        let total = items.len() as u64;
        let mut outcome = PhaseOutcome::default();
        if total == 0 {
            return outcome;
        }

        info!("{}: {} items", phase, total);
        self.reporter.phase_started(phase, total);

        let mut results = stream::iter(items)
            .map(|item| {
                let (path, work) = action(item);
                async move { (path, work.await) }
            })
            .buffer_unordered(self.concurrency.get());

        let mut processed = 0u64;
        while let Some((path, result)) = results.next().await {
            processed += 1;
            match result {
                Ok(bytes) => {
                    self.reporter.item_completed(phase, processed, total, &path);
                    outcome.bytes += bytes;
                    outcome.completed.push(path);
                }
                Err(e) => outcome.record_failure(
                    &self.reporter,
                    ItemFailure {
                        phase,
                        path,
                        message: e.to_string(),
                    },
                ),
            }
        }

        info!(
            "{}: {} done, {} failed",
            phase,
            outcome.completed.len(),
            outcome.failures.len()
        );
        outcome
    }
}

/// Parent directory of `path` if it is `root` or lies below it
fn prune_candidate(root: &CanonicalPath, path: &CanonicalPath) -> Option<CanonicalPath> {
    let parent = path.parent_dir()?;
    let root_dir = root.as_str().trim_end_matches(SEPARATOR);
    if root_dir.is_empty() {
        return None;
    }

    let inside = parent.as_str() == root_dir
        || parent
            .relative_to(root)
            .is_some_and(|relative| !relative.is_empty());
    inside.then_some(parent)
}

fn depth(path: &CanonicalPath) -> usize {
    path.as_str().matches(SEPARATOR).count()
}

/// Remove `dir` recursively if its subtree holds no files
async fn prune_directory(dir: &CanonicalPath) -> io::Result<Occupancy> {
    let walk_root = dir.as_path().to_path_buf();
    let occupancy = tokio::task::spawn_blocking(move || occupancy(walk_root))
        .await
        .map_err(io::Error::other)?;

    if occupancy != Occupancy::Empty {
        return Ok(occupancy);
    }

    match fs::remove_dir_all(dir.as_path()).await {
        Ok(()) => Ok(Occupancy::Empty),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Occupancy::Vanished),
        Err(e) => Err(e),
    }
}

/// Any non-directory entry, or any entry that cannot be read, makes a subtree occupied
fn occupancy(dir: PathBuf) -> Occupancy {
    for entry in WalkDir::new(dir) {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => {}
            Ok(_) => return Occupancy::Occupied,
            Err(e) => {
                let vanished = e.depth() == 0
                    && e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound);
                return if vanished {
                    Occupancy::Vanished
                } else {
                    Occupancy::Occupied
                };
            }
        }
    }
    Occupancy::Empty
}

//! Progress tracking for synchronization operations
//!
//! Events are fire-and-forget: a closed or absent receiver is never an error and
//! nothing sent here influences how a phase runs.

use dirmirror_types::{CanonicalPath, ItemFailure, Phase, SyncStats, SyncTask, TaskId};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Per-item progress within one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemProgress {
    /// Phase the item belongs to
    pub phase: Phase,
    /// Items finished so far, this one included
    pub completed: u64,
    /// Items in the phase
    pub total: u64,
    /// Path identifying the item
    pub path: CanonicalPath,
}

impl ItemProgress {
    /// Phase completion in percent
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Progress event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A task began; sent before scanning
    TaskStarted {
        /// Task identifier
        task_id: TaskId,
        /// Source root
        source: CanonicalPath,
        /// Destination root
        destination: CanonicalPath,
    },
    /// A phase began with `total` items
    PhaseStarted {
        /// Phase that started
        phase: Phase,
        /// Items in the phase
        total: u64,
    },
    /// One item finished successfully
    ItemCompleted(ItemProgress),
    /// One item failed; the phase continues
    ItemFailed(ItemFailure),
    /// A task finished all phases it entered
    TaskCompleted {
        /// Task identifier
        task_id: TaskId,
        /// Final counters
        stats: SyncStats,
    },
}

/// Progress reporter for sync operations
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    event_tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// Create a reporter together with the receiving end of its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                event_tx: Some(event_tx),
            },
            event_rx,
        )
    }

    /// A reporter that only logs
    pub fn disabled() -> Self {
        Self { event_tx: None }
    }

    /// Whether events are delivered anywhere
    pub fn is_enabled(&self) -> bool {
        self.event_tx
            .as_ref()
            .is_some_and(|event_tx| !event_tx.is_closed())
    }

    /// Report that a task started
    pub fn task_started(&self, task: &SyncTask) {
        debug!("Task {} started: {} -> {}", task.id, task.source, task.destination);
        self.send(ProgressEvent::TaskStarted {
            task_id: task.id,
            source: task.source.clone(),
            destination: task.destination.clone(),
        });
    }

    /// Report that a phase started
    pub fn phase_started(&self, phase: Phase, total: u64) {
        debug!("{} ({} items)", phase, total);
        self.send(ProgressEvent::PhaseStarted { phase, total });
    }

    /// Report one completed item
    pub fn item_completed(&self, phase: Phase, completed: u64, total: u64, path: &CanonicalPath) {
        let progress = ItemProgress {
            phase,
            completed,
            total,
            path: path.clone(),
        };
        debug!("[{:>5.1}%] {}: {}", progress.percent(), phase, path);
        self.send(ProgressEvent::ItemCompleted(progress));
    }

    /// Report one failed item
    pub fn item_failed(&self, failure: &ItemFailure) {
        self.send(ProgressEvent::ItemFailed(failure.clone()));
    }

    /// Report that a task completed
    pub fn task_completed(&self, task_id: TaskId, stats: &SyncStats) {
        self.send(ProgressEvent::TaskCompleted {
            task_id,
            stats: stats.clone(),
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(event_tx) = &self.event_tx {
            // A dropped receiver only means nobody is watching
            let _ = event_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn path(s: &str) -> CanonicalPath {
        CanonicalPath::from_canonical(s)
    }

    #[rstest]
    #[case(0, 0, 100.0)]
    #[case(1, 4, 25.0)]
    #[case(4, 4, 100.0)]
    fn test_percent(#[case] completed: u64, #[case] total: u64, #[case] expected: f64) {
        let progress = ItemProgress {
            phase: Phase::Copy,
            completed,
            total,
            path: path("/dst/a.txt"),
        };
        assert!((progress.percent() - expected).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let (reporter, mut event_rx) = ProgressReporter::channel();
        assert!(reporter.is_enabled());

        reporter.phase_started(Phase::Delete, 2);
        reporter.item_completed(Phase::Delete, 1, 2, &path("/dst/a.txt"));
        reporter.item_failed(&ItemFailure {
            phase: Phase::Delete,
            path: path("/dst/b.txt"),
            message: "denied".to_string(),
        });

        assert!(matches!(
            event_rx.recv().await,
            Some(ProgressEvent::PhaseStarted {
                phase: Phase::Delete,
                total: 2
            })
        ));
        match event_rx.recv().await {
            Some(ProgressEvent::ItemCompleted(progress)) => {
                assert_eq!(progress.completed, 1);
                assert!((progress.percent() - 50.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            event_rx.recv().await,
            Some(ProgressEvent::ItemFailed(_))
        ));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (reporter, event_rx) = ProgressReporter::channel();
        drop(event_rx);

        assert!(!reporter.is_enabled());
        reporter.phase_started(Phase::Copy, 1);
    }

    #[test]
    fn test_disabled_reporter() {
        let reporter = ProgressReporter::disabled();
        assert!(!reporter.is_enabled());
        reporter.task_completed(any_task_id(), &SyncStats::new());
    }

    fn any_task_id() -> TaskId {
        SyncTask::new(path("/src/"), path("/dst/")).id
    }
}

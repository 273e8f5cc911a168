//! JSON output structures for dirmirror

use dirmirror_config::RunContext;
use dirmirror_sync::{RunSummary, TaskReport};
use dirmirror_types::{ItemFailure, SyncStats};
use serde::Serialize;

/// Complete JSON output for one run
#[derive(Debug, Serialize)]
pub struct RunResultJson {
    /// Run metadata
    pub metadata: RunMetadata,
    /// Completed tasks in run order
    pub tasks: Vec<TaskResultJson>,
    /// Tasks stopped by a task-level error
    pub failed_tasks: Vec<FailedTaskJson>,
    /// Counters summed over completed tasks
    pub totals: StatsJson,
    /// Overall result
    pub result: OperationResult,
}

/// Run metadata
#[derive(Debug, Serialize)]
pub struct RunMetadata {
    /// dirmirror version
    pub version: String,
    /// Timestamp when the output was produced
    pub timestamp: String,
    /// Directory relative paths were resolved against
    pub working_dir: Option<String>,
    /// Wall-clock time across all tasks in milliseconds
    pub elapsed_ms: u128,
}

impl RunMetadata {
    fn new(working_dir: Option<String>, elapsed_ms: u128) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            working_dir,
            elapsed_ms,
        }
    }
}

/// One completed task
#[derive(Debug, Serialize)]
pub struct TaskResultJson {
    /// Canonical source root
    pub source: String,
    /// Canonical destination root
    pub destination: String,
    /// Where the task came from
    pub origin: String,
    /// Nothing had to change
    pub already_synchronized: bool,
    /// Task counters
    pub stats: StatsJson,
    /// Per-item failures
    pub failures: Vec<ItemFailure>,
}

impl From<&TaskReport> for TaskResultJson {
    fn from(report: &TaskReport) -> Self {
        Self {
            source: report.task.source.to_string(),
            destination: report.task.destination.to_string(),
            origin: report.task.origin.clone(),
            already_synchronized: report.already_synchronized,
            stats: StatsJson::from(&report.stats),
            failures: report.failures.clone(),
        }
    }
}

/// A task that did not complete
#[derive(Debug, Serialize)]
pub struct FailedTaskJson {
    /// Source as given
    pub source: String,
    /// Destination as given
    pub destination: String,
    /// Error message
    pub error: String,
}

/// Counters in JSON format
#[derive(Debug, Default, Serialize)]
pub struct StatsJson {
    /// Files under the source root
    pub source_files: u64,
    /// Files under the destination root before execution
    pub destination_files: u64,
    /// Directories created
    pub directories_created: u64,
    /// Files copied
    pub files_copied: u64,
    /// Bytes copied
    pub bytes_copied: u64,
    /// Files deleted
    pub files_deleted: u64,
    /// Empty directories removed
    pub directories_pruned: u64,
    /// Items that failed
    pub failures: u64,
    /// Duration in milliseconds
    pub duration_ms: u128,
}

impl From<&SyncStats> for StatsJson {
    fn from(stats: &SyncStats) -> Self {
        Self {
            source_files: stats.source_files,
            destination_files: stats.destination_files,
            directories_created: stats.directories_created,
            files_copied: stats.files_copied,
            bytes_copied: stats.bytes_copied,
            files_deleted: stats.files_deleted,
            directories_pruned: stats.directories_pruned,
            failures: stats.failures,
            duration_ms: stats.duration.as_millis(),
        }
    }
}

/// Overall result
#[derive(Debug, Serialize)]
pub struct OperationResult {
    /// Whether the run completed without task-level errors
    pub success: bool,
    /// Process exit code
    pub exit_code: i32,
    /// Error message if the run stopped
    pub error_message: Option<String>,
}

impl RunResultJson {
    /// Output for a run that completed
    pub fn from_summary(context: &RunContext, summary: &RunSummary, exit_code: i32) -> Self {
        Self {
            metadata: RunMetadata::new(
                Some(context.working_dir.display().to_string()),
                summary.elapsed.as_millis(),
            ),
            tasks: summary.reports.iter().map(TaskResultJson::from).collect(),
            failed_tasks: summary
                .failed_tasks
                .iter()
                .map(|failed| FailedTaskJson {
                    source: failed.task.source.to_string(),
                    destination: failed.task.destination.to_string(),
                    error: failed.message.clone(),
                })
                .collect(),
            totals: StatsJson::from(&summary.totals()),
            result: OperationResult {
                success: exit_code == 0,
                exit_code,
                error_message: None,
            },
        }
    }

    /// Output for a run stopped by a fatal error
    pub fn from_error(error: &anyhow::Error, exit_code: i32) -> Self {
        Self {
            metadata: RunMetadata::new(None, 0),
            tasks: Vec::new(),
            failed_tasks: Vec::new(),
            totals: StatsJson::default(),
            result: OperationResult {
                success: false,
                exit_code,
                error_message: Some(format!("{:#}", error)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirmirror_sync::TaskFailure;
    use dirmirror_types::{CanonicalPath, SyncTask};
    use std::time::Duration;

    fn task(source: &str, destination: &str) -> SyncTask {
        SyncTask::new(
            CanonicalPath::from_canonical(source),
            CanonicalPath::from_canonical(destination),
        )
    }

    #[test]
    fn test_summary_json() {
        let mut stats = SyncStats::new();
        stats.files_copied = 2;
        stats.bytes_copied = 10;
        stats.duration = Duration::from_millis(7);

        let summary = RunSummary {
            reports: vec![TaskReport {
                task: task("/src/", "/dst/"),
                stats,
                failures: Vec::new(),
                already_synchronized: false,
                elapsed: Duration::from_millis(7),
            }],
            failed_tasks: vec![TaskFailure {
                task: task("/a/", "/b"),
                message: "boom".to_string(),
            }],
            elapsed: Duration::from_millis(9),
        };

        let output = RunResultJson::from_summary(&RunContext::new("/work"), &summary, 4);
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["tasks"][0]["source"], "/src/");
        assert_eq!(value["tasks"][0]["stats"]["files_copied"], 2);
        assert_eq!(value["totals"]["bytes_copied"], 10);
        assert_eq!(value["failed_tasks"][0]["error"], "boom");
        assert_eq!(value["metadata"]["elapsed_ms"], 9);
        assert_eq!(value["result"]["success"], false);
        assert_eq!(value["result"]["exit_code"], 4);
    }

    #[test]
    fn test_error_json() {
        let error = anyhow::anyhow!("/missing not exists");
        let value = serde_json::to_value(RunResultJson::from_error(&error, 1)).unwrap();

        assert_eq!(value["result"]["exit_code"], 1);
        assert_eq!(value["result"]["error_message"], "/missing not exists");
        assert!(value["tasks"].as_array().unwrap().is_empty());
    }
}

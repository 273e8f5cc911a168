//! Directory mirroring engine for dirmirror
//!
//! This crate makes a destination tree match a source tree:
//!
//! - **Path canonicalization**: one separator convention, environment variable
//!   expansion and trailing separators on directory roots
//! - **Tree scanning**: recursive enumeration of the files under a root
//! - **Difference detection**: files are matched by relative path and compared by
//!   size, yielding copy, delete and directory-allocation sets
//! - **Execution**: allocate, copy, delete and prune phases with concurrent
//!   fan-out and per-item failure isolation
//! - **Progress tracking**: events on a channel for whoever wants to draw them
//!
//! # Examples
//!
//! ```rust,no_run
//! use dirmirror_config::{EngineSettings, RunContext};
//! use dirmirror_sync::SyncEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = RunContext::from_process()?;
//! let engine = SyncEngine::new(&context, &EngineSettings::default());
//! let task = engine.task_from_paths("photos", "%BACKUP%/photos").await;
//! let report = engine.sync(task).await?;
//! println!(
//!     "Copied {} files, deleted {}",
//!     report.stats.files_copied, report.stats.files_deleted
//! );
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod canonical;
pub mod diff;
pub mod engine;
pub mod executor;
pub mod progress;
pub mod scanner;

pub use canonical::{canonical_file_path, PathCanonicalizer, DEFAULT_ENV_MARKER};
pub use diff::{DiffEngine, SyncPlan};
pub use engine::{RunSummary, SyncEngine, TaskFailure, TaskReport};
pub use executor::{ExecutionOutcome, Executor, PhaseOutcome};
pub use progress::{ItemProgress, ProgressEvent, ProgressReporter};
pub use scanner::TreeScanner;

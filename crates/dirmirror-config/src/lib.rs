//! Settings and task-list management for dirmirror
//!
//! This crate owns everything the engine is configured with:
//!
//! - **Settings**: layered engine/UI settings (defaults, optional settings file,
//!   `DIRMIRROR__*` environment overrides) with validation
//! - **Task list**: the JSON list of `{from, to}` pairs kept next to the working
//!   directory, including the template written when it is missing
//! - **Run context**: the working directory and environment snapshot the engine
//!   resolves paths against, passed explicitly instead of read from globals
//!
//! # Examples
//!
//! ```rust
//! use dirmirror_config::SettingsBuilder;
//!
//! let settings = SettingsBuilder::new()
//!     .add_defaults()
//!     .build()
//!     .expect("defaults are valid");
//!
//! assert_eq!(settings.tasks.file_name, "syncConfig.json");
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use dirmirror_types::Concurrency;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub mod builder;
pub mod error;
pub mod loader;
pub mod tasks;

pub use builder::SettingsBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::SettingsLoader;
pub use tasks::{TaskEntry, TaskList, TaskListLoader, TASK_LIST_TEMPLATE};

/// Default task-list file name, looked up in the working directory
pub const DEFAULT_TASK_FILE: &str = "syncConfig.json";

/// Main settings structure for dirmirror
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Engine tuning
    #[serde(default)]
    pub engine: EngineSettings,
    /// Task-list location
    #[serde(default)]
    pub tasks: TaskFileSettings,
    /// Console behaviour
    #[serde(default)]
    pub ui: UiSettings,
}

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum number of filesystem operations in flight within one phase
    #[serde(default)]
    pub max_concurrency: Concurrency,
    /// Character delimiting environment-variable references in paths
    #[serde(default = "default_env_marker")]
    pub env_marker: String,
}

impl EngineSettings {
    /// The marker as a character; validation guarantees exactly one
    pub fn env_marker_char(&self) -> char {
        self.env_marker.chars().next().unwrap_or('%')
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: Concurrency::default(),
            env_marker: default_env_marker(),
        }
    }
}

fn default_env_marker() -> String {
    "%".to_string()
}

/// Task-list location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileSettings {
    /// File name, resolved against the working directory
    pub file_name: String,
}

impl Default for TaskFileSettings {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_TASK_FILE.to_string(),
        }
    }
}

/// Console behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    /// Wait for enter before the process exits
    pub wait_for_enter: bool,
    /// Draw progress bars
    pub progress: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            wait_for_enter: true,
            progress: true,
        }
    }
}

/// Working directory and environment a run resolves paths against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Directory relative paths and the task list are resolved against
    pub working_dir: PathBuf,
    /// Environment variables available for path expansion
    pub env: HashMap<String, String>,
}

impl RunContext {
    /// Create a context with an empty environment
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            env: HashMap::new(),
        }
    }

    /// Snapshot the current process directory and environment
    pub fn from_process() -> ConfigResult<Self> {
        let working_dir = std::env::current_dir().map_err(|e| ConfigError::Io {
            path: PathBuf::from("."),
            source: e,
        })?;

        Ok(Self {
            working_dir,
            env: std::env::vars().collect(),
        })
    }

    /// Add or replace one environment variable
    pub fn with_var<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Look up an environment variable
    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Location of the task list for the given settings
    pub fn task_file(&self, settings: &Settings) -> PathBuf {
        self.working_dir.join(&settings.tasks.file_name)
    }
}

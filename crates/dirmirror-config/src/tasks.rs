//! JSON task list: `[{"from": "...", "to": "..."}, ...]`

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Written when the task list does not exist yet
pub const TASK_LIST_TEMPLATE: &str = r#"[{"from":"fromPath","to":"toPath"}]"#;

/// One raw `{from, to}` entry, paths not yet canonicalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Source directory
    #[serde(alias = "source")]
    pub from: String,
    /// Destination directory
    #[serde(alias = "destination")]
    pub to: String,
}

impl TaskEntry {
    /// Create an entry
    pub fn new<S: Into<String>, D: Into<String>>(from: S, to: D) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Task entries loaded from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    /// File the entries came from
    pub path: PathBuf,
    /// Parsed entries
    pub entries: Vec<TaskEntry>,
    /// Whether the file was missing and a template was written instead
    pub template_created: bool,
}

impl TaskList {
    /// Fail with [`ConfigError::EmptyTaskList`] when there is nothing to run
    pub fn validate(&self) -> ConfigResult<()> {
        if self.entries.is_empty() {
            return Err(ConfigError::EmptyTaskList {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads, validates and bootstraps the task list file
pub struct TaskListLoader;

impl TaskListLoader {
    /// Load the task list, writing the template first if the file is missing.
    ///
    /// A freshly written template yields an empty list: the placeholder paths
    /// in it are meant to be edited, not synchronized.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> ConfigResult<TaskList> {
        let path = path.as_ref();

        if !path.exists() {
            Self::write_template(path)?;
            warn!(
                "Task list {} did not exist, wrote a template to fill in",
                path.display()
            );
            return Ok(TaskList {
                path: path.to_path_buf(),
                entries: Vec::new(),
                template_created: true,
            });
        }

        Self::load(path)
    }

    /// Load and parse an existing task list
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<TaskList> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let entries = Self::parse(path, &content)?;
        info!("Loaded {} task(s) from {}", entries.len(), path.display());

        Ok(TaskList {
            path: path.to_path_buf(),
            entries,
            template_created: false,
        })
    }

    /// Parse task list content; `path` is only used for error messages
    pub fn parse(path: &Path, content: &str) -> ConfigResult<Vec<TaskEntry>> {
        let malformed = |message: String| ConfigError::MalformedTaskList {
            path: path.to_path_buf(),
            message,
        };

        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;

        if !value.is_array() {
            return Err(malformed(
                "expected a JSON array of {\"from\", \"to\"} objects".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
    }

    /// Write [`TASK_LIST_TEMPLATE`] to `path`
    pub fn write_template<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        std::fs::write(path, TASK_LIST_TEMPLATE).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_parse_entries() {
        let entries = TaskListLoader::parse(
            Path::new("syncConfig.json"),
            r#"[{"from":"/a","to":"/b"},{"source":"/c","destination":"/d","result":"ignored"}]"#,
        )
        .unwrap();

        assert_eq!(
            entries,
            vec![TaskEntry::new("/a", "/b"), TaskEntry::new("/c", "/d")]
        );
    }

    #[rstest]
    #[case(r#"{"from":"/a","to":"/b"}"#)]
    #[case(r#""just a string""#)]
    #[case(r#"[{"from":"/a"}]"#)]
    #[case(r#"[1, 2, 3]"#)]
    #[case("not json at all")]
    fn test_parse_malformed(#[case] content: &str) {
        let result = TaskListLoader::parse(Path::new("syncConfig.json"), content);
        assert!(matches!(
            result,
            Err(ConfigError::MalformedTaskList { .. })
        ));
    }

    #[test]
    fn test_empty_list_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("syncConfig.json");
        std::fs::write(&path, "[]").unwrap();

        let list = TaskListLoader::load(&path).unwrap();
        assert!(list.is_empty());
        assert!(matches!(
            list.validate(),
            Err(ConfigError::EmptyTaskList { .. })
        ));
    }

    #[test]
    fn test_missing_file_writes_template() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("syncConfig.json");

        let list = TaskListLoader::load_or_create(&path).unwrap();
        assert!(list.template_created);
        assert!(list.is_empty());
        assert!(list.validate().is_err());

        // The template itself is a well-formed task list
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, TASK_LIST_TEMPLATE);
        let reparsed = TaskListLoader::load(&path).unwrap();
        assert_eq!(reparsed.entries, vec![TaskEntry::new("fromPath", "toPath")]);
    }
}

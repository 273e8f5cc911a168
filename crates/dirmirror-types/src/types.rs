//! Core data types for dirmirror
//!
//! Paths are carried as canonical strings rather than `PathBuf`s: file identity
//! across the two trees is decided by literal prefix stripping, which only works
//! when every path uses the same separator and directory roots end with it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{btree_set, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Unique identifier for sync tasks
pub type TaskId = uuid::Uuid;

/// The one separator used by canonical paths
pub const SEPARATOR: char = '/';

/// A path string in canonical form.
///
/// Invariants upheld by whoever constructs it (normally the path canonicalizer):
/// every separator is [`SEPARATOR`], and a path naming an existing directory ends
/// with [`SEPARATOR`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Wrap a string that is already in canonical form
    pub fn from_canonical<S: Into<String>>(path: S) -> Self {
        Self(path.into())
    }

    /// Borrow the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// View as a filesystem path
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether the path carries the trailing separator of a directory root
    pub fn is_directory_form(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    /// Append the trailing separator if it is missing
    pub fn with_trailing_separator(mut self) -> Self {
        if !self.is_directory_form() {
            self.0.push(SEPARATOR);
        }
        self
    }

    /// The path with the literal prefix `root` removed.
    ///
    /// Returns `None` when `root` is not a literal prefix of this path.
    pub fn relative_to(&self, root: &CanonicalPath) -> Option<&str> {
        self.0.strip_prefix(root.as_str())
    }

    /// Concatenate a relative path onto this root
    pub fn join_relative(&self, relative: &str) -> Self {
        let mut joined = String::with_capacity(self.0.len() + relative.len());
        joined.push_str(&self.0);
        joined.push_str(relative);
        Self(joined)
    }

    /// Everything before the last separator, or `None` if there is none
    pub fn parent_dir(&self) -> Option<Self> {
        self.0
            .rfind(SEPARATOR)
            .map(|index| Self(self.0[..index].to_string()))
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for CanonicalPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One source/destination pairing to reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncTask {
    /// Task identifier, used in logs and reports
    pub id: TaskId,
    /// Directory whose contents are mirrored
    pub source: CanonicalPath,
    /// Directory that is made to match `source`
    pub destination: CanonicalPath,
    /// Where the task came from ("command line", "task file #2", ...)
    pub origin: String,
}

impl SyncTask {
    /// Create a new task from canonical paths
    pub fn new(source: CanonicalPath, destination: CanonicalPath) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            source,
            destination,
            origin: String::from("api"),
        }
    }

    /// Set the origin label
    pub fn with_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.origin = origin.into();
        self
    }

    /// Replace the destination, used after the destination has been created
    pub fn set_destination(&mut self, destination: CanonicalPath) {
        self.destination = destination;
    }

    /// Both roots carry the trailing separator, so prefix stripping is unambiguous
    pub fn has_directory_roots(&self) -> bool {
        self.source.is_directory_form() && self.destination.is_directory_form()
    }
}

/// Why an operation was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OperationReason {
    /// The relative path has no counterpart in the destination
    MissingInDestination,
    /// Both trees have the relative path but the byte lengths differ
    SizeMismatch,
    /// The relative path has no counterpart in the source
    MissingInSource,
}

impl OperationReason {
    /// Stable short name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingInDestination => "missing-in-destination",
            Self::SizeMismatch => "size-mismatch",
            Self::MissingInSource => "missing-in-source",
        }
    }

    /// Whether the reason routes to the copy phase
    pub fn is_copy(self) -> bool {
        matches!(self, Self::MissingInDestination | Self::SizeMismatch)
    }
}

impl fmt::Display for OperationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single planned file action
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Operation {
    /// File to read from; `None` for deletions
    pub source: Option<CanonicalPath>,
    /// File to write or remove
    pub target: CanonicalPath,
    /// Why the operation exists
    pub reason: OperationReason,
}

impl Operation {
    /// Plan a copy of `source` onto `target`
    pub fn copy(source: CanonicalPath, target: CanonicalPath, reason: OperationReason) -> Self {
        debug_assert!(reason.is_copy());
        Self {
            source: Some(source),
            target,
            reason,
        }
    }

    /// Plan the removal of `target`
    pub fn delete(target: CanonicalPath) -> Self {
        Self {
            source: None,
            target,
            reason: OperationReason::MissingInSource,
        }
    }

    /// Whether this is a copy operation
    pub fn is_copy(&self) -> bool {
        self.reason.is_copy()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} -> {} ({})", source, self.target, self.reason),
            None => write!(f, "remove {} ({})", self.target, self.reason),
        }
    }
}

/// Operations keyed by their full value, so duplicates collapse.
///
/// Backed by an ordered set so iteration (and therefore logging) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSet {
    operations: BTreeSet<Operation>,
}

impl OperationSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an operation; returns `false` if an equal one was already present
    pub fn insert(&mut self, operation: Operation) -> bool {
        self.operations.insert(operation)
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Iterate over the operations
    pub fn iter(&self) -> btree_set::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Target paths of every operation
    pub fn targets(&self) -> impl Iterator<Item = &CanonicalPath> {
        self.operations.iter().map(|op| &op.target)
    }
}

impl FromIterator<Operation> for OperationSet {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for OperationSet {
    type Item = Operation;
    type IntoIter = btree_set::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a OperationSet {
    type Item = &'a Operation;
    type IntoIter = btree_set::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Canonical file paths found under a root; directories are never included
pub type FileSet = HashSet<CanonicalPath>;

/// Directories that must exist before copies run
pub type DirectorySet = BTreeSet<CanonicalPath>;

/// Execution phase of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    /// Create missing destination directories
    Allocate,
    /// Copy files into the destination
    Copy,
    /// Remove files missing from the source
    Delete,
    /// Remove directories left without files
    Prune,
}

impl Phase {
    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::Allocate => "Allocate directories",
            Self::Copy => "Copy files",
            Self::Delete => "Remove files",
            Self::Prune => "Remove empty dirs",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A per-item failure that was contained instead of aborting the run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ItemFailure {
    /// Phase the item belonged to
    pub phase: Phase,
    /// Path of the failing item
    pub path: CanonicalPath,
    /// Underlying error message
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.phase, self.path, self.message)
    }
}

/// Counters describing one task run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncStats {
    /// Files found under the source root
    pub source_files: u64,
    /// Files found under the destination root before execution
    pub destination_files: u64,
    /// Directories created during allocation
    pub directories_created: u64,
    /// Files copied
    pub files_copied: u64,
    /// Bytes copied
    pub bytes_copied: u64,
    /// Files removed
    pub files_deleted: u64,
    /// Directories removed by pruning
    pub directories_pruned: u64,
    /// Items that failed in any phase
    pub failures: u64,
    /// Wall-clock duration
    pub duration: Duration,
}

impl SyncStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of filesystem mutations performed
    pub fn total_changes(&self) -> u64 {
        self.directories_created + self.files_copied + self.files_deleted + self.directories_pruned
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &SyncStats) {
        self.source_files += other.source_files;
        self.destination_files += other.destination_files;
        self.directories_created += other.directories_created;
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.files_deleted += other.files_deleted;
        self.directories_pruned += other.directories_pruned;
        self.failures += other.failures;
        self.duration += other.duration;
    }
}

//! File difference detection
//!
//! Files are matched across the two trees by relative path, the file path with
//! its root's literal prefix removed. Two matched files are equal when their
//! byte lengths are equal; contents are never read.

use dirmirror_types::{
    CanonicalPath, Concurrency, DirectorySet, FileSet, Operation, OperationReason, OperationSet,
    SyncTask,
};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tokio::fs;
use tracing::{debug, info, warn};

/// Everything a task has to do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Files to copy into the destination
    pub copies: OperationSet,
    /// Destination files to remove
    pub deletions: OperationSet,
    /// Directories to create before copying
    pub directories: DirectorySet,
}

impl SyncPlan {
    /// Nothing to copy and nothing to delete: the trees already match
    pub fn is_synchronized(&self) -> bool {
        self.copies.is_empty() && self.deletions.is_empty()
    }
}

/// Engine classifying files into copy and delete sets
#[derive(Debug, Clone)]
pub struct DiffEngine {
    concurrency: Concurrency,
}

impl DiffEngine {
    /// Create a new diff engine; `concurrency` bounds parallel `stat` calls
    pub fn new(concurrency: Concurrency) -> Self {
        Self { concurrency }
    }

    /// Compute copies, deletions and required directories.
    ///
    /// When nothing needs copying or deleting, the directory set is left empty
    /// without touching the filesystem.
    pub async fn plan(
        &self,
        task: &SyncTask,
        source_files: &FileSet,
        dest_files: &FileSet,
    ) -> SyncPlan {
        let copies = self.plan_copies(task, source_files, dest_files).await;
        let deletions = self.plan_deletions(task, source_files, dest_files);

        let directories = if copies.is_empty() {
            DirectorySet::new()
        } else {
            self.plan_directories(&copies).await
        };

        info!(
            "Planned {} copies, {} deletions, {} directories",
            copies.len(),
            deletions.len(),
            directories.len()
        );

        SyncPlan {
            copies,
            deletions,
            directories,
        }
    }

    /// Source files that are missing from the destination or differ in size
    pub async fn plan_copies(
        &self,
        task: &SyncTask,
        source_files: &FileSet,
        dest_files: &FileSet,
    ) -> OperationSet {
        let dest_relative = relative_paths(&task.destination, dest_files);
        let mut copies = OperationSet::new();
        let mut candidates = Vec::new();

        for file in source_files {
            let Some(relative) = file.relative_to(&task.source) else {
                warn!("'{}' is not below source root '{}'", file, task.source);
                continue;
            };
            let target = task.destination.join_relative(relative);

            if dest_relative.contains(relative) {
                candidates.push((file.clone(), target));
            } else {
                debug!("Copy planned, missing in destination: {}", target);
                copies.insert(Operation::copy(
                    file.clone(),
                    target,
                    OperationReason::MissingInDestination,
                ));
            }
        }

        let mismatched: Vec<Option<Operation>> = stream::iter(candidates)
            .map(|(file, target)| async move { compare_sizes(file, target).await })
            .buffer_unordered(self.concurrency.get())
            .collect()
            .await;

        for operation in mismatched.into_iter().flatten() {
            copies.insert(operation);
        }

        copies
    }

    /// Destination files whose relative path does not exist in the source
    pub fn plan_deletions(
        &self,
        task: &SyncTask,
        source_files: &FileSet,
        dest_files: &FileSet,
    ) -> OperationSet {
        let source_relative = relative_paths(&task.source, source_files);

        dest_files
            .iter()
            .filter(|file| match file.relative_to(&task.destination) {
                Some(relative) => !source_relative.contains(relative),
                None => {
                    warn!("'{}' is not below destination root '{}'", file, task.destination);
                    false
                }
            })
            .map(|file| {
                debug!("Delete planned, missing in source: {}", file);
                Operation::delete(file.clone())
            })
            .collect()
    }

    /// Parent directories of copy targets that do not exist yet
    pub async fn plan_directories(&self, copies: &OperationSet) -> DirectorySet {
        let parents: DirectorySet = copies.targets().filter_map(CanonicalPath::parent_dir).collect();

        let missing: Vec<Option<CanonicalPath>> = stream::iter(parents)
            .map(|dir| async move {
                match fs::try_exists(dir.as_path()).await {
                    Ok(true) => None,
                    _ => Some(dir),
                }
            })
            .buffer_unordered(self.concurrency.get())
            .collect()
            .await;

        missing.into_iter().flatten().collect()
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(Concurrency::default())
    }
}

fn relative_paths<'a>(root: &CanonicalPath, files: &'a FileSet) -> HashSet<&'a str> {
    files.iter().filter_map(|file| file.relative_to(root)).collect()
}

/// A size-mismatch copy, or `None` when both files have the same length
async fn compare_sizes(source: CanonicalPath, target: CanonicalPath) -> Option<Operation> {
    let (source_meta, target_meta) =
        tokio::join!(fs::metadata(source.as_path()), fs::metadata(target.as_path()));

    let source_len = match source_meta {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Cannot stat source '{}', skipping: {}", source, e);
            return None;
        }
    };

    match target_meta {
        Ok(meta) if meta.len() == source_len => None,
        Ok(meta) => {
            debug!(
                "Copy planned, size mismatch ({} != {}): {}",
                source_len,
                meta.len(),
                target
            );
            Some(Operation::copy(source, target, OperationReason::SizeMismatch))
        }
        Err(e) => {
            warn!("Cannot stat target '{}', copying over it: {}", target, e);
            Some(Operation::copy(source, target, OperationReason::SizeMismatch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::PathCanonicalizer;
    use crate::scanner::TreeScanner;
    use proptest::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn path(s: &str) -> CanonicalPath {
        CanonicalPath::from_canonical(s)
    }

    fn files(paths: &[&str]) -> FileSet {
        paths.iter().map(|p| path(p)).collect()
    }

    fn virtual_task() -> SyncTask {
        SyncTask::new(path("/virtual/src/"), path("/virtual/dst/"))
    }

    struct Fixture {
        _temp: TempDir,
        task: SyncTask,
    }

    async fn fixture(source: &[(&str, &str)], dest: &[(&str, &str)]) -> Fixture {
        let temp = TempDir::new().unwrap();
        for (root, entries) in [("src", source), ("dst", dest)] {
            std::fs::create_dir_all(temp.path().join(root)).unwrap();
            for (relative, content) in entries {
                let file = temp.path().join(root).join(relative);
                std::fs::create_dir_all(file.parent().unwrap()).unwrap();
                std::fs::write(file, content).unwrap();
            }
        }

        let canonicalizer = PathCanonicalizer::new();
        let src = canonicalizer
            .canonicalize(&temp.path().join("src").to_string_lossy())
            .await;
        let dst = canonicalizer
            .canonicalize(&temp.path().join("dst").to_string_lossy())
            .await;

        Fixture {
            _temp: temp,
            task: SyncTask::new(src, dst),
        }
    }

    async fn scan(fixture: &Fixture) -> (FileSet, FileSet) {
        let scanner = TreeScanner::new();
        (
            scanner.scan_files(&fixture.task.source).await.unwrap(),
            scanner.scan_files(&fixture.task.destination).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_missing_files_are_copied() {
        let fixture = fixture(&[("a.txt", "hello"), ("aa/aa.txt", "world")], &[]).await;
        let (source, dest) = scan(&fixture).await;

        let plan = DiffEngine::default().plan(&fixture.task, &source, &dest).await;

        assert_eq!(plan.copies.len(), 2);
        assert!(plan
            .copies
            .iter()
            .all(|op| op.reason == OperationReason::MissingInDestination));
        assert!(plan.deletions.is_empty());

        let expected_dir = fixture.task.destination.join_relative("aa");
        assert_eq!(plan.directories.len(), 1);
        assert!(plan.directories.contains(&expected_dir));
    }

    #[tokio::test]
    async fn test_size_mismatch_only() {
        let fixture = fixture(
            &[("same.txt", "12345"), ("grown.txt", "123456789")],
            &[("same.txt", "abcde"), ("grown.txt", "123")],
        )
        .await;
        let (source, dest) = scan(&fixture).await;

        let plan = DiffEngine::default().plan(&fixture.task, &source, &dest).await;

        // Same length counts as synchronized even though contents differ
        assert_eq!(plan.copies.len(), 1);
        let op = plan.copies.iter().next().unwrap();
        assert_eq!(op.reason, OperationReason::SizeMismatch);
        assert!(op.target.as_str().ends_with("grown.txt"));
        assert!(plan.deletions.is_empty());
        assert!(plan.directories.is_empty());
    }

    #[tokio::test]
    async fn test_extra_destination_files_are_deleted() {
        let fixture = fixture(&[], &[("a.txt", "hello"), ("aa/aa.txt", "world")]).await;
        let (source, dest) = scan(&fixture).await;

        let plan = DiffEngine::default().plan(&fixture.task, &source, &dest).await;

        assert!(plan.copies.is_empty());
        assert_eq!(plan.deletions.len(), 2);
        assert!(plan.deletions.iter().all(|op| op.source.is_none()));
        assert!(plan.directories.is_empty());
    }

    #[tokio::test]
    async fn test_identical_trees_are_synchronized() {
        let fixture = fixture(
            &[("a.txt", "hello"), ("aa/aa.txt", "world")],
            &[("a.txt", "HELLO"), ("aa/aa.txt", "WORLD")],
        )
        .await;
        let (source, dest) = scan(&fixture).await;

        let plan = DiffEngine::default().plan(&fixture.task, &source, &dest).await;
        assert!(plan.is_synchronized());
        assert!(plan.directories.is_empty());
    }

    #[test]
    fn test_deletions_without_filesystem() {
        let task = virtual_task();
        let source = files(&["/virtual/src/keep.txt", "/virtual/src/sub/keep.txt"]);
        let dest = files(&[
            "/virtual/dst/keep.txt",
            "/virtual/dst/sub/keep.txt",
            "/virtual/dst/sub/stale.txt",
            "/virtual/dst/stale.txt",
        ]);

        let deletions = DiffEngine::default().plan_deletions(&task, &source, &dest);
        let mut targets: Vec<&str> = deletions.targets().map(CanonicalPath::as_str).collect();
        targets.sort_unstable();
        assert_eq!(
            targets,
            vec!["/virtual/dst/stale.txt", "/virtual/dst/sub/stale.txt"]
        );
    }

    #[tokio::test]
    async fn test_directories_come_from_copy_targets_only() {
        let temp = TempDir::new().unwrap();
        let root = PathCanonicalizer::new()
            .canonicalize(&temp.path().to_string_lossy())
            .await;
        std::fs::create_dir(temp.path().join("exists")).unwrap();

        let copies: OperationSet = ["exists/a.txt", "new/b.txt", "new/deeper/c.txt"]
            .iter()
            .map(|relative| {
                Operation::copy(
                    path("/virtual/src/x"),
                    root.join_relative(relative),
                    OperationReason::MissingInDestination,
                )
            })
            .collect();

        let dirs = DiffEngine::default().plan_directories(&copies).await;
        let mut relative: Vec<&str> = dirs.iter().map(|d| d.relative_to(&root).unwrap()).collect();
        relative.sort_unstable();
        assert_eq!(relative, vec!["new", "new/deeper"]);
        assert!(!Path::new(&root.join_relative("new").into_string()).exists());
    }

    proptest! {
        #[test]
        fn test_deletions_never_target_source_relatives(
            source in proptest::collection::hash_set("[a-c]{1,2}(/[a-c]{1,2})?", 0..12),
            dest in proptest::collection::hash_set("[a-c]{1,2}(/[a-c]{1,2})?", 0..12),
        ) {
            let task = virtual_task();
            let source_files: FileSet = source
                .iter()
                .map(|rel| task.source.join_relative(rel))
                .collect();
            let dest_files: FileSet = dest
                .iter()
                .map(|rel| task.destination.join_relative(rel))
                .collect();

            let deletions = DiffEngine::default().plan_deletions(&task, &source_files, &dest_files);

            for op in &deletions {
                let relative = op.target.relative_to(&task.destination).unwrap();
                prop_assert!(!source.contains(relative));
                prop_assert!(dest.contains(relative));
            }
            prop_assert_eq!(deletions.len(), dest.difference(&source).count());
        }
    }
}

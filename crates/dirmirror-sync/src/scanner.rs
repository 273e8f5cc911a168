//! Recursive file enumeration

use crate::canonical::canonical_file_path;
use dirmirror_types::{CanonicalPath, Error, FileSet, Result};
use tracing::info;
use walkdir::WalkDir;

/// Enumerates every file below a directory root
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeScanner;

impl TreeScanner {
    /// Create a new scanner
    pub fn new() -> Self {
        Self
    }

    /// Collect the canonical paths of all files under `root`.
    ///
    /// `root` must be an existing directory in canonical directory form; every
    /// returned path then starts with `root` literally. Directories are walked
    /// but not returned. Symbolic links are not followed and, not being regular
    /// files, are not returned either.
    pub async fn scan_files(&self, root: &CanonicalPath) -> Result<FileSet> {
        let walk_root = root.clone();
        let files = tokio::task::spawn_blocking(move || Self::walk(&walk_root))
            .await
            .map_err(|e| Error::other(format!("Scan of '{}' was aborted: {}", root, e)))??;

        info!("Scanned {} files in '{}'", files.len(), root);
        Ok(files)
    }

    fn walk(root: &CanonicalPath) -> Result<FileSet> {
        let mut files = FileSet::new();

        for entry in WalkDir::new(root.as_path()) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map_or_else(|| root.as_path().to_path_buf(), |p| p.to_path_buf());
                Error::PathIo {
                    path,
                    message: e.to_string(),
                }
            })?;

            if entry.file_type().is_file() {
                files.insert(canonical_file_path(entry.path()));
            }
        }

        Ok(files)
    }
}

//! Temporary directory trees for mirroring tests

use dirmirror_config::{EngineSettings, RunContext};
use dirmirror_sync::{SyncEngine, TaskReport};
use dirmirror_types::{CanonicalPath, FileSet, Result, SyncTask};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Relative path to byte length, the identity used when comparing trees
pub type TreeListing = BTreeMap<String, u64>;

/// A working directory holding `src/` and `dst/` trees
pub struct MirrorFixture {
    temp_dir: TempDir,
}

impl MirrorFixture {
    /// Source tree name below the working directory
    pub const SOURCE: &'static str = "src";
    /// Destination tree name below the working directory
    pub const DESTINATION: &'static str = "dst";

    /// Create an empty working directory with an empty source tree.
    ///
    /// The destination is not created; the engine creates it on first sync.
    pub fn new() -> io::Result<Self> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join(Self::SOURCE))?;
        Ok(Self { temp_dir })
    }

    /// The working directory
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path below the source tree
    pub fn source_path(&self, relative: &str) -> PathBuf {
        self.root().join(Self::SOURCE).join(relative)
    }

    /// Absolute path below the destination tree
    pub fn destination_path(&self, relative: &str) -> PathBuf {
        self.root().join(Self::DESTINATION).join(relative)
    }

    /// Write a source file, creating parents
    pub fn write_source(&self, relative: &str, content: &str) -> io::Result<()> {
        write_file(&self.source_path(relative), content)
    }

    /// Write a destination file, creating parents
    pub fn write_destination(&self, relative: &str, content: &str) -> io::Result<()> {
        write_file(&self.destination_path(relative), content)
    }

    /// Read a destination file
    pub fn read_destination(&self, relative: &str) -> io::Result<String> {
        fs::read_to_string(self.destination_path(relative))
    }

    /// Run context anchored on the working directory
    pub fn context(&self) -> RunContext {
        RunContext::new(self.root())
    }

    /// Engine with default settings for this working directory
    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(&self.context(), &EngineSettings::default())
    }

    /// Task mirroring `src/` onto `dst/`
    pub async fn task(&self) -> SyncTask {
        self.engine()
            .task_from_paths(Self::SOURCE, Self::DESTINATION)
            .await
    }

    /// Mirror `src/` onto `dst/` once
    pub async fn sync(&self) -> Result<TaskReport> {
        let engine = self.engine();
        let task = engine
            .task_from_paths(Self::SOURCE, Self::DESTINATION)
            .await;
        engine.sync(task).await
    }

    /// Files under the source tree
    pub fn source_listing(&self) -> io::Result<TreeListing> {
        listing(&self.root().join(Self::SOURCE))
    }

    /// Files under the destination tree
    pub fn destination_listing(&self) -> io::Result<TreeListing> {
        listing(&self.root().join(Self::DESTINATION))
    }
}

/// Write `content` to `path`, creating parents
pub fn write_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Every file below `root` keyed by `/`-separated relative path.
///
/// A root that does not exist, such as a destination pruned away, lists as empty.
pub fn listing(root: &Path) -> io::Result<TreeListing> {
    let mut files = TreeListing::new();
    if root.exists() {
        collect(root, root, &mut files)?;
    }
    Ok(files)
}

fn collect(root: &Path, dir: &Path, files: &mut TreeListing) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect(root, &path, files)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .map_err(io::Error::other)?
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(relative, entry.metadata()?.len());
        }
    }
    Ok(())
}

/// Relative paths of a file set under `root`, sorted
pub fn relative_paths(root: &CanonicalPath, files: &FileSet) -> Vec<String> {
    let mut relative: Vec<String> = files
        .iter()
        .filter_map(|file| file.relative_to(root).map(str::to_string))
        .collect();
    relative.sort_unstable();
    relative
}

/// Every directory below `root`, `root` excluded; empty if `root` does not exist
pub fn directories(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    if !root.exists() {
        return Ok(dirs);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
                pending.push(entry.path());
            }
        }
    }
    dirs.sort();
    Ok(dirs)
}

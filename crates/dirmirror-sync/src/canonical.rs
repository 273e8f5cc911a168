//! Path canonicalization
//!
//! Canonical paths use `/` as their only separator, have environment variable
//! references expanded, carry no `.` segments, and end with `/` when they name an
//! existing directory. `..` segments are kept literally: nothing here resolves
//! them against the filesystem.

use dirmirror_config::RunContext;
use dirmirror_types::{CanonicalPath, SEPARATOR};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Separator variants rewritten to [`SEPARATOR`]
const FOREIGN_SEPARATOR: char = '\\';

/// Default marker around environment variable names, as in `%HOME%/backup`
pub const DEFAULT_ENV_MARKER: char = '%';

/// Normalizes user-supplied path strings into [`CanonicalPath`]s
#[derive(Debug, Clone)]
pub struct PathCanonicalizer {
    env: HashMap<String, String>,
    marker: char,
    base_dir: Option<String>,
}

impl PathCanonicalizer {
    /// A canonicalizer with no environment and no base directory
    pub fn new() -> Self {
        Self {
            env: HashMap::new(),
            marker: DEFAULT_ENV_MARKER,
            base_dir: None,
        }
    }

    /// A canonicalizer resolving against the given run context
    pub fn from_context(context: &RunContext, marker: char) -> Self {
        Self::new()
            .with_env(context.env.clone())
            .with_marker(marker)
            .with_base_dir(&context.working_dir)
    }

    /// Set the variables available for expansion
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Set the character delimiting variable names
    pub fn with_marker(mut self, marker: char) -> Self {
        self.marker = marker;
        self
    }

    /// Anchor relative paths onto `base_dir`
    pub fn with_base_dir<P: AsRef<Path>>(mut self, base_dir: P) -> Self {
        let base = normalize_separators(&base_dir.as_ref().to_string_lossy());
        self.base_dir = Some(base.trim_end_matches(SEPARATOR).to_string());
        self
    }

    /// Canonicalize `path`.
    ///
    /// The only filesystem access is the final directory check that decides
    /// whether a trailing separator is appended.
    pub async fn canonicalize(&self, path: &str) -> CanonicalPath {
        let mut normalized = self.normalize(path);

        if !normalized.ends_with(SEPARATOR) {
            if let Ok(metadata) = fs::metadata(&normalized).await {
                if metadata.is_dir() {
                    normalized.push(SEPARATOR);
                }
            }
        }

        CanonicalPath::from_canonical(normalized)
    }

    /// The filesystem-independent part of [`canonicalize`](Self::canonicalize)
    pub fn normalize(&self, path: &str) -> String {
        let unified = normalize_separators(path);
        // Variable values may bring their own platform separators
        let expanded = normalize_separators(&self.expand_env(&unified));
        let anchored = self.anchor(expanded);
        collapse_current_dir(&anchored)
    }

    fn expand_env(&self, path: &str) -> String {
        path.split(SEPARATOR)
            .map(|segment| self.expand_segment(segment))
            .collect::<Vec<_>>()
            .join(&SEPARATOR.to_string())
    }

    /// Replace every `<marker>NAME<marker>` in one segment.
    ///
    /// Unset variables expand to nothing, an empty name (`%%`) yields a literal
    /// marker, and an unterminated marker is left as written.
    fn expand_segment<'a>(&self, segment: &'a str) -> Cow<'a, str> {
        if !segment.contains(self.marker) {
            return Cow::Borrowed(segment);
        }

        let marker_len = self.marker.len_utf8();
        let mut expanded = String::with_capacity(segment.len());
        let mut rest = segment;

        while let Some(start) = rest.find(self.marker) {
            let after = &rest[start + marker_len..];
            let Some(end) = after.find(self.marker) else {
                break;
            };

            expanded.push_str(&rest[..start]);
            let name = &after[..end];
            if name.is_empty() {
                expanded.push(self.marker);
            } else if let Some(value) = self.env.get(name) {
                expanded.push_str(value);
            } else {
                debug!("Environment variable '{}' is not set, expanding to nothing", name);
            }
            rest = &after[end + marker_len..];
        }

        expanded.push_str(rest);
        Cow::Owned(expanded)
    }

    fn anchor(&self, path: String) -> String {
        match &self.base_dir {
            Some(base) if !path.is_empty() && !is_absolute(&path) => {
                format!("{}{}{}", base, SEPARATOR, path)
            }
            _ => path,
        }
    }
}

impl Default for PathCanonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite every platform separator to [`SEPARATOR`]
pub fn normalize_separators(path: &str) -> String {
    path.replace(FOREIGN_SEPARATOR, &SEPARATOR.to_string())
}

/// Canonical form of a path discovered on disk.
///
/// Names read from the filesystem are taken literally, so only separators are
/// normalized; a file called `%HOME%` stays `%HOME%`.
pub fn canonical_file_path(path: &Path) -> CanonicalPath {
    CanonicalPath::from_canonical(normalize_separators(&path.to_string_lossy()))
}

fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR) || PathBuf::from(path).is_absolute()
}

/// Drop `.` segments while keeping `..` and every other segment untouched
fn collapse_current_dir(path: &str) -> String {
    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    let kept: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|segment| *segment != ".")
        .collect();

    if kept.len() == segments.len() {
        return path.to_string();
    }

    let collapsed = kept.join(&SEPARATOR.to_string());
    if collapsed.is_empty() {
        // The path consisted of nothing but `.` segments
        return if path.starts_with(SEPARATOR) {
            SEPARATOR.to_string()
        } else {
            ".".to_string()
        };
    }

    // `./` at the end named a directory; keep the trailing separator
    if path.ends_with("/.") && !collapsed.ends_with(SEPARATOR) {
        return format!("{}{}", collapsed, SEPARATOR);
    }

    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[rstest]
    #[case(r"C:\data\photos", "C:/data/photos")]
    #[case("/data/./photos/./2024", "/data/photos/2024")]
    #[case("./a/b", "a/b")]
    #[case("/data/../photos", "/data/../photos")]
    #[case("../up/./here", "../up/here")]
    #[case("a/./../b", "a/../b")]
    #[case("a/.hidden/..x", "a/.hidden/..x")]
    #[case("a/.", "a/")]
    #[case(".", ".")]
    #[case("", "")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(PathCanonicalizer::new().normalize(input), expected);
    }

    #[rstest]
    #[case("%DATA%/photos", "/mnt/data/photos")]
    #[case("/root/%USER%-backup", "/root/alice-backup")]
    #[case("/root/%UNSET%/x", "/root//x")]
    #[case("/root/100%%/x", "/root/100%/x")]
    #[case("/root/50%/x", "/root/50%/x")]
    #[case(r"%WIN%\sub", "C:/Users/alice/sub")]
    fn test_env_expansion(#[case] input: &str, #[case] expected: &str) {
        let canonicalizer = PathCanonicalizer::new().with_env(env(&[
            ("DATA", "/mnt/data"),
            ("USER", "alice"),
            ("WIN", r"C:\Users\alice"),
        ]));
        assert_eq!(canonicalizer.normalize(input), expected);
    }

    #[test]
    fn test_custom_marker() {
        let canonicalizer = PathCanonicalizer::new()
            .with_env(env(&[("HOME", "/home/bob")]))
            .with_marker('$');
        assert_eq!(canonicalizer.normalize("$HOME$/docs"), "/home/bob/docs");
        assert_eq!(canonicalizer.normalize("%HOME%/docs"), "%HOME%/docs");
    }

    #[test]
    fn test_relative_paths_are_anchored() {
        let canonicalizer = PathCanonicalizer::new().with_base_dir("/work/");
        assert_eq!(canonicalizer.normalize("a/b"), "/work/a/b");
        assert_eq!(canonicalizer.normalize("./a"), "/work/a");
        assert_eq!(canonicalizer.normalize("/abs/a"), "/abs/a");
    }

    #[test]
    fn test_from_context() {
        let context = RunContext::new("/work").with_var("SRC", "projects");
        let canonicalizer = PathCanonicalizer::from_context(&context, '%');
        assert_eq!(canonicalizer.normalize("%SRC%/rust"), "/work/projects/rust");
    }

    #[tokio::test]
    async fn test_existing_directory_gets_trailing_separator() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("sub");
        std::fs::create_dir(&dir).unwrap();
        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let canonicalizer = PathCanonicalizer::new();

        let dir_path = canonicalizer.canonicalize(&dir.to_string_lossy()).await;
        assert!(dir_path.is_directory_form());
        assert!(!dir_path.as_str().contains('\\'));

        let file_path = canonicalizer.canonicalize(&file.to_string_lossy()).await;
        assert!(!file_path.is_directory_form());

        let missing = temp_dir.path().join("not-yet");
        let missing_path = canonicalizer.canonicalize(&missing.to_string_lossy()).await;
        assert!(!missing_path.is_directory_form());
    }

    #[tokio::test]
    async fn test_canonicalize_is_stable_for_directories() {
        let temp_dir = TempDir::new().unwrap();
        let canonicalizer = PathCanonicalizer::new();

        let once = canonicalizer
            .canonicalize(&temp_dir.path().to_string_lossy())
            .await;
        let twice = canonicalizer.canonicalize(once.as_str()).await;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_discovered_paths_are_not_expanded() {
        let canonicalizer_free = canonical_file_path(Path::new("/dst/%HOME%/a.txt"));
        assert_eq!(canonicalizer_free.as_str(), "/dst/%HOME%/a.txt");
    }

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(path in r"[a-z./\\]{0,32}") {
            let canonicalizer = PathCanonicalizer::new();
            let once = canonicalizer.normalize(&path);
            prop_assert_eq!(canonicalizer.normalize(&once), once.clone());
            prop_assert!(!once.contains('\\'));
        }

        #[test]
        fn test_parent_segments_survive(path in r"(\.\./|[a-z]{1,4}/|\./){0,8}") {
            let canonicalizer = PathCanonicalizer::new();
            let before = path.split('/').filter(|s| *s == "..").count();
            let normalized = canonicalizer.normalize(&path);
            let after = normalized.split('/').filter(|s| *s == "..").count();
            prop_assert_eq!(before, after);
        }
    }
}

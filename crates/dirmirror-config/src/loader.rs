//! Settings loader utilities

use crate::{ConfigError, ConfigResult, Settings, SettingsBuilder};
use std::path::{Path, PathBuf};

/// Environment prefix for settings overrides, e.g. `DIRMIRROR__ENGINE__MAX_CONCURRENCY`
pub const ENV_PREFIX: &str = "DIRMIRROR";

/// Settings file names probed in the working directory, in order of preference
const SETTINGS_FILE_NAMES: &[&str] = &[
    "dirmirror.toml",
    "dirmirror.yaml",
    "dirmirror.yml",
    ".dirmirror.toml",
];

/// Settings loader with common loading patterns
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from the first settings file found in `working_dir`
    pub fn load_default<P: AsRef<Path>>(working_dir: P) -> ConfigResult<Settings> {
        let mut builder = SettingsBuilder::new().add_defaults();

        if let Some(path) = Self::find_settings_file(working_dir) {
            builder = builder.add_source_file(path);
        }

        builder.add_env_prefix(ENV_PREFIX).build()
    }

    /// Load settings from a specific file, which must exist
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Settings> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Settings file not found",
                ),
            });
        }

        SettingsBuilder::new()
            .add_defaults()
            .add_source_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Save settings to a file, format chosen by extension
    pub fn save_to_file<P: AsRef<Path>>(settings: &Settings, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::to_string(settings)?,
            Some("json") => {
                serde_json::to_string_pretty(settings).map_err(|e| ConfigError::Serialization {
                    message: format!("Failed to serialize to JSON: {}", e),
                })?
            }
            _ => toml::to_string_pretty(settings)?,
        };

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write the default settings to `path`
    pub fn generate_default_settings<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
        Self::save_to_file(&Settings::default(), path)
    }

    /// First existing settings file in `working_dir`
    pub fn find_settings_file<P: AsRef<Path>>(working_dir: P) -> Option<PathBuf> {
        let working_dir = working_dir.as_ref();
        SETTINGS_FILE_NAMES
            .iter()
            .map(|name| working_dir.join(name))
            .find(|path| path.is_file())
    }
}

//! Settings builder for layered configuration loading

use crate::{ConfigError, ConfigResult, Settings};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Separator between nested keys in environment variable names
const ENV_SEPARATOR: &str = "__";

/// Settings builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct SettingsBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<SettingsSource>,
}

#[derive(Debug, Clone)]
enum SettingsSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl SettingsBuilder {
    /// Create a new settings builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
        }
    }

    /// Add default settings values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(SettingsSource::Defaults);
        self
    }

    /// Add a settings file source; missing files are skipped
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(SettingsSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(SettingsSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Build the settings
    pub fn build(mut self) -> ConfigResult<Settings> {
        // Defaults are always the base layer
        let defaults_value = serde_yaml::to_value(Settings::default())?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                SettingsSource::File { path, format } => {
                    if path.exists() {
                        debug!("Loading settings from {}", path.display());
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                SettingsSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .separator(ENV_SEPARATOR)
                            .try_parsing(true),
                    );
                }
                SettingsSource::Defaults => {}
            }
        }

        let config = self.inner.build()?;
        let result: Settings = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }

    /// Validate the settings
    fn validate(settings: &Settings) -> ConfigResult<()> {
        if settings.engine.env_marker.chars().count() != 1 {
            return Err(ConfigError::validation(
                "engine.env_marker must be exactly one character",
            ));
        }

        if settings.engine.env_marker == "/" || settings.engine.env_marker == "\\" {
            return Err(ConfigError::validation(
                "engine.env_marker must not be a path separator",
            ));
        }

        if settings.tasks.file_name.trim().is_empty() {
            return Err(ConfigError::validation("tasks.file_name must not be empty"));
        }

        Ok(())
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_defaults() {
        let settings = SettingsBuilder::new().add_defaults().build().unwrap();
        assert_eq!(settings.engine.env_marker, "%");
        assert!(settings.ui.progress);
    }

    #[test]
    fn test_builder_toml_file() {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
max_concurrency = 3

[ui]
wait_for_enter = false
progress = false
"#
        )
        .unwrap();

        let settings = SettingsBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(settings.engine.max_concurrency.get(), 3);
        assert!(!settings.ui.wait_for_enter);
        assert_eq!(settings.tasks.file_name, "syncConfig.json");
    }

    #[test]
    fn test_builder_yaml_file() {
        let mut temp_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
tasks:
  file_name: mirrors.json
"#
        )
        .unwrap();

        let settings = SettingsBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(settings.tasks.file_name, "mirrors.json");
    }

    #[test]
    fn test_builder_missing_file_is_skipped() {
        let settings = SettingsBuilder::new()
            .add_defaults()
            .add_source_file("/definitely/not/here/dirmirror.toml")
            .build()
            .unwrap();

        assert_eq!(settings.engine.env_marker, "%");
    }

    #[test]
    fn test_builder_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
env_marker = "%%"
"#
        )
        .unwrap();

        let result = SettingsBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("exactly one character"));
    }

    #[test]
    fn test_builder_env_layer_uses_double_underscore() {
        std::env::set_var("DMBUILDERTEST__ENGINE__MAX_CONCURRENCY", "5");

        let settings = SettingsBuilder::new()
            .add_defaults()
            .add_env_prefix("DMBUILDERTEST")
            .build()
            .unwrap();

        std::env::remove_var("DMBUILDERTEST__ENGINE__MAX_CONCURRENCY");
        assert_eq!(settings.engine.max_concurrency.get(), 5);
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(temp_file, "[engine]\nmax_concurrency = 0").unwrap();

        let result = SettingsBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result.is_err());
    }
}

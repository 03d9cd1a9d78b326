//! Runtime configuration.
//!
//! Provided once, when the factory is built. Every key has a default, so an
//! empty file (or no file at all) is a valid configuration:
//!
//! ```yaml
//! theme_directory: themes
//! public_directory: public/themes
//! active_theme: default
//! namespace_overrides:
//!   Blog: blog/templates
//! model: theme
//! cache_dir: var/cache
//! debug: true
//! on_corrupt_cache: rebuild   # or: fail
//! templates:
//!   bundles: [Blog]
//! ```
//!
//! When loaded with [`RuntimeConfig::from_file`], relative paths are resolved
//! against the directory containing the file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{Theme, ThemeModel};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config{}: {source}", .path.as_ref().map(|p| format!(" \"{}\"", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },
}

/// What to do with a record that fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptCachePolicy {
    /// Log a warning, discard the record and rebuild.
    #[default]
    Rebuild,
    /// Fail the lookup with a cache corruption error.
    Fail,
}

/// Template-related settings consumed by template collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    /// Bundles whose templates themes may override.
    pub bundles: Vec<String>,
}

/// Settings the theme factory is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Base path for theme lookups.
    pub theme_directory: PathBuf,
    /// Base path for publicly served theme assets.
    pub public_directory: PathBuf,
    /// Theme collaborators activate by default.
    pub active_theme: String,
    /// Namespace → path overrides for asset-path resolution.
    pub namespace_overrides: IndexMap<String, String>,
    /// Identifier of the entity type to instantiate.
    pub model: String,
    /// Base path for persisted cache records.
    pub cache_dir: PathBuf,
    /// Check every dependency on every lookup.
    pub debug: bool,
    pub on_corrupt_cache: CorruptCachePolicy,
    pub templates: TemplateConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            theme_directory: PathBuf::from("themes"),
            public_directory: PathBuf::from("public/themes"),
            active_theme: "default".to_string(),
            namespace_overrides: IndexMap::new(),
            model: Theme::MODEL.to_string(),
            cache_dir: std::env::temp_dir().join("lineage"),
            debug: false,
            on_corrupt_cache: CorruptCachePolicy::default(),
            templates: TemplateConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parses configuration from YAML. Relative paths are kept as written.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Loads configuration from a YAML file.
    ///
    /// Relative directories are resolved against the file's parent directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Rebases relative directories onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for dir in [
            &mut self.theme_directory,
            &mut self.public_directory,
            &mut self.cache_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Returns the override path for an asset namespace, if configured.
    pub fn namespace_override(&self, namespace: &str) -> Option<&str> {
        self.namespace_overrides.get(namespace).map(String::as_str)
    }
}

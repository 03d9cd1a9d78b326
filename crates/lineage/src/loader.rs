//! Declaration file loading.
//!
//! Each theme lives in its own folder under the configured theme directory and
//! is described by a single declaration file:
//!
//! ```text
//! themes/
//! ├── base/
//! │   └── theme.yml
//! └── child/
//!     └── theme.yaml
//! ```
//!
//! The loader is the only place that touches declaration files. It turns one
//! file into a [`Fragment`]: an ordered mapping of raw keys to raw YAML values.
//! Interpreting those values is the job of [`crate::schema`].
//!
//! # Extension Priority
//!
//! Extensions are listed in priority order. When a theme folder holds both
//! `theme.yml` and `theme.yaml`, the one appearing earlier in the list wins:
//!
//! | Priority | Extension |
//! |----------|-----------|
//! | 1 (highest) | `.yml` |
//! | 2 | `.yaml` |
//!
//! Candidates that were tried and found missing are reported alongside the
//! winning path so the cache can notice when a higher-priority file appears.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::Value;

/// File stem shared by every declaration file.
pub const DECLARATION_STEM: &str = "theme";

/// Recognized declaration extensions in priority order.
pub const DECLARATION_EXTENSIONS: &[&str] = &[".yml", ".yaml"];

/// Error type for declaration loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No declaration file exists for the theme folder.
    #[error("no theme declaration found in \"{}\" (tried {})", .dir.display(), .tried.join(", "))]
    NotFound {
        /// The theme folder that was searched.
        dir: PathBuf,
        /// File names that were tried.
        tried: Vec<String>,
    },

    /// IO error reading a file.
    #[error("failed to read \"{}\": {message}", .path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The file content is not a valid mapping.
    #[error("failed to parse \"{}\": {message}", .path.display())]
    Parse {
        /// Path of the malformed file.
        path: PathBuf,
        /// Error message from the parser.
        message: String,
    },
}

/// The raw, unmerged configuration contributed by one declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    source: PathBuf,
    values: IndexMap<String, Value>,
}

impl Fragment {
    /// Creates a fragment from already-parsed values.
    pub fn new(source: impl Into<PathBuf>, values: IndexMap<String, Value>) -> Self {
        Self {
            source: source.into(),
            values,
        }
    }

    /// Path of the file this fragment was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Raw key/value pairs in declaration order.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Returns the raw value for `key`, if declared.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the declared `parent`.
    ///
    /// Numbers and booleans are stringified the same way the schema does, so
    /// `parent: 2024` names the theme declared as `name: 2024`. `None` covers
    /// both an absent key and an explicit `parent: ~`. Lists and mappings are
    /// reported as `Err` with the offending value rendered for diagnostics.
    pub fn parent(&self) -> Result<Option<String>, String> {
        match self.values.get("parent") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => scalar_to_string(value)
                .map(Some)
                .ok_or_else(|| describe_value(value)),
        }
    }
}

/// A located declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// The file that will be loaded.
    pub path: PathBuf,
    /// Higher-priority candidates that did not exist when checked.
    pub shadowing: Vec<PathBuf>,
}

/// Returns the extension priority for a filename (lower = higher priority).
///
/// Returns `usize::MAX` when no extension in the list matches.
///
/// ```rust
/// use lineage::loader::extension_priority;
///
/// let extensions = &[".yml", ".yaml"];
/// assert_eq!(extension_priority("theme.yml", extensions), 0);
/// assert_eq!(extension_priority("theme.yaml", extensions), 1);
/// assert_eq!(extension_priority("theme.toml", extensions), usize::MAX);
/// ```
pub fn extension_priority(name: &str, extensions: &[&str]) -> usize {
    extensions
        .iter()
        .position(|ext| name.ends_with(ext))
        .unwrap_or(usize::MAX)
}

/// Finds the declaration file inside a theme folder.
///
/// Candidates are tried in extension priority order; the first existing file
/// wins. Every missing candidate tried before it is returned in
/// [`Declaration::shadowing`].
pub fn locate_declaration(theme_dir: &Path, extensions: &[&str]) -> Result<Declaration, LoadError> {
    let mut shadowing = Vec::new();
    for ext in extensions {
        let candidate = theme_dir.join(format!("{}{}", DECLARATION_STEM, ext));
        if candidate.is_file() {
            return Ok(Declaration {
                path: candidate,
                shadowing,
            });
        }
        shadowing.push(candidate);
    }

    Err(LoadError::NotFound {
        dir: theme_dir.to_path_buf(),
        tried: extensions
            .iter()
            .map(|ext| format!("{}{}", DECLARATION_STEM, ext))
            .collect(),
    })
}

/// Parses declaration files into fragments.
///
/// Implementations must be shareable across threads since a single factory
/// serves concurrent lookups.
pub trait ConfigLoader: Send + Sync {
    /// Declaration extensions this loader understands, in priority order.
    fn extensions(&self) -> &[&str];

    /// Reads and parses one declaration file.
    fn load(&self, path: &Path) -> Result<Fragment, LoadError>;
}

/// Configuration for a [`FileLoader`].
///
/// ```rust,ignore
/// // JSON declarations instead of YAML
/// FileLoaderConfig {
///     extensions: &[".json"],
///     parse: |content| serde_json::from_str(content).map_err(|e| e.to_string()),
/// }
/// ```
pub struct FileLoaderConfig {
    /// Valid file extensions in priority order (first = highest priority).
    pub extensions: &'static [&'static str],

    /// Parse function: file content → document value.
    ///
    /// Return `Err(message)` for syntax errors; the loader attaches the path.
    pub parse: fn(&str) -> Result<Value, String>,
}

/// Loader that reads declaration files from disk.
pub struct FileLoader {
    config: FileLoaderConfig,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::yaml()
    }
}

impl FileLoader {
    /// Creates a loader with the given configuration.
    pub fn new(config: FileLoaderConfig) -> Self {
        Self { config }
    }

    /// The standard YAML loader for `theme.yml` / `theme.yaml`.
    pub fn yaml() -> Self {
        Self::new(FileLoaderConfig {
            extensions: DECLARATION_EXTENSIONS,
            parse: |content| serde_yaml::from_str(content).map_err(|e| e.to_string()),
        })
    }
}

impl ConfigLoader for FileLoader {
    fn extensions(&self) -> &[&str] {
        self.config.extensions
    }

    fn load(&self, path: &Path) -> Result<Fragment, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let document = (self.config.parse)(&content).map_err(|message| LoadError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        let values = into_mapping(document).map_err(|message| LoadError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        Ok(Fragment::new(path, values))
    }
}

/// Converts a parsed document into an ordered string-keyed mapping.
///
/// An empty document is an empty mapping. Scalar keys are stringified.
fn into_mapping(document: Value) -> Result<IndexMap<String, Value>, String> {
    match document {
        Value::Null => Ok(IndexMap::new()),
        Value::Mapping(mapping) => {
            let mut values = IndexMap::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(format!(
                            "mapping keys must be scalars, found {}",
                            describe_value(&other)
                        ))
                    }
                };
                values.insert(key, value);
            }
            Ok(values)
        }
        other => Err(format!(
            "expected a mapping at the top level, found {}",
            describe_value(&other)
        )),
    }
}

/// Stringifies a scalar. Lists, mappings, tagged values and null are `None`.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Short human-readable name of a YAML value's shape.
pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean `{}`", b),
        Value::Number(n) => format!("number `{}`", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(tagged) => format!("tagged value `{}`", tagged.tag),
    }
}

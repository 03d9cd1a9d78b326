//! Error type for theme lookups.
//!
//! [`ThemeError`] is what [`ThemeFactory::get_theme`](crate::ThemeFactory::get_theme)
//! returns. Each stage of the pipeline has its own error type, wrapped here
//! without loss so callers can match on the stage that failed.

use crate::cache::CacheError;
use crate::chain::ChainLoadError;
use crate::schema::SchemaValidationError;

/// Errors that can occur while resolving a theme.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    /// A declaration in the chain could not be loaded, or the chain loops.
    #[error(transparent)]
    ChainLoad(#[from] ChainLoadError),

    /// The merged configuration does not satisfy the schema.
    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    /// The declared name differs from the folder the theme was requested by.
    #[error("theme name \"{declared}\" should match theme folder name \"{requested}\"")]
    NameMismatch { requested: String, declared: String },

    /// The configured model does not name a type with the theme capability set.
    #[error("theme model \"{model}\" does not provide the theme capability set (expected \"{expected}\")")]
    ModelContract {
        model: String,
        expected: &'static str,
    },

    /// A cache record that passed the freshness check could not be restored.
    #[error("cached theme \"{name}\" is corrupt: {message}")]
    CacheCorruption { name: String, message: String },

    /// Reading or writing the cache store failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for theme lookups.
pub type Result<T> = std::result::Result<T, ThemeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_mismatch_display() {
        let err = ThemeError::NameMismatch {
            requested: "foo".to_string(),
            declared: "bar".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"bar\""));
        assert!(msg.contains("\"foo\""));
    }

    #[test]
    fn test_chain_errors_are_transparent() {
        let err: ThemeError = ChainLoadError::CycleDetected {
            path: vec!["x".into(), "y".into(), "x".into()],
        }
        .into();
        assert_eq!(err.to_string(), "cycle detected in theme inheritance: x -> y -> x");
    }
}

//! Turning merged configuration into theme entities.

use std::path::{Path, PathBuf};

use crate::error::{Result, ThemeError};
use crate::model::ThemeModel;
use crate::schema::{MergedConfig, SchemaValidationError};

/// Typed view of a merged theme configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub name: String,
    pub description: Option<String>,
    pub stylesheets: Vec<String>,
    pub javascripts: Vec<String>,
    /// Parent identifier; replaced by a resolved entity during building.
    pub parent: Option<String>,
}

impl TryFrom<&MergedConfig> for ResolvedConfig {
    type Error = SchemaValidationError;

    fn try_from(merged: &MergedConfig) -> std::result::Result<Self, Self::Error> {
        let name = merged
            .scalar("name")
            .ok_or_else(|| SchemaValidationError::missing("name"))?;
        Ok(Self {
            name: name.to_string(),
            description: merged.scalar("description").map(str::to_string),
            stylesheets: merged.list("stylesheets").to_vec(),
            javascripts: merged.list("javascripts").to_vec(),
            parent: merged.scalar("parent").map(str::to_string),
        })
    }
}

/// Populates theme entities from merged configuration.
pub struct ThemeBuilder<'a> {
    directory: &'a Path,
    public_directory: &'a Path,
}

impl<'a> ThemeBuilder<'a> {
    pub fn new(directory: &'a Path, public_directory: &'a Path) -> Self {
        Self {
            directory,
            public_directory,
        }
    }

    /// Builds the entity for `requested`.
    ///
    /// `resolve_parent` is called with the parent's name when the merged
    /// configuration declares one; the factory passes its own lookup so each
    /// ancestor goes through the cache in its own right.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::NameMismatch`] if the merged name is not `requested`
    /// - whatever `resolve_parent` returns for the parent
    pub fn build<M, F>(&self, requested: &str, merged: &MergedConfig, resolve_parent: F) -> Result<M>
    where
        M: ThemeModel,
        F: FnOnce(&str) -> Result<M>,
    {
        let config = ResolvedConfig::try_from(merged)?;

        if config.name != requested {
            return Err(ThemeError::NameMismatch {
                requested: requested.to_string(),
                declared: config.name,
            });
        }

        let parent = config.parent.as_deref().map(resolve_parent).transpose()?;

        let mut theme = M::blank();
        theme.set_name(config.name);
        theme.set_description(config.description);
        theme.set_stylesheets(config.stylesheets);
        theme.set_javascripts(config.javascripts);
        theme.set_directory(PathBuf::from(self.directory));
        theme.set_public_directory(PathBuf::from(self.public_directory));
        if let Some(parent) = parent {
            theme.set_parent_theme(parent);
        }

        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Fragment;
    use crate::model::Theme;
    use crate::schema::{merge, Schema};
    use indexmap::IndexMap;
    use serde_yaml::Value;

    fn merged(yaml: &str) -> MergedConfig {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let mut values = IndexMap::new();
        if let Value::Mapping(mapping) = value {
            for (k, v) in mapping {
                values.insert(k.as_str().unwrap().to_string(), v);
            }
        }
        merge(&[Fragment::new("theme.yml", values)], &Schema::theme()).unwrap()
    }

    fn builder() -> ThemeBuilder<'static> {
        ThemeBuilder::new(Path::new("/srv/themes"), Path::new("/srv/public"))
    }

    #[test]
    fn test_build_without_parent() {
        let theme: Theme = builder()
            .build(
                "plain",
                &merged("name: plain\ndescription: Plain\nstylesheets: [a.css]"),
                |_| panic!("no parent expected"),
            )
            .unwrap();

        assert_eq!(theme.name(), "plain");
        assert_eq!(theme.description(), Some("Plain"));
        assert_eq!(theme.stylesheets(), &["a.css".to_string()]);
        assert!(theme.javascripts().is_empty());
        assert_eq!(theme.directory(), Path::new("/srv/themes"));
        assert_eq!(theme.public_directory(), Path::new("/srv/public"));
        assert!(theme.parent_theme().is_none());
    }

    #[test]
    fn test_build_attaches_resolved_parent() {
        let theme: Theme = builder()
            .build("child", &merged("name: child\nparent: base"), |name| {
                assert_eq!(name, "base");
                let mut parent = Theme::blank();
                parent.set_name(name.to_string());
                Ok(parent)
            })
            .unwrap();

        assert_eq!(theme.parent_theme().map(|p| p.name()), Some("base"));
    }

    #[test]
    fn test_name_mismatch() {
        let result: Result<Theme> = builder().build("foo", &merged("name: bar"), |_| {
            panic!("parent must not be resolved for a mismatched theme")
        });

        match result {
            Err(ThemeError::NameMismatch {
                requested,
                declared,
            }) => {
                assert_eq!(requested, "foo");
                assert_eq!(declared, "bar");
            }
            other => panic!("expected name mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parent_failure_propagates() {
        let result: Result<Theme> = builder().build("child", &merged("name: child\nparent: base"), |name| {
            Err(ThemeError::NameMismatch {
                requested: name.to_string(),
                declared: "other".to_string(),
            })
        });

        assert!(matches!(result, Err(ThemeError::NameMismatch { requested, .. }) if requested == "base"));
    }

    #[test]
    fn test_resolved_config_requires_name() {
        let empty = MergedConfig::default();
        let err = ResolvedConfig::try_from(&empty).unwrap_err();
        assert_eq!(err.keys(), vec!["name"]);
    }
}

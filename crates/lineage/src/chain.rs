//! Inheritance chain walking.
//!
//! [`ChainResolver::resolve`] starts at the requested theme, loads its
//! declaration, and follows `parent` references until a theme declares none.
//! The result lists fragments root-most first, ready for [`crate::schema::merge`],
//! together with every file that was consulted along the way.
//!
//! With a [`Freshness`] attached, each file is fingerprinted right before it is
//! read, so an edit landing after the read always shows up as a change.
//!
//! A visited set rejects cycles (`x → y → x`) instead of looping forever.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::cache::{DependencyStamp, Freshness};
use crate::loader::{locate_declaration, ConfigLoader, Fragment, LoadError};

/// Error raised while walking a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainLoadError {
    /// The theme identifier cannot be mapped to a folder.
    #[error("invalid theme name \"{name}\": {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A declaration in the chain is missing, unreadable or malformed.
    #[error("failed to load theme \"{theme}\": {source}")]
    Load {
        theme: String,
        #[source]
        source: LoadError,
    },

    /// A declaration names something other than a string as its parent.
    #[error("theme \"{theme}\" declares an invalid parent ({found}) in {}", .path.display())]
    InvalidParent {
        theme: String,
        found: String,
        path: PathBuf,
    },

    /// Following `parent` references led back to a theme already visited.
    #[error("cycle detected in theme inheritance: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}

/// The ordered ancestry of one theme.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    themes: Vec<String>,
    fragments: Vec<Fragment>,
    dependencies: Vec<PathBuf>,
    stamps: Vec<DependencyStamp>,
}

impl Chain {
    /// Theme names, root-most ancestor first, requested theme last.
    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    /// Fragments in merge order (root-most first).
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Every file consulted, in visit order.
    ///
    /// Includes higher-priority declaration candidates that were tried and
    /// found missing, so their later appearance invalidates a cached result.
    pub fn dependencies(&self) -> &[PathBuf] {
        &self.dependencies
    }

    /// Fingerprints taken before each dependency was read.
    ///
    /// Empty unless the resolver was given a [`Freshness`].
    pub fn stamps(&self) -> &[DependencyStamp] {
        &self.stamps
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Checks that a theme identifier is safe to use as a relative path.
///
/// Names may contain `/` to address nested folders, but must not be empty,
/// absolute, or climb out of the theme directory.
pub fn validate_name(name: &str) -> Result<(), ChainLoadError> {
    let invalid = |reason| ChainLoadError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    let path = Path::new(name);
    if path.is_absolute() || name.starts_with('/') || name.starts_with('\\') {
        return Err(invalid("name must be relative"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir | Component::ParentDir => {
                return Err(invalid("name must not contain '.' or '..' segments"))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("name must be relative"))
            }
        }
    }
    Ok(())
}

/// Walks `parent` references through declaration files.
pub struct ChainResolver<'a> {
    theme_directory: &'a Path,
    loader: &'a dyn ConfigLoader,
    freshness: Option<&'a dyn Freshness>,
}

impl<'a> ChainResolver<'a> {
    pub fn new(theme_directory: &'a Path, loader: &'a dyn ConfigLoader) -> Self {
        Self {
            theme_directory,
            loader,
            freshness: None,
        }
    }

    /// Stamps every dependency with `freshness` as the chain is walked.
    pub fn with_freshness(mut self, freshness: &'a dyn Freshness) -> Self {
        self.freshness = Some(freshness);
        self
    }

    /// Folder holding the declaration of `name`.
    pub fn theme_dir(&self, name: &str) -> PathBuf {
        self.theme_directory.join(name)
    }

    /// Loads `name` and all of its ancestors.
    ///
    /// # Errors
    ///
    /// - [`ChainLoadError::InvalidName`] if any name in the chain is unsafe
    /// - [`ChainLoadError::Load`] if a declaration is missing or malformed
    /// - [`ChainLoadError::InvalidParent`] if `parent` is not a string
    /// - [`ChainLoadError::CycleDetected`] if a theme is reached twice
    pub fn resolve(&self, name: &str) -> Result<Chain, ChainLoadError> {
        let mut themes = Vec::new();
        let mut fragments = Vec::new();
        let mut dependencies = Vec::new();
        let mut stamps = Vec::new();
        let mut visited = HashSet::new();
        let mut current = name.to_string();

        loop {
            validate_name(&current)?;
            if !visited.insert(current.clone()) {
                let mut path = themes;
                path.push(current);
                return Err(ChainLoadError::CycleDetected { path });
            }

            let load_err = |source| ChainLoadError::Load {
                theme: current.clone(),
                source,
            };
            let declaration =
                locate_declaration(&self.theme_dir(&current), self.loader.extensions())
                    .map_err(load_err)?;

            let first_new = dependencies.len();
            dependencies.extend(declaration.shadowing);
            dependencies.push(declaration.path.clone());
            if let Some(freshness) = self.freshness {
                stamps.extend(freshness.stamp(&dependencies[first_new..]));
            }

            let fragment = self.loader.load(&declaration.path).map_err(load_err)?;
            debug!(theme = %current, path = %declaration.path.display(), "loaded theme declaration");

            let parent = fragment
                .parent()
                .map_err(|found| ChainLoadError::InvalidParent {
                    theme: current.clone(),
                    found,
                    path: declaration.path.clone(),
                })?;

            themes.push(current);
            fragments.push(fragment);

            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        themes.reverse();
        fragments.reverse();
        debug!(theme = name, chain = ?themes, "resolved theme chain");

        Ok(Chain {
            themes,
            fragments,
            dependencies,
            stamps,
        })
    }
}

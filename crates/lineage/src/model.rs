//! Theme entities and the capability set they must provide.
//!
//! The factory does not hard-code its output type. Any type implementing
//! [`ThemeModel`] can be produced, cached and restored; [`Theme`] is the
//! stock implementation. The runtime configuration's `model` key names the
//! type to use and is checked once, when the factory is built.
//!
//! Entities are populated through the capability setters by the builder and
//! are not mutated afterwards. The parent relation is exclusive ownership: an
//! entity owns a complete copy of its ancestry.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The capability set required of a theme entity type.
///
/// ```rust,ignore
/// #[derive(Clone, Default, Serialize, Deserialize)]
/// struct BrandedTheme { inner: Theme, brand: Option<String> }
///
/// impl ThemeModel for BrandedTheme {
///     const MODEL: &'static str = "branded";
///     // ...
/// }
/// ```
pub trait ThemeModel: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier matched against the `model` configuration key.
    const MODEL: &'static str;

    /// Returns true if the configured identifier selects this type.
    fn accepts(model: &str) -> bool {
        model == Self::MODEL
    }

    /// A blank entity, ready to be populated.
    fn blank() -> Self;

    fn set_name(&mut self, name: String);
    fn set_description(&mut self, description: Option<String>);
    fn set_stylesheets(&mut self, stylesheets: Vec<String>);
    fn set_javascripts(&mut self, javascripts: Vec<String>);
    fn set_directory(&mut self, directory: PathBuf);
    fn set_public_directory(&mut self, directory: PathBuf);
    fn set_parent_theme(&mut self, parent: Self);

    fn name(&self) -> &str;
    fn parent_theme(&self) -> Option<&Self>;
}

/// Iterator over an entity and its ancestors, nearest first.
pub struct Ancestors<'a, M> {
    next: Option<&'a M>,
}

impl<'a, M: ThemeModel> Iterator for Ancestors<'a, M> {
    type Item = &'a M;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent_theme();
        Some(current)
    }
}

/// Walks `theme` and every ancestor, starting with `theme` itself.
pub fn ancestors<M: ThemeModel>(theme: &M) -> Ancestors<'_, M> {
    Ancestors { next: Some(theme) }
}

/// The stock theme entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    stylesheets: Vec<String>,
    #[serde(default)]
    javascripts: Vec<String>,
    directory: PathBuf,
    public_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Box<Theme>>,
}

impl Theme {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Stylesheets declared by (or inherited into) this theme's merged config.
    pub fn stylesheets(&self) -> &[String] {
        &self.stylesheets
    }

    pub fn javascripts(&self) -> &[String] {
        &self.javascripts
    }

    /// Base directory themes are loaded from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Base directory public theme assets are served from.
    pub fn public_directory(&self) -> &Path {
        &self.public_directory
    }

    pub fn parent_theme(&self) -> Option<&Theme> {
        self.parent.as_deref()
    }

    /// This theme's own folder.
    pub fn theme_path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    /// This theme's public asset folder.
    pub fn public_path(&self) -> PathBuf {
        self.public_directory.join(&self.name)
    }

    /// This theme followed by its ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors<'_, Theme> {
        ancestors(self)
    }

    /// Names from the root-most ancestor down to this theme.
    pub fn lineage(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ancestors().map(|t| t.name()).collect();
        names.reverse();
        names
    }

    /// Stylesheets of every theme in the chain, root-most first, duplicates removed.
    pub fn inherited_stylesheets(&self) -> Vec<&str> {
        self.collect_inherited(|t| &t.stylesheets)
    }

    /// Scripts of every theme in the chain, root-most first, duplicates removed.
    pub fn inherited_javascripts(&self) -> Vec<&str> {
        self.collect_inherited(|t| &t.javascripts)
    }

    fn collect_inherited<'a>(&'a self, assets: impl Fn(&'a Theme) -> &'a Vec<String>) -> Vec<&'a str> {
        let chain: Vec<&Theme> = self.ancestors().collect();
        let mut seen = std::collections::HashSet::new();
        chain
            .into_iter()
            .rev()
            .flat_map(|t| assets(t).iter())
            .map(String::as_str)
            .filter(|asset| seen.insert(*asset))
            .collect()
    }
}

impl ThemeModel for Theme {
    const MODEL: &'static str = "theme";

    fn blank() -> Self {
        Self::default()
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    fn set_stylesheets(&mut self, stylesheets: Vec<String>) {
        self.stylesheets = stylesheets;
    }

    fn set_javascripts(&mut self, javascripts: Vec<String>) {
        self.javascripts = javascripts;
    }

    fn set_directory(&mut self, directory: PathBuf) {
        self.directory = directory;
    }

    fn set_public_directory(&mut self, directory: PathBuf) {
        self.public_directory = directory;
    }

    fn set_parent_theme(&mut self, parent: Self) {
        self.parent = Some(Box::new(parent));
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_theme(&self) -> Option<&Self> {
        self.parent.as_deref()
    }
}

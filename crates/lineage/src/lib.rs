//! Lineage - inheritable themes with a file-backed, freshness-checked cache.
//!
//! A theme is a folder holding a `theme.yml` declaration. A declaration may
//! name a `parent`, in which case it inherits every setting it does not
//! override:
//!
//! ```text
//! themes/
//! ├── base/theme.yml     name: base,  stylesheets: [a.css]
//! └── child/theme.yml    name: child, parent: base, stylesheets: [b.css]
//! ```
//!
//! Looking up `child` walks the chain up to `base`, merges the declarations
//! (most specific last), validates the result against a [`Schema`], and
//! builds a [`Theme`] whose parent is the fully resolved `base` theme. The
//! result is cached together with the files it was built from; in debug mode
//! any later edit to one of them triggers a rebuild on the next lookup.
//!
//! # Quick Start
//!
//! ```rust
//! use lineage::{RuntimeConfig, Theme, ThemeFactory};
//!
//! # let temp = tempfile::TempDir::new()?;
//! # let root = temp.path();
//! # for (name, yaml) in [
//! #     ("base", "name: base\nstylesheets: [a.css]\n"),
//! #     ("child", "name: child\nparent: base\nstylesheets: [b.css]\n"),
//! # ] {
//! #     std::fs::create_dir_all(root.join("themes").join(name))?;
//! #     std::fs::write(root.join("themes").join(name).join("theme.yml"), yaml)?;
//! # }
//! let config = RuntimeConfig {
//!     theme_directory: root.join("themes"),
//!     cache_dir: root.join("cache"),
//!     debug: true,
//!     ..RuntimeConfig::default()
//! };
//! let factory: ThemeFactory<Theme> = ThemeFactory::new(&config)?;
//!
//! let child = factory.get_theme("child")?;
//! assert_eq!(child.stylesheets(), &["b.css".to_string()]);
//! assert_eq!(child.parent_theme().map(|p| p.name()), Some("base"));
//! assert_eq!(child.inherited_stylesheets(), vec!["a.css", "b.css"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pipeline
//!
//! | Stage | Module | Fails with |
//! |-------|--------|------------|
//! | Locate and parse declarations | [`loader`] | [`LoadError`] |
//! | Follow `parent` references | [`chain`] | [`ChainLoadError`] |
//! | Merge and validate | [`schema`] | [`SchemaValidationError`] |
//! | Build the entity | [`builder`] | [`ThemeError::NameMismatch`] |
//! | Cache and return | [`factory`] | [`ThemeError`] |
//!
//! # Custom Entity Types
//!
//! The factory is generic over [`ThemeModel`]. The `model` configuration key
//! must name the type's [`ThemeModel::MODEL`]; a mismatch is reported once,
//! by [`ThemeFactory::new`].

pub mod builder;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod factory;
pub mod loader;
pub mod model;
pub mod schema;

// Re-export public API
pub use builder::{ResolvedConfig, ThemeBuilder};
pub use cache::{
    CacheError, CacheRecord, CacheStore, ContentHashFreshness, DependencyStamp, FileCacheStore,
    Fingerprint, Freshness, MemoryCacheStore, MtimeFreshness,
};
pub use chain::{validate_name, Chain, ChainLoadError, ChainResolver};
pub use config::{ConfigError, CorruptCachePolicy, RuntimeConfig, TemplateConfig};
pub use error::{Result, ThemeError};
pub use factory::ThemeFactory;
pub use loader::{ConfigLoader, FileLoader, FileLoaderConfig, Fragment, LoadError};
pub use model::{ancestors, Ancestors, Theme, ThemeModel};
pub use schema::{
    merge, FieldKind, FieldSpec, FieldValue, ListMerge, MergedConfig, Problem, Schema,
    SchemaValidationError, SchemaViolation,
};

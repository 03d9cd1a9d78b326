//! The cache-backed lookup pipeline.
//!
//! [`ThemeFactory::get_theme`] is the single entry point. For a name whose
//! cache record is fresh it deserializes and returns the record. Otherwise it
//! walks the inheritance chain, merges the fragments against the schema,
//! builds the entity (looking up the parent through `get_theme` again),
//! persists the result and returns it.
//!
//! Freshness is only checked when the factory runs in debug mode. Outside of
//! it, an existing record is trusted until it is invalidated explicitly.
//!
//! # Example
//!
//! ```no_run
//! use lineage::{RuntimeConfig, Theme, ThemeFactory};
//!
//! let config = RuntimeConfig::from_file("lineage.yml")?;
//! let factory: ThemeFactory<Theme> = ThemeFactory::new(&config)?;
//!
//! let theme = factory.get_theme("child")?;
//! for stylesheet in theme.inherited_stylesheets() {
//!     println!("{}", stylesheet);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::builder::ThemeBuilder;
use crate::cache::{CacheError, CacheRecord, CacheStore, FileCacheStore, Freshness, MtimeFreshness};
use crate::chain::{validate_name, Chain, ChainLoadError, ChainResolver};
use crate::config::{CorruptCachePolicy, RuntimeConfig};
use crate::error::{Result, ThemeError};
use crate::loader::{ConfigLoader, FileLoader};
use crate::model::{Theme, ThemeModel};
use crate::schema::{self, Schema};

/// Resolves themes by name, caching each one with its dependency files.
pub struct ThemeFactory<M: ThemeModel = Theme> {
    theme_directory: PathBuf,
    public_directory: PathBuf,
    debug: bool,
    on_corrupt_cache: CorruptCachePolicy,
    schema: Schema,
    loader: Arc<dyn ConfigLoader>,
    store: Arc<dyn CacheStore>,
    freshness: Arc<dyn Freshness>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    _model: PhantomData<fn() -> M>,
}

impl<M: ThemeModel> std::fmt::Debug for ThemeFactory<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeFactory")
            .field("model", &M::MODEL)
            .field("theme_directory", &self.theme_directory)
            .field("public_directory", &self.public_directory)
            .field("debug", &self.debug)
            .field("freshness", &self.freshness.id())
            .finish_non_exhaustive()
    }
}

impl<M: ThemeModel> ThemeFactory<M> {
    /// Creates a factory from runtime configuration.
    ///
    /// Uses YAML declarations, a [`FileCacheStore`] under `cache_dir` and
    /// modification-time freshness. Each can be replaced with the `with_*`
    /// methods.
    ///
    /// # Errors
    ///
    /// [`ThemeError::ModelContract`] if `config.model` does not name `M`.
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        if !M::accepts(&config.model) {
            return Err(ThemeError::ModelContract {
                model: config.model.clone(),
                expected: M::MODEL,
            });
        }

        Ok(Self {
            theme_directory: config.theme_directory.clone(),
            public_directory: config.public_directory.clone(),
            debug: config.debug,
            on_corrupt_cache: config.on_corrupt_cache,
            schema: Schema::theme(),
            loader: Arc::new(FileLoader::yaml()),
            store: Arc::new(FileCacheStore::new(&config.cache_dir)),
            freshness: Arc::new(MtimeFreshness),
            locks: Mutex::new(HashMap::new()),
            _model: PhantomData,
        })
    }

    /// Replaces the declaration loader.
    pub fn with_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Replaces the cache store.
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the freshness strategy.
    ///
    /// Records written by a different strategy are treated as stale.
    pub fn with_freshness(mut self, freshness: Arc<dyn Freshness>) -> Self {
        self.freshness = freshness;
        self
    }

    /// Replaces the schema fragments are merged against.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn theme_directory(&self) -> &Path {
        &self.theme_directory
    }

    pub fn public_directory(&self) -> &Path {
        &self.public_directory
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns the entity for `name`, rebuilding it if its record is missing
    /// or stale.
    ///
    /// Only one rebuild per name runs at a time; concurrent callers for the
    /// same name wait and then read the record the first one wrote.
    ///
    /// # Errors
    ///
    /// - [`ThemeError::ChainLoad`] if any declaration in the chain is missing
    ///   or malformed, or the chain loops
    /// - [`ThemeError::SchemaValidation`] if the merged configuration is invalid
    /// - [`ThemeError::NameMismatch`] if a declared name differs from its folder
    /// - [`ThemeError::CacheCorruption`] for unreadable records when the
    ///   policy is [`CorruptCachePolicy::Fail`]
    /// - [`ThemeError::Cache`] if the store cannot be read or written
    pub fn get_theme(&self, name: &str) -> Result<M> {
        self.lookup(name, &mut Vec::new())
    }

    /// Walks the inheritance chain of `name` without touching the cache.
    pub fn resolve_chain(&self, name: &str) -> Result<Chain> {
        let resolver = ChainResolver::new(&self.theme_directory, self.loader.as_ref());
        Ok(resolver.resolve(name)?)
    }

    /// Drops the cache record for `name`.
    ///
    /// Records of descendants embed their own copy of this theme and are not
    /// affected; use [`clear_cache`](Self::clear_cache) to drop everything.
    pub fn invalidate(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.with_name_lock(name, || self.store.remove(name))?;
        debug!(theme = name, "invalidated cache record");
        Ok(())
    }

    /// Drops every cache record.
    pub fn clear_cache(&self) -> Result<()> {
        self.store.clear()?;
        info!("cleared theme cache");
        Ok(())
    }

    /// `in_progress` holds the names this thread is currently building, so
    /// a parent that leads back to one of them fails instead of waiting on
    /// its own lock.
    fn lookup(&self, name: &str, in_progress: &mut Vec<String>) -> Result<M> {
        validate_name(name)?;
        if in_progress.iter().any(|n| n == name) {
            let mut path = in_progress.clone();
            path.push(name.to_string());
            return Err(ChainLoadError::CycleDetected { path }.into());
        }

        self.with_name_lock(name, || {
            if let Some(theme) = self.read_fresh(name)? {
                debug!(theme = name, "cache hit");
                return Ok(theme);
            }

            in_progress.push(name.to_string());
            let result = self.rebuild(name, in_progress);
            in_progress.pop();
            result
        })
    }

    /// Runs `f` while holding the lock for `name`.
    ///
    /// The map only holds locks for names someone is using: the entry is
    /// dropped again once no other caller holds or waits for it.
    fn with_name_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(name.to_string()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under the map lock, so 2 means the map and us.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(name);
        }
        result
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the cached entity if there is a usable record.
    fn read_fresh(&self, name: &str) -> Result<Option<M>> {
        let record = match self.store.load(name) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(theme = name, "no cache record");
                return Ok(None);
            }
            Err(CacheError::Corrupt { message, .. }) => {
                self.handle_corrupt(name, message)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if self.debug && !self.freshness.is_fresh(&record.freshness, &record.dependencies) {
            debug!(theme = name, "cache record is stale");
            return Ok(None);
        }

        match serde_json::from_value(record.entity) {
            Ok(theme) => Ok(Some(theme)),
            Err(e) => {
                self.handle_corrupt(name, e.to_string())?;
                Ok(None)
            }
        }
    }

    fn handle_corrupt(&self, name: &str, message: String) -> Result<()> {
        match self.on_corrupt_cache {
            CorruptCachePolicy::Rebuild => {
                warn!(theme = name, error = %message, "discarding corrupt cache record");
                Ok(())
            }
            CorruptCachePolicy::Fail => Err(ThemeError::CacheCorruption {
                name: name.to_string(),
                message,
            }),
        }
    }

    fn rebuild(&self, name: &str, in_progress: &mut Vec<String>) -> Result<M> {
        // Each file is stamped just before it is read, so an edit made at any
        // later point leaves the record stale.
        let chain = ChainResolver::new(&self.theme_directory, self.loader.as_ref())
            .with_freshness(self.freshness.as_ref())
            .resolve(name)?;
        let dependencies = chain.stamps().to_vec();

        let merged = schema::merge(chain.fragments(), &self.schema)?;
        let builder = ThemeBuilder::new(&self.theme_directory, &self.public_directory);
        let theme: M = builder.build(name, &merged, |parent| self.lookup(parent, in_progress))?;

        let record = CacheRecord::new(self.freshness.id(), dependencies, &theme)?;
        self.store.store(name, &record)?;
        info!(theme = name, chain = ?chain.themes(), "built theme");

        Ok(theme)
    }
}

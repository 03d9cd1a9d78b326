//! Cache records, their storage and their freshness.
//!
//! - [`CacheStore`]: where records live ([`FileCacheStore`], [`MemoryCacheStore`])
//! - [`Freshness`]: how dependency files are fingerprinted
//!   ([`MtimeFreshness`], [`ContentHashFreshness`])

mod freshness;
mod store;

pub use freshness::{
    ContentHashFreshness, DependencyStamp, Fingerprint, Freshness, MtimeFreshness,
};
pub use store::{CacheError, CacheRecord, CacheStore, FileCacheStore, MemoryCacheStore, CACHE_SUBDIR};

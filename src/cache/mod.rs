//! # Two-Tier Analysis Cache
//!
//! Stores continuity analyses under semantic keys so that a scene whose
//! meaning, narrative context and reader knowledge are unchanged is never
//! analyzed twice.
//!
//! ## Features
//!
//! - **Semantic Keys**: keys derived by [`SemanticHasher`](crate::semantic::SemanticHasher)
//! - **L1 Memory Tier**: bounded LRU with lazy TTL checks on read
//! - **L2 Persistent Tier**: SQLite rows trimmed by last access after each write
//! - **Targeted Invalidation**: by scene id or narrative position across both tiers
//! - **Graceful Degradation**: any persistent-tier failure leaves the cache memory-only
//!
//! ## Example
//!
//! ```rust
//! use continuity_cache::cache::{AnalysisCache, CacheConfig};
//! use continuity_cache::semantic::{ReaderKnowledge, Scene};
//! use serde_json::json;
//!
//! # async fn example() {
//! let cache = AnalysisCache::new(CacheConfig::memory_only());
//! cache.init().await;
//!
//! let scene = Scene::new("s1", "Alice met Bob at noon.", 3);
//! let knowledge = ReaderKnowledge::default();
//!
//! if cache.get::<serde_json::Value>(&scene, 3, &[], &knowledge).await.is_none() {
//!     let analysis = json!({"issues": [], "confidence": 0.9});
//!     cache.set(&scene, 3, &[], &knowledge, &analysis, None).await;
//! }
//!
//! println!("{}", cache.stats());
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod persistent;
pub mod store;
pub mod types;

pub use analysis::{AnalysisCache, AnalysisStats};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CachedEntry, KeyMetadata};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use persistent::{NullTier, PersistedRow, PersistentTier, RowFilter, SqliteTier};
pub use store::CacheStorage;
pub use types::{CacheTier, StorageKey, StorageStats};

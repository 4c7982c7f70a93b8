//! # Continuity Cache (continuity-cache)
//!
//! Semantic caching for scene continuity analysis.
//!
//! ## Features
//!
//! - Meaning-based fingerprints of scene content, narrative context and reader knowledge
//! - Pluggable linguistic extraction with a heuristic fallback
//! - Two-tier storage: in-memory LRU in front of a bounded SQLite table
//! - 24 hour TTL, checked lazily on read and swept opportunistically on write
//! - Invalidation by scene id or narrative position
//! - Never fails the caller: cache faults surface as misses
//!
//! ## Usage
//!
//! ```no_run
//! use continuity_cache::{AnalysisCache, CacheConfig, ReaderKnowledge, Scene};
//! use serde_json::json;
//! use std::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = AnalysisCache::new(CacheConfig::from_env());
//!     cache.init().await;
//!
//!     let previous = vec![Scene::new("s0", "Alice waited at the station.", 2)];
//!     let scene = Scene::new("s1", "Alice met Bob at noon.", 3);
//!     let knowledge = ReaderKnowledge::default();
//!
//!     let analysis = match cache.get::<serde_json::Value>(&scene, 3, &previous, &knowledge).await {
//!         Some(cached) => cached,
//!         None => {
//!             let started = Instant::now();
//!             let fresh = json!({"issues": [], "confidence": 0.9});
//!             cache
//!                 .set(&scene, 3, &previous, &knowledge, &fresh, Some(started.elapsed()))
//!                 .await;
//!             fresh
//!         }
//!     };
//!
//!     println!("{} -> {}", analysis, cache.stats());
//!     Ok(())
//! }
//! ```
//!
//! ## Semantic Keys
//!
//! ```rust
//! use continuity_cache::SemanticHasher;
//!
//! let hasher = SemanticHasher::default();
//! assert_eq!(
//!     hasher.hash_scene_content("Alice walked in."),
//!     hasher.hash_scene_content("Alice   walked in!!"),
//! );
//! ```

pub mod cache;
pub mod error;
pub mod semantic;

// Re-export main types for convenience
pub use cache::{
    AnalysisCache, AnalysisStats, CacheConfig, CacheConfigBuilder, CacheStorage, CacheTier,
    CachedEntry, InvalidationEvent, InvalidationReason, KeyMetadata, NullTier, PersistentTier,
    SqliteTier, StorageStats,
};
pub use error::{CacheError, Result};
pub use semantic::{
    CacheKey, EntityExtractor, LinguisticAnalyzer, ReaderKnowledge, Scene, SemanticHasher,
    SemanticSignature, Setting, TimelineEvent,
};

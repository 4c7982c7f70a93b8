//! # Semantic Fingerprinting
//!
//! Turns a scene, its narrative position, the preceding scenes and the
//! reader's accumulated knowledge into a [`CacheKey`] whose identity tracks
//! meaning rather than bytes.
//!
//! ```rust
//! use continuity_cache::semantic::{ReaderKnowledge, Scene, SemanticHasher};
//!
//! let hasher = SemanticHasher::default();
//! let scene = Scene::new("s1", "Alice met Bob at noon.", 3);
//!
//! let first = hasher.generate_cache_key(&scene, 3, &[], &ReaderKnowledge::default());
//! let second = hasher.generate_cache_key(&scene, 3, &[], &ReaderKnowledge::default());
//! assert_eq!(first.storage_key(), second.storage_key());
//! ```

pub mod canonical;
pub mod extract;
pub mod hasher;
pub mod normalize;
pub mod types;

pub use canonical::{canonical_json, hash_value, sha256_hex};
pub use extract::{Entities, EntityExtractor, HeuristicExtractor, LexiconAnalyzer, LinguisticAnalyzer};
pub use hasher::SemanticHasher;
pub use normalize::{fingerprint_text, normalize, normalize_name};
pub use types::{
    sorted_set, CacheKey, ReaderKnowledge, Scene, SemanticSignature, Setting, TimelineEvent,
};

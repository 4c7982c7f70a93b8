//! Analysis cache: semantic keys in front of the two-tier storage
//!
//! Every public method is infallible. Faults inside the cache are logged and
//! turn into a miss (reads) or a no-op (writes), so a caller can always fall
//! back to recomputing the analysis.

use crate::cache::{
    config::CacheConfig,
    entry::{CachedEntry, KeyMetadata},
    invalidation::{InvalidationEvent, InvalidationReason},
    store::CacheStorage,
    types::StorageStats,
};
use crate::semantic::{CacheKey, EntityExtractor, ReaderKnowledge, Scene, SemanticHasher};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statistics reported by [`AnalysisCache::stats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    /// `total_hits / (total_hits + total_misses) * 100`
    pub hit_rate: f64,

    /// In-memory entries plus persistent rows, as of the last refresh
    pub size: usize,

    pub total_hits: u64,
    pub total_misses: u64,

    /// Mean latency of successful lookups
    pub avg_hit_time_ms: f64,

    /// Mean caller-reported generation latency
    pub avg_generation_time_ms: f64,

    /// Whether the persistent tier is active
    pub persistent: bool,

    /// LRU and TTL evictions reported by the storage layer
    pub evictions: u64,
}

impl fmt::Display for AnalysisStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisStats {{ hit_rate: {:.2}%, size: {}, hits: {}, misses: {}, avg_hit: {:.3}ms, avg_generation: {:.1}ms }}",
            self.hit_rate,
            self.size,
            self.total_hits,
            self.total_misses,
            self.avg_hit_time_ms,
            self.avg_generation_time_ms
        )
    }
}

/// Running means kept by the coordinator
#[derive(Debug, Default)]
struct LatencyMetrics {
    hits: u64,
    misses: u64,
    avg_hit_ms: f64,
    generations: u64,
    avg_generation_ms: f64,
}

impl LatencyMetrics {
    fn record_hit(&mut self, elapsed: Duration) {
        self.hits += 1;
        self.avg_hit_ms = running_mean(self.avg_hit_ms, duration_ms(elapsed), self.hits);
    }

    fn record_miss(&mut self) {
        self.misses += 1;
    }

    fn record_generation(&mut self, latency: Duration) {
        self.generations += 1;
        self.avg_generation_ms =
            running_mean(self.avg_generation_ms, duration_ms(latency), self.generations);
    }
}

fn running_mean(mean: f64, sample: f64, count: u64) -> f64 {
    mean + (sample - mean) / count as f64
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Semantic cache for scene continuity analyses
///
/// One long-lived instance is meant to be shared (it is cheap to wrap in an
/// `Arc`) by every task that analyzes scenes.
pub struct AnalysisCache {
    storage: Arc<CacheStorage>,
    hasher: Arc<SemanticHasher>,
    metrics: Mutex<LatencyMetrics>,
    storage_snapshot: RwLock<StorageStats>,
}

impl AnalysisCache {
    /// Create a cache from configuration. Call [`AnalysisCache::init`] to
    /// attach the persistent tier.
    pub fn new(config: CacheConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("Invalid cache configuration ({}), using defaults", e);
            return Self::new(CacheConfig {
                enable_persistence: config.enable_persistence,
                db_path: config.db_path,
                ..CacheConfig::default()
            });
        }

        let extractor = if config.linguistic_analysis {
            EntityExtractor::lexicon()
        } else {
            EntityExtractor::heuristic()
        };
        let hasher = SemanticHasher::new(extractor).with_context_window(config.context_window);

        Self::with_parts(Arc::new(CacheStorage::new(config)), Arc::new(hasher))
    }

    /// Assemble a cache from an existing storage and hasher
    pub fn with_parts(storage: Arc<CacheStorage>, hasher: Arc<SemanticHasher>) -> Self {
        Self {
            storage,
            hasher,
            metrics: Mutex::new(LatencyMetrics::default()),
            storage_snapshot: RwLock::new(StorageStats::default()),
        }
    }

    /// Open the persistent tier; returns whether it is active. Failure leaves
    /// the cache memory-only.
    pub async fn init(&self) -> bool {
        let persistent = self.storage.init().await;
        self.refresh_snapshot().await;

        if persistent {
            info!("Analysis cache initialized with persistent tier");
        } else {
            info!("Analysis cache initialized memory-only");
        }
        persistent
    }

    /// Semantic key for the given inputs
    pub fn cache_key(
        &self,
        scene: &Scene,
        position: i64,
        previous_scenes: &[Scene],
        reader_knowledge: &ReaderKnowledge,
    ) -> CacheKey {
        self.hasher
            .generate_cache_key(scene, position, previous_scenes, reader_knowledge)
    }

    /// Look up a cached analysis. A payload that no longer deserializes into
    /// `T` is purged and reported as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        scene: &Scene,
        position: i64,
        previous_scenes: &[Scene],
        reader_knowledge: &ReaderKnowledge,
    ) -> Option<T> {
        let started = Instant::now();
        let key = self
            .cache_key(scene, position, previous_scenes, reader_knowledge)
            .storage_key();

        let Some(entry) = self.storage.get(&key).await else {
            self.metrics.lock().record_miss();
            return None;
        };

        match serde_json::from_str::<T>(&entry.payload) {
            Ok(payload) => {
                self.metrics.lock().record_hit(started.elapsed());
                debug!("Analysis cache hit for scene {} at {}", scene.id, position);
                Some(payload)
            }
            Err(e) => {
                warn!(
                    "Discarding corrupt cached analysis for scene {} ({})",
                    scene.id, e
                );
                self.storage
                    .remove_with_reason(&key, InvalidationReason::Corrupt)
                    .await;
                self.metrics.lock().record_miss();
                self.refresh_snapshot().await;
                None
            }
        }
    }

    /// Store an analysis. `generation_latency` is how long the caller took
    /// to produce it, when known.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        scene: &Scene,
        position: i64,
        previous_scenes: &[Scene],
        reader_knowledge: &ReaderKnowledge,
        payload: &T,
        generation_latency: Option<Duration>,
    ) {
        if let Some(latency) = generation_latency {
            self.metrics.lock().record_generation(latency);
        }

        let payload = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                warn!("Not caching analysis for scene {}: {}", scene.id, e);
                return;
            }
        };

        let key = self.cache_key(scene, position, previous_scenes, reader_knowledge);
        let entry = CachedEntry::new(payload, key.semantic_signature.combined());
        let meta = KeyMetadata::new(scene.id.clone(), position);

        let events = self.storage.set(&key.storage_key(), entry, meta).await;
        self.refresh_snapshot().await;
        debug!("Cached analysis for scene {} at {}", scene.id, position);
        for event in events {
            debug!("Write removed {} entries ({})", event.removed(), event.reason);
        }
    }

    /// Drop every cached analysis of `scene_id`
    pub async fn invalidate_scene(&self, scene_id: &str) -> InvalidationEvent {
        let event = self.storage.invalidate_by_scene_id(scene_id).await;
        self.refresh_snapshot().await;
        event
    }

    /// Drop every cached analysis recorded at `position`
    pub async fn invalidate_position(&self, position: i64) -> InvalidationEvent {
        let event = self.storage.invalidate_by_position(position).await;
        self.refresh_snapshot().await;
        event
    }

    /// Compute keys for `scenes` in order, each with the scenes before it as
    /// context and empty reader knowledge. Nothing is stored. Returns the
    /// number of keys computed.
    pub async fn warm_cache(&self, scenes: &[Scene]) -> usize {
        let reader_knowledge = ReaderKnowledge::default();
        let started = Instant::now();

        for (index, scene) in scenes.iter().enumerate() {
            let key = self.cache_key(scene, scene.position, &scenes[..index], &reader_knowledge);
            debug!("Warmed key for scene {}: {}", scene.id, key.semantic_signature.combined());
            tokio::task::yield_now().await;
        }

        info!(
            "Warmed {} scene keys in {:.1}ms",
            scenes.len(),
            duration_ms(started.elapsed())
        );
        scenes.len()
    }

    /// Sweep expired entries from both tiers; returns how many were removed
    pub async fn cleanup(&self) -> usize {
        let event = self.storage.cleanup_expired().await;
        self.refresh_snapshot().await;
        event.removed()
    }

    /// Empty both tiers. Latency statistics are kept.
    pub async fn clear(&self) {
        self.storage.clear().await;
        self.refresh_snapshot().await;
    }

    /// Cheap synchronous statistics. `size` reflects the storage state as of
    /// the last write or invalidation.
    pub fn stats(&self) -> AnalysisStats {
        let metrics = self.metrics.lock();
        let storage = self.storage_snapshot.read();
        let total = metrics.hits + metrics.misses;

        AnalysisStats {
            hit_rate: if total == 0 {
                0.0
            } else {
                metrics.hits as f64 / total as f64 * 100.0
            },
            size: storage.size(),
            total_hits: metrics.hits,
            total_misses: metrics.misses,
            avg_hit_time_ms: metrics.avg_hit_ms,
            avg_generation_time_ms: metrics.avg_generation_ms,
            persistent: self.storage.persistence_enabled(),
            evictions: storage.evictions_lru + storage.evictions_ttl,
        }
    }

    /// Underlying storage
    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Hasher used to derive keys
    pub fn hasher(&self) -> &SemanticHasher {
        &self.hasher
    }

    async fn refresh_snapshot(&self) {
        let stats = self.storage.stats().await;
        *self.storage_snapshot.write() = stats;
    }
}

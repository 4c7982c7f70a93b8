//! Two-tier cache storage with LRU eviction, lazy TTL and targeted invalidation

use crate::cache::{
    config::CacheConfig,
    entry::{now_ms, CachedEntry, KeyMetadata},
    invalidation::{InvalidationEvent, InvalidationReason},
    persistent::{NullTier, PersistedRow, PersistentTier, RowFilter, SqliteTier},
    types::{CacheTier, StorageKey, StorageStats},
};
use crate::error::{CacheError, Result};
use parking_lot::RwLock as SyncRwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Two-tier key/value store for serialized analyses
///
/// - L1: bounded in-memory tier with LRU eviction and lazy TTL checks
/// - L2: bounded persistent tier behind [`PersistentTier`]
///
/// Any L2 failure swaps the persistent tier for [`NullTier`] for the rest of
/// the process lifetime; the store keeps serving from memory.
pub struct CacheStorage {
    /// Cache configuration
    config: CacheConfig,

    /// In-memory tier
    memory: Arc<RwLock<MemoryTier>>,

    /// Persistent tier (null object when unavailable)
    persistent: SyncRwLock<Arc<dyn PersistentTier>>,

    /// Set once the persistent tier has failed; never cleared
    persistence_disabled: AtomicBool,

    /// Epoch ms of the last persistent-tier TTL sweep
    last_sweep_ms: AtomicI64,
}

/// Internal in-memory storage
struct MemoryTier {
    /// Main storage: key -> entry
    entries: HashMap<StorageKey, CachedEntry>,

    /// LRU tracking: front is least recently used
    lru_queue: VecDeque<StorageKey>,

    /// Secondary attributes for invalidation by scene id or position
    key_metadata: HashMap<StorageKey, KeyMetadata>,

    /// Running statistics
    stats: StorageStats,
}

impl MemoryTier {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            key_metadata: HashMap::new(),
            stats: StorageStats::default(),
        }
    }

    fn touch(&mut self, key: &str) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) -> Option<CachedEntry> {
        let entry = self.entries.remove(key)?;
        self.lru_queue.retain(|k| k != key);
        self.key_metadata.remove(key);
        self.stats.l1_entries = self.entries.len();
        Some(entry)
    }

    /// Insert or replace an entry; returns the keys evicted to make room
    fn insert(
        &mut self,
        key: &str,
        entry: CachedEntry,
        meta: KeyMetadata,
        max_entries: usize,
    ) -> Vec<StorageKey> {
        let mut evicted = Vec::new();

        if self.entries.contains_key(key) {
            debug!("Updating existing cache entry: {}", key);
            self.entries.insert(key.to_string(), entry);
            self.touch(key);
        } else {
            while self.entries.len() >= max_entries {
                let Some(oldest) = self.lru_queue.pop_front() else {
                    break;
                };
                debug!("Evicting entry due to l1_max_entries limit: {}", oldest);
                self.entries.remove(&oldest);
                self.key_metadata.remove(&oldest);
                self.stats.evictions_lru += 1;
                evicted.push(oldest);
            }

            debug!("Inserting new cache entry: {}", key);
            self.entries.insert(key.to_string(), entry);
            self.lru_queue.push_back(key.to_string());
        }

        self.key_metadata.insert(key.to_string(), meta);
        self.stats.l1_entries = self.entries.len();
        evicted
    }

    fn keys_matching<F: Fn(&KeyMetadata) -> bool>(&self, predicate: F) -> Vec<StorageKey> {
        self.key_metadata
            .iter()
            .filter(|(_, meta)| predicate(meta))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl CacheStorage {
    /// Create an in-memory store. The persistent tier is attached by
    /// [`CacheStorage::init`].
    pub fn new(config: CacheConfig) -> Self {
        Self::with_persistent_tier(config, Arc::new(NullTier))
    }

    /// Create a store with an explicit persistent tier
    pub fn with_persistent_tier(config: CacheConfig, tier: Arc<dyn PersistentTier>) -> Self {
        info!(
            "Initializing cache storage (l1: {}, l2: {}, persistent tier: {})",
            config.l1_max_entries,
            config.l2_max_rows,
            tier.name()
        );

        Self {
            config,
            memory: Arc::new(RwLock::new(MemoryTier::new())),
            persistent: SyncRwLock::new(tier),
            persistence_disabled: AtomicBool::new(false),
            last_sweep_ms: AtomicI64::new(0),
        }
    }

    /// Open the persistent tier. Failure disables it for the rest of the
    /// process instead of propagating; returns whether L2 is active.
    pub async fn init(&self) -> bool {
        if self.persistence_enabled() {
            self.refresh_row_count().await;
            return true;
        }

        if !self.config.enable_persistence {
            info!("Persistent cache tier disabled by configuration, running memory-only");
            return false;
        }

        if self.persistence_disabled.load(Ordering::SeqCst) {
            return false;
        }

        match SqliteTier::open(self.config.resolved_db_path()) {
            Ok(tier) => {
                if let Some(path) = tier.path() {
                    info!("Persistent cache tier ready at {}", path.display());
                }
                *self.persistent.write() = Arc::new(tier);
                self.refresh_row_count().await;
                true
            }
            Err(e) => {
                self.disable_persistence("open", &e);
                false
            }
        }
    }

    /// Whether the persistent tier is active
    pub fn persistence_enabled(&self) -> bool {
        !self.persistence_disabled.load(Ordering::SeqCst) && self.persistent.read().is_available()
    }

    /// Look up an entry, L1 first, then L2 (hydrating L1 on a hit)
    pub async fn get(&self, key: &str) -> Option<CachedEntry> {
        self.get_with_tier(key).await.map(|(entry, _)| entry)
    }

    /// Like [`CacheStorage::get`], also reporting which tier answered
    pub async fn get_with_tier(&self, key: &str) -> Option<(CachedEntry, CacheTier)> {
        let now = now_ms();
        let ttl_ms = self.config.ttl_ms();

        // Held through the L2 lookup and hydration so an invalidation cannot
        // land between reading a row and copying it into memory
        let mut memory = self.memory.write().await;

        let cached = memory
            .entries
            .get(key)
            .map(|e| (e.is_expired_at(now, ttl_ms), e.age_ms(now)));

        match cached {
            Some((true, age)) => {
                debug!("Cache entry expired after {}ms: {}", age, key);
                memory.remove(key);
                memory.stats.misses += 1;
                memory.stats.evictions_ttl += 1;
                self.with_persistent("delete", |tier| tier.delete(key));
                return None;
            }
            Some((false, _)) => {
                let entry = match memory.entries.get_mut(key) {
                    Some(entry) => {
                        entry.mark_accessed(now);
                        entry.clone()
                    }
                    None => return None,
                };
                memory.touch(key);
                memory.stats.hits += 1;
                memory.stats.l1_hits += 1;

                debug!("Cache hit (l1): {}", key);
                self.with_persistent("touch", |tier| {
                    tier.touch(key, entry.last_accessed, entry.hit_count)
                });
                return Some((entry, CacheTier::Memory));
            }
            None => {}
        }

        let row = match self.with_persistent("get", |tier| tier.get(key)).flatten() {
            Some(row) => row,
            None => {
                debug!("Cache miss: {}", key);
                memory.stats.misses += 1;
                return None;
            }
        };

        if row.entry.is_expired_at(now, ttl_ms) {
            debug!(
                "Persistent cache entry expired after {}ms: {}",
                row.entry.age_ms(now),
                key
            );
            self.with_persistent("delete", |tier| tier.delete(key));
            memory.stats.misses += 1;
            memory.stats.evictions_ttl += 1;
            return None;
        }

        let mut entry = row.entry;
        entry.mark_accessed(now);
        self.with_persistent("touch", |tier| {
            tier.touch(key, entry.last_accessed, entry.hit_count)
        });

        memory.insert(key, entry.clone(), row.meta, self.config.l1_max_entries);
        memory.stats.hits += 1;
        memory.stats.l2_hits += 1;

        debug!("Cache hit (l2, hydrated): {}", key);
        Some((entry, CacheTier::Persistent))
    }

    /// Store an entry in both tiers. L2 failures degrade to memory-only.
    ///
    /// Returns the removals the write caused: LRU evictions from memory, rows
    /// trimmed by the row limit and rows dropped by a due TTL sweep.
    pub async fn set(
        &self,
        key: &str,
        entry: CachedEntry,
        meta: KeyMetadata,
    ) -> Vec<InvalidationEvent> {
        let mut events = Vec::new();

        let evicted = {
            let mut memory = self.memory.write().await;
            memory.insert(key, entry.clone(), meta.clone(), self.config.l1_max_entries)
        };
        if !evicted.is_empty() {
            events.push(InvalidationEvent::new(InvalidationReason::LeastRecentlyUsed, evicted));
        }

        let row = PersistedRow {
            key: key.to_string(),
            entry,
            meta,
        };

        if self.with_persistent("put", |tier| tier.put(&row)).is_some() {
            let max_rows = self.config.l2_max_rows;
            let trimmed = self
                .with_persistent("trim", |tier| tier.trim_to(max_rows))
                .unwrap_or(0);
            if trimmed > 0 {
                debug!("Trimmed {} rows over the l2_max_rows limit", trimmed);
                events.push(
                    InvalidationEvent::new(InvalidationReason::Capacity, Vec::new())
                        .with_persistent_rows(trimmed),
                );
            }
            events.extend(self.sweep_if_due());
            self.refresh_row_count().await;
        }

        events
    }

    /// Whether `key` is currently held in memory (no TTL check, no LRU touch)
    pub async fn in_memory(&self, key: &str) -> bool {
        self.memory.read().await.entries.contains_key(key)
    }

    /// Remove one key from both tiers
    pub async fn remove(&self, key: &str) -> InvalidationEvent {
        self.remove_with_reason(key, InvalidationReason::Manual).await
    }

    /// Remove one key from both tiers, recording why
    pub async fn remove_with_reason(&self, key: &str, reason: InvalidationReason) -> InvalidationEvent {
        let mut memory = self.memory.write().await;
        let keys = match memory.remove(key) {
            Some(_) => {
                memory.stats.invalidations += 1;
                vec![key.to_string()]
            }
            None => Vec::new(),
        };
        let rows = self
            .with_persistent("delete", |tier| tier.delete(key))
            .map_or(0, usize::from);
        drop(memory);

        debug!("Removed cache entry {} (l1: {}, l2: {}, {})", key, keys.len(), rows, reason);
        InvalidationEvent::new(reason, keys).with_persistent_rows(rows)
    }

    /// Remove every entry recorded for `scene_id`
    pub async fn invalidate_by_scene_id(&self, scene_id: &str) -> InvalidationEvent {
        let reason = InvalidationReason::SceneChanged {
            scene_id: scene_id.to_string(),
        };
        self.invalidate_where(reason, |meta| meta.matches_scene(scene_id), RowFilter::SceneId(scene_id.to_string()))
            .await
    }

    /// Remove every entry recorded at `position`
    pub async fn invalidate_by_position(&self, position: i64) -> InvalidationEvent {
        let reason = InvalidationReason::PositionChanged { position };
        self.invalidate_where(reason, |meta| meta.matches_position(position), RowFilter::Position(position))
            .await
    }

    async fn invalidate_where<F>(
        &self,
        reason: InvalidationReason,
        predicate: F,
        filter: RowFilter,
    ) -> InvalidationEvent
    where
        F: Fn(&KeyMetadata) -> bool,
    {
        let (keys, rows) = {
            let mut memory = self.memory.write().await;
            let keys = memory.keys_matching(predicate);
            for key in &keys {
                memory.remove(key);
            }
            memory.stats.invalidations += keys.len() as u64;

            let rows = self
                .with_persistent("invalidate", |tier| tier.delete_where(&filter))
                .unwrap_or(0);
            (keys, rows)
        };
        self.refresh_row_count().await;

        info!(
            "Invalidated {} in-memory entries and {} persistent rows ({})",
            keys.len(),
            rows,
            reason
        );
        InvalidationEvent::new(reason, keys).with_persistent_rows(rows)
    }

    /// Sweep expired entries from both tiers
    pub async fn cleanup_expired(&self) -> InvalidationEvent {
        let now = now_ms();
        let ttl_ms = self.config.ttl_ms();

        let (keys, rows) = {
            let mut memory = self.memory.write().await;
            let expired: Vec<StorageKey> = memory
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now, ttl_ms))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                memory.remove(key);
            }
            memory.stats.evictions_ttl += expired.len() as u64;

            self.last_sweep_ms.store(now, Ordering::SeqCst);
            let rows = self
                .with_persistent("sweep", |tier| {
                    tier.delete_where(&RowFilter::CachedBefore(now.saturating_sub(ttl_ms)))
                })
                .unwrap_or(0);
            (expired, rows)
        };
        self.refresh_row_count().await;

        debug!("Cleaned up {} expired entries and {} expired rows", keys.len(), rows);
        InvalidationEvent::new(InvalidationReason::Expired, keys)
            .with_persistent_rows(rows)
            .with_context(format!("ttl: {}ms", ttl_ms))
    }

    /// Empty both tiers and the metadata index
    pub async fn clear(&self) -> InvalidationEvent {
        let (keys, rows) = {
            let mut memory = self.memory.write().await;
            let keys: Vec<StorageKey> = memory.entries.keys().cloned().collect();
            memory.entries.clear();
            memory.lru_queue.clear();
            memory.key_metadata.clear();
            memory.stats.l1_entries = 0;

            let rows = self.with_persistent("clear", |tier| tier.clear()).unwrap_or(0);
            (keys, rows)
        };
        self.refresh_row_count().await;

        info!("Cleared {} entries from memory and {} persistent rows", keys.len(), rows);
        InvalidationEvent::new(InvalidationReason::Cleared, keys).with_persistent_rows(rows)
    }

    /// Get storage statistics. `l2_rows` reflects the last opportunistic
    /// refresh rather than a fresh count.
    pub async fn stats(&self) -> StorageStats {
        let memory = self.memory.read().await;
        let mut stats = memory.stats.clone();
        stats.l1_entries = memory.entries.len();
        stats.persistent = self.persistence_enabled();
        stats
    }

    /// Number of entries in memory
    pub async fn l1_len(&self) -> usize {
        self.memory.read().await.entries.len()
    }

    /// Recount persistent rows into the statistics
    pub async fn refresh_row_count(&self) {
        let rows = self.with_persistent("count", |tier| tier.count()).unwrap_or(0);
        self.memory.write().await.stats.l2_rows = rows;
    }

    /// Run a persistent sweep when `cleanup_interval` has elapsed since the
    /// last one
    fn sweep_if_due(&self) -> Option<InvalidationEvent> {
        let now = now_ms();
        let interval = i64::try_from(self.config.cleanup_interval.as_millis()).unwrap_or(i64::MAX);
        let last = self.last_sweep_ms.load(Ordering::SeqCst);
        if now.saturating_sub(last) < interval {
            return None;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        let cutoff = now.saturating_sub(self.config.ttl_ms());
        let rows = self.with_persistent("sweep", |tier| {
            tier.delete_where(&RowFilter::CachedBefore(cutoff))
        })?;
        if rows == 0 {
            return None;
        }

        debug!("Opportunistic sweep removed {} expired rows", rows);
        Some(InvalidationEvent::new(InvalidationReason::Expired, Vec::new()).with_persistent_rows(rows))
    }

    /// Run `op` against the persistent tier. Errors disable the tier and
    /// yield `None`; so does an unavailable tier.
    fn with_persistent<T, F>(&self, op: &str, f: F) -> Option<T>
    where
        F: FnOnce(&dyn PersistentTier) -> Result<T>,
    {
        let tier = self.persistent.read().clone();
        if !tier.is_available() {
            return None;
        }

        match f(tier.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                self.disable_persistence(op, &e);
                None
            }
        }
    }

    fn disable_persistence(&self, op: &str, error: &CacheError) {
        if !self.persistence_disabled.swap(true, Ordering::SeqCst) {
            warn!(
                "Persistent cache tier failed during {} ({}); continuing memory-only for this session",
                op, error
            );
        }
        *self.persistent.write() = Arc::new(NullTier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const HOUR_MS: i64 = 3_600_000;

    fn memory_only(l1_max: usize) -> CacheStorage {
        CacheStorage::new(
            CacheConfig::builder()
                .l1_max_entries(l1_max)
                .enable_persistence(false)
                .build(),
        )
    }

    fn with_sqlite(config: CacheConfig) -> CacheStorage {
        CacheStorage::with_persistent_tier(config, Arc::new(SqliteTier::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_basic_set_and_get() {
        let storage = memory_only(10);
        storage
            .set("key1", CachedEntry::new("{}", "sig"), KeyMetadata::new("s1", 1))
            .await;

        let entry = storage.get("key1").await.unwrap();
        assert_eq!(entry.payload, "{}");
        assert_eq!(entry.hit_count, 1);

        let stats = storage.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert!(!stats.persistent);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let storage = memory_only(10);
        assert!(storage.get("nonexistent").await.is_none());
        assert_eq!(storage.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_respects_reads() {
        let storage = memory_only(3);
        for key in ["key1", "key2", "key3"] {
            storage.set(key, CachedEntry::new("{}", "sig"), KeyMetadata::default()).await;
        }

        // key1 becomes most recently used, so key2 is evicted next
        storage.get("key1").await.unwrap();
        let events = storage
            .set("key4", CachedEntry::new("{}", "sig"), KeyMetadata::default())
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, InvalidationReason::LeastRecentlyUsed);
        assert_eq!(events[0].keys, vec!["key2".to_string()]);

        assert!(storage.in_memory("key1").await);
        assert!(!storage.in_memory("key2").await);
        assert!(storage.in_memory("key3").await);
        assert!(storage.in_memory("key4").await);
        assert_eq!(storage.stats().await.evictions_lru, 1);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let storage = memory_only(2);
        storage.set("a", CachedEntry::new("1", "sig"), KeyMetadata::default()).await;
        storage.set("b", CachedEntry::new("2", "sig"), KeyMetadata::default()).await;
        storage.set("a", CachedEntry::new("3", "sig"), KeyMetadata::default()).await;

        assert_eq!(storage.l1_len().await, 2);
        assert_eq!(storage.get("a").await.unwrap().payload, "3");
    }

    #[tokio::test]
    async fn test_expired_entry_removed_from_both_tiers() {
        let storage = with_sqlite(CacheConfig::default());
        let stale = CachedEntry::at("{}", "sig", now_ms() - 25 * HOUR_MS);
        let events = storage.set("old", stale, KeyMetadata::new("s1", 1)).await;

        // The first write is always followed by a sweep, which drops the row
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, InvalidationReason::Expired);
        assert_eq!(events[0].persistent_rows, 1);

        assert!(storage.get("old").await.is_none());
        assert!(!storage.in_memory("old").await);
        assert!(storage.get("old").await.is_none());

        let stats = storage.stats().await;
        assert_eq!(stats.evictions_ttl, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_l2_hit_hydrates_memory() {
        let storage = with_sqlite(CacheConfig::builder().l1_max_entries(1).build());
        storage.set("first", CachedEntry::new("a", "sig"), KeyMetadata::new("s1", 1)).await;
        storage.set("second", CachedEntry::new("b", "sig"), KeyMetadata::new("s2", 2)).await;
        assert!(!storage.in_memory("first").await);

        let (entry, tier) = storage.get_with_tier("first").await.unwrap();
        assert_eq!(entry.payload, "a");
        assert_eq!(tier, CacheTier::Persistent);
        assert!(storage.in_memory("first").await);

        // Hydrated metadata supports invalidation
        let event = storage.invalidate_by_scene_id("s1").await;
        assert_eq!(event.keys, vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_persistent_row_limit() {
        let storage = with_sqlite(CacheConfig::builder().l2_max_rows(3).build());
        let mut trimmed = 0;
        for i in 0..5 {
            let events = storage
                .set(&format!("k{}", i), CachedEntry::new("{}", "sig"), KeyMetadata::new("s", i))
                .await;
            trimmed += events
                .iter()
                .filter(|e| e.reason == InvalidationReason::Capacity)
                .map(|e| e.persistent_rows)
                .sum::<usize>();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(storage.stats().await.l2_rows, 3);
        assert_eq!(trimmed, 2);
    }

    #[tokio::test]
    async fn test_invalidate_by_position() {
        let storage = with_sqlite(CacheConfig::default());
        storage.set("a", CachedEntry::new("{}", "sig"), KeyMetadata::new("s1", 1)).await;
        storage.set("b", CachedEntry::new("{}", "sig"), KeyMetadata::new("s2", 2)).await;

        let event = storage.invalidate_by_position(2).await;
        assert_eq!(event.keys, vec!["b".to_string()]);
        assert_eq!(event.persistent_rows, 1);
        assert!(storage.get("a").await.is_some());
        assert!(storage.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let storage = with_sqlite(CacheConfig::default());
        let stale = now_ms() - 30 * HOUR_MS;
        storage.set("old1", CachedEntry::at("{}", "sig", stale), KeyMetadata::default()).await;
        storage.set("old2", CachedEntry::at("{}", "sig", stale), KeyMetadata::default()).await;
        storage.set("fresh", CachedEntry::new("{}", "sig"), KeyMetadata::default()).await;

        let event = storage.cleanup_expired().await;
        assert_eq!(event.keys.len(), 2);
        assert_eq!(storage.l1_len().await, 1);
        assert_eq!(storage.stats().await.l2_rows, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let storage = with_sqlite(CacheConfig::default());
        storage.set("a", CachedEntry::new("{}", "sig"), KeyMetadata::new("s1", 1)).await;
        storage.set("b", CachedEntry::new("{}", "sig"), KeyMetadata::new("s1", 2)).await;

        let event = storage.clear().await;
        assert_eq!(event.keys.len(), 2);
        assert_eq!(event.persistent_rows, 2);
        assert_eq!(storage.l1_len().await, 0);
        assert!(storage.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let storage = with_sqlite(CacheConfig::default());
        storage.set("a", CachedEntry::new("{}", "sig"), KeyMetadata::default()).await;

        let event = storage.remove("a").await;
        assert_eq!(event.reason, InvalidationReason::Manual);
        assert_eq!(event.keys, vec!["a".to_string()]);
        assert_eq!(event.persistent_rows, 1);

        assert_eq!(storage.remove("a").await.removed(), 0);
        assert!(storage.get("a").await.is_none());

        storage.set("b", CachedEntry::new("[]", "sig"), KeyMetadata::default()).await;
        let event = storage.remove_with_reason("b", InvalidationReason::Corrupt).await;
        assert_eq!(event.reason, InvalidationReason::Corrupt);
        assert_eq!(event.keys, vec!["b".to_string()]);
        assert!(!storage.in_memory("b").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_invalidation_racing_hydration_leaves_nothing_behind() {
        let tier = Arc::new(SqliteTier::open_in_memory().unwrap());
        let storage = Arc::new(CacheStorage::with_persistent_tier(
            CacheConfig::default(),
            tier.clone(),
        ));

        for round in 0..50 {
            let key = format!("k{}", round);
            tier.put(&PersistedRow {
                key: key.clone(),
                entry: CachedEntry::new("{}", "sig"),
                meta: KeyMetadata::new("s1", 1),
            })
            .unwrap();

            let reader = {
                let storage = Arc::clone(&storage);
                let key = key.clone();
                tokio::spawn(async move { storage.get(&key).await })
            };
            let invalidator = {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.invalidate_by_scene_id("s1").await })
            };
            reader.await.unwrap();
            invalidator.await.unwrap();

            assert!(!storage.in_memory(&key).await, "round {} left {} in memory", round, key);
            assert!(tier.get(&key).unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_init_respects_disabled_persistence() {
        let storage = memory_only(10);
        assert!(!storage.init().await);
        assert!(!storage.persistence_enabled());
    }
}

//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque storage key (64-character hex digest)
pub type StorageKey = String;

/// Statistics for the two storage tiers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageStats {
    /// Total number of successful reads (either tier)
    pub hits: u64,

    /// Total number of misses (absent, expired or corrupt)
    pub misses: u64,

    /// Reads served by the in-memory tier
    pub l1_hits: u64,

    /// Reads served by the persistent tier
    pub l2_hits: u64,

    /// Entries currently held in memory
    pub l1_entries: usize,

    /// Rows in the persistent tier as of the last refresh
    pub l2_rows: usize,

    /// In-memory entries evicted by the LRU policy
    pub evictions_lru: u64,

    /// Entries dropped because their TTL elapsed
    pub evictions_ttl: u64,

    /// Entries removed by scene/position/key invalidation
    pub invalidations: u64,

    /// Whether the persistent tier is active
    pub persistent: bool,
}

impl StorageStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Approximate number of cached analyses across both tiers
    pub fn size(&self) -> usize {
        self.l1_entries + self.l2_rows
    }
}

impl fmt::Display for StorageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, l1: {}, l2: {}, evictions: {}, tier: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.l1_entries,
            self.l2_rows,
            self.evictions_lru + self.evictions_ttl,
            if self.persistent { "memory+sqlite" } else { "memory-only" }
        )
    }
}

/// Storage tier that satisfied a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheTier {
    /// Bounded in-memory LRU tier
    Memory,

    /// Bounded persistent tier
    Persistent,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTier::Memory => write!(f, "l1"),
            CacheTier::Persistent => write!(f, "l2"),
        }
    }
}

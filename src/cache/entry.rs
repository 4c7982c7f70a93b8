//! Cache entries and the secondary attributes used for invalidation

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A stored analysis result with access bookkeeping.
///
/// Owned by the storage layer; callers only ever see the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntry {
    /// Serialized analysis payload (JSON)
    pub payload: String,

    /// Combined semantic signature, kept for diagnostics
    pub semantic_hash: String,

    /// Creation time (epoch ms)
    pub cached_at: i64,

    /// Last successful read (epoch ms)
    pub last_accessed: i64,

    /// Number of successful reads
    pub hit_count: u64,
}

impl CachedEntry {
    /// Create a fresh entry stamped with the current time
    pub fn new(payload: impl Into<String>, semantic_hash: impl Into<String>) -> Self {
        Self::at(payload, semantic_hash, now_ms())
    }

    /// Create an entry with an explicit creation time
    pub fn at(payload: impl Into<String>, semantic_hash: impl Into<String>, cached_at: i64) -> Self {
        Self {
            payload: payload.into(),
            semantic_hash: semantic_hash.into(),
            cached_at,
            last_accessed: cached_at,
            hit_count: 0,
        }
    }

    /// Whether the entry is older than `ttl_ms` at time `now`
    pub fn is_expired_at(&self, now: i64, ttl_ms: i64) -> bool {
        now.saturating_sub(self.cached_at) > ttl_ms
    }

    /// Mark the entry as read
    pub fn mark_accessed(&mut self, now: i64) {
        self.last_accessed = now;
        self.hit_count += 1;
    }

    /// Age in milliseconds at time `now`
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.cached_at).max(0)
    }
}

/// Secondary attributes indexed alongside a storage key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    pub scene_id: Option<String>,
    pub position: Option<i64>,
}

impl KeyMetadata {
    pub fn new(scene_id: impl Into<String>, position: i64) -> Self {
        Self {
            scene_id: Some(scene_id.into()),
            position: Some(position),
        }
    }

    pub fn matches_scene(&self, scene_id: &str) -> bool {
        self.scene_id.as_deref() == Some(scene_id)
    }

    pub fn matches_position(&self, position: i64) -> bool {
        self.position == Some(position)
    }
}

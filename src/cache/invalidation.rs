//! Invalidation reasons and events
//!
//! The cache never decides on its own when a scene changed; callers invalidate
//! explicitly by scene id or position. TTL expiry, LRU eviction, row-limit
//! trimming and corrupt payloads are the only removals it performs itself, and
//! the storage operation that performs one returns an [`InvalidationEvent`]
//! for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason for removing cache entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry outlived its TTL
    Expired,

    /// Removed by key
    Manual,

    /// Caller reported that a scene changed
    SceneChanged { scene_id: String },

    /// Caller reported that a narrative position changed
    PositionChanged { position: i64 },

    /// Evicted from memory by the LRU policy
    LeastRecentlyUsed,

    /// Trimmed from the persistent tier by the row limit
    Capacity,

    /// Payload could not be deserialized
    Corrupt,

    /// Whole cache cleared
    Cleared,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::SceneChanged { scene_id } => {
                write!(f, "scene changed: {}", scene_id)
            }
            InvalidationReason::PositionChanged { position } => {
                write!(f, "position changed: {}", position)
            }
            InvalidationReason::LeastRecentlyUsed => write!(f, "LRU eviction"),
            InvalidationReason::Capacity => write!(f, "row limit reached"),
            InvalidationReason::Corrupt => write!(f, "corrupt payload"),
            InvalidationReason::Cleared => write!(f, "cache cleared"),
        }
    }
}

/// Record of one invalidation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// In-memory keys that were removed
    pub keys: Vec<String>,

    /// Rows deleted from the persistent tier
    pub persistent_rows: usize,

    /// Additional context
    pub context: Option<String>,
}

impl InvalidationEvent {
    /// Create a new invalidation event
    pub fn new(reason: InvalidationReason, keys: Vec<String>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            keys,
            persistent_rows: 0,
            context: None,
        }
    }

    /// Record how many persistent rows were deleted
    pub fn with_persistent_rows(mut self, rows: usize) -> Self {
        self.persistent_rows = rows;
        self
    }

    /// Add context to the event
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    /// Upper bound on distinct entries removed. An entry held in both tiers
    /// counts twice.
    pub fn removed(&self) -> usize {
        self.keys.len() + self.persistent_rows
    }
}

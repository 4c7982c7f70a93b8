//! Persistent (L2) tier
//!
//! The storage layer talks to the persistent tier through [`PersistentTier`].
//! [`SqliteTier`] is the real file-backed implementation; [`NullTier`] is the
//! stand-in used whenever the database cannot be opened or has failed, so
//! the rest of the cache never special-cases availability.

use crate::cache::entry::{CachedEntry, KeyMetadata};
use crate::error::{CacheError, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Table layout, stable across restarts. All statements are idempotent.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS analysis_cache (
    cache_key      TEXT PRIMARY KEY,
    analysis_data  TEXT NOT NULL,
    semantic_hash  TEXT NOT NULL,
    cached_at      INTEGER NOT NULL,
    last_accessed  INTEGER NOT NULL,
    hit_count      INTEGER DEFAULT 0,
    scene_id       TEXT,
    position       INTEGER
);
CREATE INDEX IF NOT EXISTS idx_analysis_cache_scene_id ON analysis_cache(scene_id);
CREATE INDEX IF NOT EXISTS idx_analysis_cache_position ON analysis_cache(position);
CREATE INDEX IF NOT EXISTS idx_analysis_cache_last_accessed ON analysis_cache(last_accessed);
";

/// One persisted cache row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRow {
    pub key: String,
    pub entry: CachedEntry,
    pub meta: KeyMetadata,
}

/// Predicate for indexed bulk deletes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    SceneId(String),
    Position(i64),
    /// Rows whose `cached_at` is strictly before the given epoch-ms
    CachedBefore(i64),
}

/// Key/value/row store backing the persistent tier
pub trait PersistentTier: Send + Sync {
    /// Backend name used in log lines
    fn name(&self) -> &str;

    /// `false` for the null object
    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Result<Option<PersistedRow>>;

    /// Insert or replace a row
    fn put(&self, row: &PersistedRow) -> Result<()>;

    /// Refresh access bookkeeping for an existing row
    fn touch(&self, key: &str, last_accessed: i64, hit_count: u64) -> Result<()>;

    /// Delete one row; returns whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every row matching `filter`; returns the number deleted
    fn delete_where(&self, filter: &RowFilter) -> Result<usize>;

    /// Keep only the `max_rows` most recently accessed rows
    fn trim_to(&self, max_rows: usize) -> Result<usize>;

    fn count(&self) -> Result<usize>;

    /// Delete all rows; returns the number deleted
    fn clear(&self) -> Result<usize>;
}

/// SQLite-backed persistent tier
pub struct SqliteTier {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteTier {
    /// Open (or create) the database at `path` and run migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(CacheError::PersistenceUnavailable(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        info!("Opening persistent cache tier at {:?}", path);
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database (used by tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersistedRow> {
    let hit_count: Option<i64> = row.get(5)?;
    Ok(PersistedRow {
        key: row.get(0)?,
        entry: CachedEntry {
            payload: row.get(1)?,
            semantic_hash: row.get(2)?,
            cached_at: row.get(3)?,
            last_accessed: row.get(4)?,
            hit_count: hit_count.unwrap_or(0).max(0) as u64,
        },
        meta: KeyMetadata {
            scene_id: row.get(6)?,
            position: row.get(7)?,
        },
    })
}

fn is_corrupt_row(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..)
    )
}

impl PersistentTier for SqliteTier {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<PersistedRow>> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT cache_key, analysis_data, semantic_hash, cached_at, last_accessed,
                        hit_count, scene_id, position
                 FROM analysis_cache WHERE cache_key = ?1",
                params![key],
                read_row,
            )
            .optional();

        match found {
            Ok(row) => Ok(row),
            Err(e) if is_corrupt_row(&e) => {
                warn!("Purging unreadable cache row {}: {}", key, e);
                conn.execute("DELETE FROM analysis_cache WHERE cache_key = ?1", params![key])?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, row: &PersistedRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO analysis_cache
                (cache_key, analysis_data, semantic_hash, cached_at, last_accessed,
                 hit_count, scene_id, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.key,
                row.entry.payload,
                row.entry.semantic_hash,
                row.entry.cached_at,
                row.entry.last_accessed,
                i64::try_from(row.entry.hit_count).unwrap_or(i64::MAX),
                row.meta.scene_id,
                row.meta.position,
            ],
        )?;
        Ok(())
    }

    fn touch(&self, key: &str, last_accessed: i64, hit_count: u64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE analysis_cache SET last_accessed = ?1, hit_count = ?2 WHERE cache_key = ?3",
            params![
                last_accessed,
                i64::try_from(hit_count).unwrap_or(i64::MAX),
                key
            ],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM analysis_cache WHERE cache_key = ?1", params![key])?;
        Ok(changed > 0)
    }

    fn delete_where(&self, filter: &RowFilter) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = match filter {
            RowFilter::SceneId(scene_id) => conn.execute(
                "DELETE FROM analysis_cache WHERE scene_id = ?1",
                params![scene_id],
            )?,
            RowFilter::Position(position) => conn.execute(
                "DELETE FROM analysis_cache WHERE position = ?1",
                params![position],
            )?,
            RowFilter::CachedBefore(cutoff) => conn.execute(
                "DELETE FROM analysis_cache WHERE cached_at < ?1",
                params![cutoff],
            )?,
        };
        debug!("Deleted {} persistent rows matching {:?}", deleted, filter);
        Ok(deleted)
    }

    fn trim_to(&self, max_rows: usize) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM analysis_cache WHERE cache_key IN (
                SELECT cache_key FROM analysis_cache
                ORDER BY last_accessed DESC
                LIMIT -1 OFFSET ?1
             )",
            params![i64::try_from(max_rows).unwrap_or(i64::MAX)],
        )?;
        if deleted > 0 {
            debug!("Trimmed {} persistent rows over the {} row limit", deleted, max_rows);
        }
        Ok(deleted)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM analysis_cache", [], |r| r.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM analysis_cache", [])?)
    }
}

/// Null object used when no persistent tier is available
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTier;

impl PersistentTier for NullTier {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Result<Option<PersistedRow>> {
        Ok(None)
    }

    fn put(&self, _row: &PersistedRow) -> Result<()> {
        Ok(())
    }

    fn touch(&self, _key: &str, _last_accessed: i64, _hit_count: u64) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    fn delete_where(&self, _filter: &RowFilter) -> Result<usize> {
        Ok(0)
    }

    fn trim_to(&self, _max_rows: usize) -> Result<usize> {
        Ok(0)
    }

    fn count(&self) -> Result<usize> {
        Ok(0)
    }

    fn clear(&self) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, scene_id: &str, position: i64, at: i64) -> PersistedRow {
        PersistedRow {
            key: key.to_string(),
            entry: CachedEntry::at(r#"{"issues":[]}"#, "sig", at),
            meta: KeyMetadata::new(scene_id, position),
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let tier = SqliteTier::open_in_memory().unwrap();
        let original = row("k1", "s1", 3, 1_000);
        tier.put(&original).unwrap();

        assert_eq!(tier.get("k1").unwrap(), Some(original));
        assert_eq!(tier.get("missing").unwrap(), None);
        assert_eq!(tier.count().unwrap(), 1);
    }

    #[test]
    fn test_touch_updates_bookkeeping() {
        let tier = SqliteTier::open_in_memory().unwrap();
        tier.put(&row("k1", "s1", 3, 1_000)).unwrap();
        tier.touch("k1", 9_000, 4).unwrap();

        let stored = tier.get("k1").unwrap().unwrap();
        assert_eq!(stored.entry.last_accessed, 9_000);
        assert_eq!(stored.entry.hit_count, 4);
        assert_eq!(stored.entry.cached_at, 1_000);
    }

    #[test]
    fn test_delete_where() {
        let tier = SqliteTier::open_in_memory().unwrap();
        tier.put(&row("a", "s1", 1, 1_000)).unwrap();
        tier.put(&row("b", "s1", 2, 2_000)).unwrap();
        tier.put(&row("c", "s2", 2, 3_000)).unwrap();

        assert_eq!(tier.delete_where(&RowFilter::SceneId("s1".into())).unwrap(), 2);
        assert_eq!(tier.count().unwrap(), 1);

        tier.put(&row("d", "s3", 5, 500)).unwrap();
        assert_eq!(tier.delete_where(&RowFilter::Position(2)).unwrap(), 1);
        assert_eq!(tier.delete_where(&RowFilter::CachedBefore(1_000)).unwrap(), 1);
        assert_eq!(tier.count().unwrap(), 0);
    }

    #[test]
    fn test_trim_keeps_most_recently_accessed() {
        let tier = SqliteTier::open_in_memory().unwrap();
        for i in 0..5 {
            tier.put(&row(&format!("k{}", i), "s", i, 1_000 + i)).unwrap();
        }
        tier.touch("k0", 10_000, 1).unwrap();

        assert_eq!(tier.trim_to(2).unwrap(), 3);
        assert!(tier.get("k0").unwrap().is_some());
        assert!(tier.get("k4").unwrap().is_some());
        assert!(tier.get("k1").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_row_is_purged() {
        let tier = SqliteTier::open_in_memory().unwrap();
        tier.conn
            .lock()
            .execute(
                "INSERT INTO analysis_cache
                    (cache_key, analysis_data, semantic_hash, cached_at, last_accessed)
                 VALUES ('bad', 'x', 'sig', 'not-a-number', 0)",
                [],
            )
            .unwrap();

        assert_eq!(tier.get("bad").unwrap(), None);
        assert_eq!(tier.count().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let tier = SqliteTier::open(&path).unwrap();
            tier.put(&row("k1", "s1", 1, 1_000)).unwrap();
            assert_eq!(tier.path(), Some(path.as_path()));
        }

        let reopened = SqliteTier::open(&path).unwrap();
        assert!(reopened.get("k1").unwrap().is_some());
    }

    #[test]
    fn test_open_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteTier::open(dir.path()).err().unwrap();
        assert!(matches!(err, CacheError::PersistenceUnavailable(_)));
    }

    #[test]
    fn test_null_tier() {
        let tier = NullTier;
        assert!(!tier.is_available());
        tier.put(&row("k1", "s1", 1, 1_000)).unwrap();
        assert_eq!(tier.get("k1").unwrap(), None);
        assert_eq!(tier.count().unwrap(), 0);
    }
}

//! Configuration for the analysis cache

use crate::error::{CacheError, Result};
use crate::semantic::hasher::DEFAULT_CONTEXT_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Directory created under the per-user data directory
pub const APP_DIR_NAME: &str = "continuity-cache";

/// File name of the persistent tier database
pub const DB_FILE_NAME: &str = "analysis_cache.db";

/// Configuration for the two-tier analysis cache
///
/// Defaults:
/// - TTL: 24 hours, checked lazily on read
/// - L1: 200 entries, LRU eviction
/// - L2: 1000 rows, oldest-by-access trimmed after each write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which an entry is treated as expired
    pub ttl: Duration,

    /// Maximum number of entries in the in-memory tier
    pub l1_max_entries: usize,

    /// Maximum number of rows in the persistent tier
    pub l2_max_rows: usize,

    /// Minimum spacing between opportunistic TTL sweeps of the persistent
    /// tier (sweeps only run on writes)
    pub cleanup_interval: Duration,

    /// Whether `init()` attempts to open the persistent tier
    pub enable_persistence: bool,

    /// Explicit database path; `None` resolves to the per-user data directory
    pub db_path: Option<PathBuf>,

    /// Number of preceding scenes included in the context fingerprint
    pub context_window: usize,

    /// Use the built-in lexicon analyzer instead of plain heuristics
    pub linguistic_analysis: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            l1_max_entries: 200,
            l2_max_rows: 1000,
            cleanup_interval: Duration::from_secs(300),
            enable_persistence: true,
            db_path: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
            linguistic_analysis: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// In-memory only configuration (persistent tier never opened)
    pub fn memory_only() -> Self {
        Self {
            enable_persistence: false,
            ..Default::default()
        }
    }

    /// Configuration for memory-constrained environments
    pub fn small() -> Self {
        Self {
            l1_max_entries: 50,
            l2_max_rows: 250,
            ..Default::default()
        }
    }

    /// Load configuration from the environment (and a `.env` file if present)
    ///
    /// Recognized variables:
    /// - `CONTINUITY_CACHE_DB_PATH`
    /// - `CONTINUITY_CACHE_TTL_SECS`
    /// - `CONTINUITY_CACHE_L1_MAX`
    /// - `CONTINUITY_CACHE_L2_MAX_ROWS`
    /// - `CONTINUITY_CACHE_DISABLE_PERSISTENCE`
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    /// Unparsable values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("CONTINUITY_CACHE_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CONTINUITY_CACHE_TTL_SECS") {
            config.ttl = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var(&lookup, "CONTINUITY_CACHE_L1_MAX") {
            config.l1_max_entries = max;
        }
        if let Some(max) = parse_var(&lookup, "CONTINUITY_CACHE_L2_MAX_ROWS") {
            config.l2_max_rows = max;
        }
        if let Some(disabled) = parse_var::<bool, _>(&lookup, "CONTINUITY_CACHE_DISABLE_PERSISTENCE") {
            config.enable_persistence = !disabled;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::Config("ttl must be greater than 0".to_string()));
        }

        if self.l1_max_entries == 0 {
            return Err(CacheError::Config(
                "l1_max_entries must be greater than 0".to_string(),
            ));
        }

        if self.l2_max_rows == 0 {
            return Err(CacheError::Config(
                "l2_max_rows must be greater than 0".to_string(),
            ));
        }

        if self.context_window == 0 {
            return Err(CacheError::Config(
                "context_window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// TTL in epoch milliseconds
    pub fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Database location: explicit path, else the per-user data directory,
    /// else the working directory
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }

        match dirs::data_dir() {
            Some(dir) => dir.join(APP_DIR_NAME).join(DB_FILE_NAME),
            None => std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DB_FILE_NAME),
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    ttl: Option<Duration>,
    l1_max_entries: Option<usize>,
    l2_max_rows: Option<usize>,
    cleanup_interval: Option<Duration>,
    enable_persistence: Option<bool>,
    db_path: Option<PathBuf>,
    context_window: Option<usize>,
    linguistic_analysis: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set entry time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set in-memory tier capacity
    pub fn l1_max_entries(mut self, max: usize) -> Self {
        self.l1_max_entries = Some(max);
        self
    }

    /// Set persistent tier row capacity
    pub fn l2_max_rows(mut self, max: usize) -> Self {
        self.l2_max_rows = Some(max);
        self
    }

    /// Set minimum spacing between persistent-tier TTL sweeps
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Enable or disable the persistent tier
    pub fn enable_persistence(mut self, enable: bool) -> Self {
        self.enable_persistence = Some(enable);
        self
    }

    /// Set an explicit database path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Set the number of preceding scenes in the context fingerprint
    pub fn context_window(mut self, window: usize) -> Self {
        self.context_window = Some(window);
        self
    }

    /// Choose between the lexicon analyzer and plain heuristics
    pub fn linguistic_analysis(mut self, enable: bool) -> Self {
        self.linguistic_analysis = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            ttl: self.ttl.unwrap_or(defaults.ttl),
            l1_max_entries: self.l1_max_entries.unwrap_or(defaults.l1_max_entries),
            l2_max_rows: self.l2_max_rows.unwrap_or(defaults.l2_max_rows),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            enable_persistence: self
                .enable_persistence
                .unwrap_or(defaults.enable_persistence),
            db_path: self.db_path.or(defaults.db_path),
            context_window: self.context_window.unwrap_or(defaults.context_window),
            linguistic_analysis: self
                .linguistic_analysis
                .unwrap_or(defaults.linguistic_analysis),
        }
    }
}

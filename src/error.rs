//! Error types for cache operations
//!
//! Errors are produced by the storage and fingerprinting layers. The public
//! [`AnalysisCache`](crate::cache::AnalysisCache) facade never hands them to
//! its caller: every fault is logged and turned into a miss or a no-op.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Persistent store error (SQLite)
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Payload or key could not be serialized/deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the persistent store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent tier cannot be used in this process
    #[error("Persistent tier unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::Config("l1_max_entries must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: l1_max_entries must be greater than 0"
        );

        let error = CacheError::PersistenceUnavailable("read-only filesystem".to_string());
        assert!(error.to_string().contains("read-only filesystem"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: CacheError = json_err.into();
        assert!(matches!(error, CacheError::Serialization(_)));
    }
}

//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors returned by cache table operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// Key is not present in the table and no data loader is configured
    #[error("Key not found in cache")]
    KeyNotFound,

    /// Key is not present in the table and the data loader declined to produce it
    #[error("Key not found in cache and could not be loaded into cache")]
    KeyNotFoundOrLoadable,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(CacheError::KeyNotFound.to_string(), "Key not found in cache");
        assert_eq!(
            CacheError::KeyNotFoundOrLoadable.to_string(),
            "Key not found in cache and could not be loaded into cache"
        );
    }

    #[test]
    fn test_errors_are_distinct() {
        assert_ne!(CacheError::KeyNotFound, CacheError::KeyNotFoundOrLoadable);
    }
}

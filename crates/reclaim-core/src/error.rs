//! Error types for the index and its cache.

use thiserror::Error;

/// Failures while reading or writing the on-disk index cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying file I/O failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file ended before a complete record was read.
    #[error("cache truncated while reading {what}")]
    Truncated { what: &'static str },

    /// The bytes decode but describe an impossible structure.
    #[error("cache corrupt: {reason}")]
    Corrupt { reason: String },

    /// A stored string is not valid UTF-8.
    #[error("cache contains invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A collection or value does not fit the fixed-width on-disk field.
    #[error("{what} does not fit in the cache format")]
    Overflow { what: &'static str },
}

impl CacheError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

/// Logic errors in the index itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    /// `dependent` lists `dependency` as a forward link but the backlink is missing.
    #[error("backlink missing: {dependent} -> {dependency} has no mirrored backward entry")]
    MissingBacklink { dependent: String, dependency: String },

    /// `dependency` records `dependent` as a backlink that has no forward link.
    #[error("stale backlink: {dependency} <- {dependent} has no mirrored forward entry")]
    StaleBacklink { dependent: String, dependency: String },

    /// A new cycle was requested while one is still running.
    #[error("index build already running ({phase})")]
    Busy { phase: &'static str },
}

//! Error types for extent map operations.

use crate::segment::{Prefix, Segment};
use stratum_be::BeError;
use thiserror::Error;

/// Result type for extent map operations.
pub type Result<T> = std::result::Result<T, EmapError>;

/// Errors that can occur in extent map operations.
#[derive(Debug, Error)]
pub enum EmapError {
    /// No segment of `prefix` covers the offset. `next` is the first segment
    /// of the following map in store order.
    #[error("map {prefix} not found, next map is {}", next.prefix)]
    NotFound {
        /// Prefix that was looked up.
        prefix: Prefix,
        /// First segment of the next map.
        next: Segment,
    },

    /// No map exists at or after `prefix`.
    #[error("no maps at or after {prefix}")]
    NoMoreMaps {
        /// Prefix that was looked up.
        prefix: Prefix,
    },

    /// A stored key or record is malformed.
    #[error("invalid map record: {0}")]
    Invalid(String),

    /// A map does not partition the namespace.
    #[error("map invariant violated: {0}")]
    Invariant(String),

    /// Error from the backing store, propagated unchanged.
    #[error(transparent)]
    Store(#[from] BeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EmapError {
    /// True for the lookup outcomes a map walk expects to see.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoMoreMaps { .. })
    }
}

impl From<serde_json::Error> for EmapError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

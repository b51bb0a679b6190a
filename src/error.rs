use thiserror::Error;
use tracing::error;

use crate::model::ItemKind;
use crate::storage::StorageError;

/// Result alias used throughout the catalog engine.
pub type Result<T> = std::result::Result<T, GroundError>;

/// Errors raised by the version engine and the catalog facade.
#[derive(Debug, Error)]
pub enum GroundError {
    /// No row matched the requested id or source key.
    #[error("{kind} with {key} not found")]
    NotFound {
        /// Entity family that was looked up (e.g. "NodeVersion").
        kind: &'static str,
        /// Rendered lookup key, such as `id 42` or `source key "orders"`.
        key: String,
    },
    /// An item with the same source key already exists for this kind.
    #[error("{kind} with source key \"{source_key}\" already exists")]
    AlreadyExists {
        /// Item kind that was being created.
        kind: ItemKind,
        /// Conflicting source key.
        source_key: String,
    },
    /// Tags do not satisfy the referenced structure version.
    #[error("structure conformance failed: {0}")]
    Conformance(String),
    /// The sentinel id was used as a real id, or an edge would break the DAG.
    #[error("sentinel misuse: {0}")]
    SentinelMisuse(String),
    /// Caller supplied a malformed value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Persistence adapter failure, message preserved.
    #[error(transparent)]
    Backend(#[from] StorageError),
}

impl GroundError {
    pub(crate) fn not_found(kind: &'static str, id: u64) -> Self {
        GroundError::NotFound {
            kind,
            key: format!("id {id}"),
        }
    }

    pub(crate) fn not_found_by_key(kind: &'static str, source_key: &str) -> Self {
        GroundError::NotFound {
            kind,
            key: format!("source key \"{source_key}\""),
        }
    }

    pub(crate) fn sentinel(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(%message, "ground.sentinel_misuse");
        GroundError::SentinelMisuse(message)
    }

    /// Returns `true` when the error is a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GroundError::NotFound { .. })
    }
}

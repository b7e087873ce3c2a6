use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A write collided with a unique key group of the collection.
    #[error("duplicate key in `{collection}`: {message}")]
    Conflict {
        collection: String,
        message: String,
    },
    /// A stored document no longer matches the entity shape.
    #[error("malformed document in `{collection}`")]
    Malformed {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a unique-constraint violation for `collection`.
    pub fn conflict(collection: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Conflict {
            collection: collection.into(),
            message: message.into(),
        }
    }
}

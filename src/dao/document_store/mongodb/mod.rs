mod config;
mod connection;
mod convert;
mod error;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoDocumentStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateKey { collection, source } => {
                StorageError::conflict(collection, source.to_string())
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

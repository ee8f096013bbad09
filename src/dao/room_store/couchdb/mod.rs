mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchRoomStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::InvalidDocId { doc_id } => {
                StorageError::corrupted(doc_id, "document id is not a room code")
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

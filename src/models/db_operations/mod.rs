use redb::{CommitError, DatabaseError, StorageError, TableError, TransactionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, StorageBackend};

pub mod json_file_storage;
pub mod redb_storage;

pub use json_file_storage::JsonFileStorage;
pub use redb_storage::RedbStorage;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Redb database error: {0}")]
    RedbDatabase(#[from] DatabaseError),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Storage not initialised: {0}")]
    NotInitialised(String),
}

/// The "last updated" marker: when the document was written and by which
/// store. Two stores writing in the same millisecond leave different markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMarker {
    pub version: i64,
    pub writer: String,
}

/// Durable home of the content document.
///
/// The whole collection is one blob; `write` replaces it together with the
/// marker. The marker lives beside the document so other processes can
/// notice a write without reading the document.
pub trait ContentStorage: Send + Sync {
    /// The current document, or `None` when nothing was ever written.
    fn read(&self) -> Result<Option<String>, DbError>;

    fn write(&self, document: &str, marker: &ChangeMarker) -> Result<(), DbError>;

    fn last_updated(&self) -> Result<Option<ChangeMarker>, DbError>;

    /// Short human-readable location, used in log lines.
    fn describe(&self) -> String;
}

/// Opens the backend selected in the configuration. The storage must have
/// been created with `newsroom_cli db setup` first.
pub fn open_storage(config: &Config) -> Result<Box<dyn ContentStorage>, DbError> {
    match config.storage_backend {
        StorageBackend::Redb => {
            let path = config.content_db_path();
            if !path.exists() {
                return Err(DbError::NotInitialised(path.display().to_string()));
            }
            Ok(Box::new(RedbStorage::open(&path)?))
        }
        StorageBackend::Json => Ok(Box::new(JsonFileStorage::new(config.content_json_path()))),
    }
}

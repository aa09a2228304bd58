use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{Config, StorageBackend};
use crate::models::db_operations::{ChangeMarker, ContentStorage, DbError, JsonFileStorage, RedbStorage};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Storage error: {0}")]
    Db(#[from] DbError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum SetupOutcome {
    Created(PathBuf),
    AlreadyExists(PathBuf),
}

/// Creates the configured content storage with an empty collection, plus the
/// uploads directory. Existing storage is left untouched.
pub fn setup_content_storage(config: &Config) -> Result<SetupOutcome, SetupError> {
    println!("- Ensuring uploads directory '{}'...", config.uploads_path);
    fs::create_dir_all(&config.uploads_path)?;

    match config.storage_backend {
        StorageBackend::Redb => {
            let db_path = config.content_db_path();
            if db_path.exists() {
                return Ok(SetupOutcome::AlreadyExists(db_path));
            }
            if let Some(parent_dir) = db_path.parent() {
                fs::create_dir_all(parent_dir)?;
            }
            println!("- Creating 'documents', 'markers' and 'marker_writers' tables in Redb...");
            let storage = RedbStorage::create(&db_path)?;
            seed_empty_collection(&storage)?;
            Ok(SetupOutcome::Created(db_path))
        }
        StorageBackend::Json => {
            let json_path = config.content_json_path();
            if json_path.exists() {
                return Ok(SetupOutcome::AlreadyExists(json_path));
            }
            println!("- Writing empty content document...");
            let storage = JsonFileStorage::new(&json_path);
            seed_empty_collection(&storage)?;
            Ok(SetupOutcome::Created(json_path))
        }
    }
}

fn seed_empty_collection(storage: &dyn ContentStorage) -> Result<(), DbError> {
    storage.write("[]", &ChangeMarker::default())
}

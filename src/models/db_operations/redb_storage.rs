use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::path::Path;

use super::{ChangeMarker, ContentStorage, DbError};

// --- Tables ---
pub const DOCUMENTS: TableDefinition<&str, &str> = TableDefinition::new("documents");
pub const MARKERS: TableDefinition<&str, i64> = TableDefinition::new("markers");
pub const MARKER_WRITERS: TableDefinition<&str, &str> = TableDefinition::new("marker_writers");

pub const CONTENT_DOCUMENT_KEY: &str = "content_items";
pub const LAST_UPDATED_KEY: &str = "last_updated";

/// Keeps the content document and its change marker in a redb file.
/// Document and marker commit in one write transaction, so readers see
/// either the old pair or the new one.
pub struct RedbStorage {
    db: Database,
    location: String,
}

impl RedbStorage {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let db = Database::open(path)?;
        Ok(Self {
            db,
            location: path.display().to_string(),
        })
    }

    /// Creates the file and both tables. Used by setup and tests.
    pub fn create(path: &Path) -> Result<Self, DbError> {
        let db = Database::create(path)?;
        create_tables(&db)?;
        Ok(Self {
            db,
            location: path.display().to_string(),
        })
    }
}

pub fn create_tables(db: &Database) -> Result<(), DbError> {
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(DOCUMENTS)?;
        write_txn.open_table(MARKERS)?;
        write_txn.open_table(MARKER_WRITERS)?;
    }
    write_txn.commit()?;
    Ok(())
}

impl ContentStorage for RedbStorage {
    fn read(&self) -> Result<Option<String>, DbError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(DOCUMENTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document = table
            .get(CONTENT_DOCUMENT_KEY)?
            .map(|guard| guard.value().to_string());
        Ok(document)
    }

    fn write(&self, document: &str, marker: &ChangeMarker) -> Result<(), DbError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            documents.insert(CONTENT_DOCUMENT_KEY, document)?;
            let mut markers = write_txn.open_table(MARKERS)?;
            markers.insert(LAST_UPDATED_KEY, marker.version)?;
            let mut writers = write_txn.open_table(MARKER_WRITERS)?;
            writers.insert(LAST_UPDATED_KEY, marker.writer.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn last_updated(&self) -> Result<Option<ChangeMarker>, DbError> {
        let read_txn = self.db.begin_read()?;
        let markers = match read_txn.open_table(MARKERS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(version) = markers.get(LAST_UPDATED_KEY)?.map(|guard| guard.value()) else {
            return Ok(None);
        };
        let writer = match read_txn.open_table(MARKER_WRITERS) {
            Ok(table) => table
                .get(LAST_UPDATED_KEY)?
                .map(|guard| guard.value().to_string())
                .unwrap_or_default(),
            Err(TableError::TableDoesNotExist(_)) => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(ChangeMarker { version, writer }))
    }

    fn describe(&self) -> String {
        format!("redb:{}", self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_database_has_no_document_or_marker() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::create(&dir.path().join("content.db")).unwrap();

        assert_eq!(storage.read().unwrap(), None);
        assert_eq!(storage.last_updated().unwrap(), None);
    }

    fn marker(version: i64, writer: &str) -> ChangeMarker {
        ChangeMarker {
            version,
            writer: writer.to_string(),
        }
    }

    #[test]
    fn write_replaces_the_whole_document() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::create(&dir.path().join("content.db")).unwrap();

        storage.write("[1]", &marker(41, "a")).unwrap();
        storage.write("[2,3]", &marker(42, "b")).unwrap();

        assert_eq!(storage.read().unwrap().as_deref(), Some("[2,3]"));
        assert_eq!(storage.last_updated().unwrap(), Some(marker(42, "b")));
    }

    #[test]
    fn document_and_marker_commit_in_one_transaction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content.db");
        let storage = RedbStorage::create(&path).unwrap();
        storage.write("[\"x\"]", &marker(7, "writer-1")).unwrap();
        drop(storage);

        let db = Database::open(&path).unwrap();
        let read_txn = db.begin_read().unwrap();
        let document = read_txn.open_table(DOCUMENTS).unwrap();
        let markers = read_txn.open_table(MARKERS).unwrap();
        let writers = read_txn.open_table(MARKER_WRITERS).unwrap();
        assert_eq!(document.get(CONTENT_DOCUMENT_KEY).unwrap().unwrap().value(), "[\"x\"]");
        assert_eq!(markers.get(LAST_UPDATED_KEY).unwrap().unwrap().value(), 7);
        assert_eq!(writers.get(LAST_UPDATED_KEY).unwrap().unwrap().value(), "writer-1");
    }

    #[test]
    fn marker_without_writer_table_reads_with_blank_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content.db");
        {
            let db = Database::create(&path).unwrap();
            let write_txn = db.begin_write().unwrap();
            write_txn.open_table(MARKERS).unwrap().insert(LAST_UPDATED_KEY, 5).unwrap();
            write_txn.commit().unwrap();
        }
        let storage = RedbStorage::open(&path).unwrap();
        assert_eq!(storage.last_updated().unwrap(), Some(marker(5, "")));
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content.db");
        {
            let storage = RedbStorage::create(&path).unwrap();
            storage.write("[]", &ChangeMarker::default()).unwrap();
        }
        let storage = RedbStorage::open(&path).unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some("[]"));
    }
}

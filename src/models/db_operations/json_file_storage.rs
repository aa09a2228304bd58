use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{ChangeMarker, ContentStorage, DbError};

/// Plain JSON document on disk, for deployments where several processes on
/// the same machine share the content. The marker is a sibling JSON file,
/// written after the document.
pub struct JsonFileStorage {
    document_path: PathBuf,
    marker_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(document_path: impl Into<PathBuf>) -> Self {
        let document_path = document_path.into();
        let marker_path = document_path.with_extension("updated");
        Self {
            document_path,
            marker_path,
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }
}

/// Writes to a temporary sibling and renames it into place, so a concurrent
/// reader never sees a half-written file.
fn replace_file(path: &Path, contents: &str) -> Result<(), DbError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>, DbError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl ContentStorage for JsonFileStorage {
    fn read(&self) -> Result<Option<String>, DbError> {
        read_optional(&self.document_path)
    }

    fn write(&self, document: &str, marker: &ChangeMarker) -> Result<(), DbError> {
        replace_file(&self.document_path, document)?;
        let marker_json = serde_json::to_string(marker)?;
        if let Err(e) = replace_file(&self.marker_path, &marker_json) {
            // The document is saved; only other processes miss the change.
            log::error!(
                "Content saved to {} but the change marker could not be written: {}",
                self.document_path.display(),
                e
            );
        }
        Ok(())
    }

    fn last_updated(&self) -> Result<Option<ChangeMarker>, DbError> {
        // An unparsable marker counts as "no marker"; the next write fixes it.
        Ok(read_optional(&self.marker_path)?.and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    fn describe(&self) -> String {
        format!("json:{}", self.document_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_absent() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("content.json"));

        assert_eq!(storage.read().unwrap(), None);
        assert_eq!(storage.last_updated().unwrap(), None);
    }

    #[test]
    fn write_creates_parent_directories_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("content").join("content.json");
        let storage = JsonFileStorage::new(&path);

        let marker = ChangeMarker {
            version: 7,
            writer: "w".to_string(),
        };
        storage.write("[]", &marker).unwrap();

        assert_eq!(storage.read().unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.last_updated().unwrap(), Some(marker));
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn garbage_marker_is_ignored() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("content.json"));
        fs::write(dir.path().join("content.updated"), "not a number").unwrap();

        assert_eq!(storage.last_updated().unwrap(), None);
    }
}

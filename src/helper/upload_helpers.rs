use actix_multipart::Multipart;
use actix_web::{error::BlockingError, web};
use futures_util::StreamExt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

/// Public URL prefix the upload directory is served under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file provided.")]
    NoFile,
    #[error("Unsupported file type: '{0}'. Upload a JPEG, PNG, GIF or WebP image.")]
    UnsupportedType(String),
    #[error("File is too large. Maximum size is {max_mb}MB.")]
    TooLarge { max_mb: u64 },
    #[error("Malformed upload: {0}")]
    Malformed(String),
    #[error("Failed to save the file: {0}")]
    Write(#[from] io::Error),
}

impl UploadError {
    /// Everything except a failed write is the client's fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Write(_))
    }
}

impl From<BlockingError> for UploadError {
    fn from(e: BlockingError) -> Self {
        Self::Write(io::Error::other(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: u64,
}

impl UploadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dir: PathBuf::from(&config.uploads_path),
            max_bytes: config.max_upload_bytes(),
        }
    }

    fn max_mb(&self) -> u64 {
        self.max_bytes.div_ceil(1024 * 1024)
    }
}

/// Maps an accepted image MIME type to the extension the file is saved with.
/// `image/jpg` is a common misspelling of `image/jpeg` and accepted.
pub fn extension_for(content_type: &str) -> Result<&'static str, UploadError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        _ => Err(UploadError::UnsupportedType(content_type.to_string())),
    }
}

/// A file being written under a fresh UUID name. Unless [`finish`] succeeds
/// the partial file is removed when the sink is dropped.
///
/// [`finish`]: UploadSink::finish
pub struct UploadSink {
    file: fs::File,
    path: PathBuf,
    file_name: String,
    written: u64,
    max_bytes: u64,
    max_mb: u64,
    kept: bool,
}

impl UploadSink {
    pub fn create(settings: &UploadSettings, extension: &str) -> Result<Self, UploadError> {
        fs::create_dir_all(&settings.dir)?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = settings.dir.join(&file_name);
        let file = fs::File::create(&path)?;
        Ok(Self {
            file,
            path,
            file_name,
            written: 0,
            max_bytes: settings.max_bytes,
            max_mb: settings.max_mb(),
            kept: false,
        })
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.written += chunk.len() as u64;
        if self.written > self.max_bytes {
            return Err(UploadError::TooLarge { max_mb: self.max_mb });
        }
        self.file.write_all(chunk)?;
        Ok(())
    }

    /// Flushes the file and returns its public URL. An empty upload counts
    /// as no file.
    pub fn finish(mut self) -> Result<String, UploadError> {
        if self.written == 0 {
            return Err(UploadError::NoFile);
        }
        self.file.flush()?;
        self.kept = true;
        Ok(format!("{}/{}", UPLOADS_URL_PREFIX, self.file_name))
    }
}

impl Drop for UploadSink {
    fn drop(&mut self) {
        if !self.kept {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Could not remove partial upload {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Reads the multipart `file` field and stores it in the upload directory.
/// Other fields are ignored. Returns the relative URL of the saved image.
pub async fn save_image_upload(settings: &UploadSettings, mut payload: Multipart) -> Result<String, UploadError> {
    let mut saved: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| UploadError::Malformed(e.to_string()))?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();

        if field_name != "file" || saved.is_some() {
            // Drain fields we don't use so the stream can advance.
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| UploadError::Malformed(e.to_string()))?;
            }
            continue;
        }

        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        let extension = extension_for(&content_type)?;

        let mut sink = web::block({
            let settings = settings.clone();
            move || UploadSink::create(&settings, extension)
        })
        .await??;

        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| UploadError::Malformed(e.to_string()))?;
            sink = web::block(move || sink.push(&data).map(|_| sink)).await??;
        }

        let url = web::block(move || sink.finish()).await??;
        log::info!("Saved uploaded image {} ({}).", url, content_type);
        saved = Some(url);
    }

    saved.ok_or(UploadError::NoFile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(dir: &std::path::Path, max_bytes: u64) -> UploadSettings {
        UploadSettings {
            dir: dir.join("uploads"),
            max_bytes,
        }
    }

    #[test]
    fn allowed_types_map_to_extensions() {
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpg");
        assert_eq!(extension_for("image/jpg").unwrap(), "jpg");
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert_eq!(extension_for("image/gif").unwrap(), "gif");
        assert_eq!(extension_for("IMAGE/WEBP").unwrap(), "webp");
    }

    #[test]
    fn other_types_are_rejected() {
        for rejected in ["image/svg+xml", "application/pdf", "text/html", ""] {
            assert!(matches!(extension_for(rejected), Err(UploadError::UnsupportedType(_))));
        }
    }

    #[test]
    fn finished_upload_is_kept_under_a_uuid_name() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path(), 1024);
        let mut sink = UploadSink::create(&settings, "png").unwrap();
        sink.push(b"\x89PNG fake").unwrap();
        let url = sink.finish().unwrap();

        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));
        let name = url.trim_start_matches("/uploads/");
        assert!(Uuid::parse_str(name.trim_end_matches(".png")).is_ok());
        assert_eq!(fs::read(settings.dir.join(name)).unwrap(), b"\x89PNG fake");
    }

    #[test]
    fn oversized_upload_is_rejected_and_removed() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path(), 8);
        let mut sink = UploadSink::create(&settings, "gif").unwrap();
        sink.push(b"12345").unwrap();
        let result = sink.push(b"6789");
        assert!(matches!(result, Err(UploadError::TooLarge { max_mb: 1 })));
        drop(sink);

        assert_eq!(fs::read_dir(&settings.dir).unwrap().count(), 0);
    }

    #[test]
    fn empty_upload_counts_as_no_file() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path(), 1024);
        let sink = UploadSink::create(&settings, "jpg").unwrap();
        assert!(matches!(sink.finish(), Err(UploadError::NoFile)));
        assert_eq!(fs::read_dir(&settings.dir).unwrap().count(), 0);
    }

    #[test]
    fn only_write_failures_are_server_errors() {
        assert!(UploadError::NoFile.is_client_error());
        assert!(UploadError::TooLarge { max_mb: 5 }.is_client_error());
        assert!(!UploadError::Write(io::Error::other("disk full")).is_client_error());
    }
}

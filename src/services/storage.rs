//! Package image storage
//!
//! Files live under the configured upload directory as
//! `packages/<uuid>.<ext>` and are served back under the public prefix
//! (`/uploads/packages/<uuid>.<ext>`).

use crate::config::UploadConfig;
use anyhow::Context;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Folder inside the upload directory for package images
const PACKAGE_FOLDER: &str = "packages";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid file type: {0}")]
    InvalidType(String),

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    Empty,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A file written to storage
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredFile {
    pub url: String,
    /// Path relative to the upload directory
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

pub struct Storage {
    config: UploadConfig,
}

impl Storage {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Validate and store an uploaded package image
    pub async fn save(&self, content_type: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let content_type = content_type.trim().to_ascii_lowercase();
        if !self.config.is_type_allowed(&content_type) {
            return Err(StorageError::InvalidType(content_type));
        }
        if data.is_empty() {
            return Err(StorageError::Empty);
        }
        let size = data.len() as u64;
        if size > self.config.max_file_size {
            return Err(StorageError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }

        let dir = self.config.path.join(PACKAGE_FOLDER);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

        let filename = format!(
            "{}/{}.{}",
            PACKAGE_FOLDER,
            Uuid::new_v4(),
            self.config.extension_for(&content_type)
        );
        let path = self.config.path.join(&filename);
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!(file = %filename, size, "Stored upload");
        Ok(StoredFile {
            url: self.public_url(&filename),
            filename,
            size,
            content_type,
        })
    }

    pub fn public_url(&self, relative: &str) -> String {
        format!("{}/{}", self.config.public_prefix.trim_end_matches('/'), relative)
    }

    /// Map a public URL back to a path under the upload directory. URLs
    /// outside the prefix, or trying to escape it, give `None`.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let prefix = format!("{}/", self.config.public_prefix.trim_end_matches('/'));
        let path_part = match url.find("://") {
            Some(scheme_end) => {
                let after_scheme = &url[scheme_end + 3..];
                &after_scheme[after_scheme.find('/')?..]
            }
            None => url,
        };
        let relative = path_part.strip_prefix(&prefix)?;
        let relative = relative.split(['?', '#']).next().unwrap_or_default();

        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return None;
        }
        Some(self.config.path.join(relative))
    }

    /// Remove a previously stored file. Returns whether a file was deleted;
    /// foreign URLs and missing files are ignored.
    pub async fn delete_by_url(&self, url: &str) -> anyhow::Result<bool> {
        let Some(path) = self.path_for_url(url) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    /// Best-effort removal of several files; failures are logged
    pub async fn delete_all(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.delete_by_url(url).await {
                tracing::warn!(url = %url, error = %e, "Failed to delete stored file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> Storage {
        Storage::new(UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 16,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let stored = storage.save("image/png", b"\x89PNG....").await.unwrap();
        assert!(stored.filename.starts_with("packages/"));
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.url, format!("/uploads/{}", stored.filename));
        assert_eq!(stored.size, 8);
        assert!(dir.path().join(&stored.filename).exists());

        assert!(storage.delete_by_url(&stored.url).await.unwrap());
        assert!(!dir.path().join(&stored.filename).exists());
        assert!(!storage.delete_by_url(&stored.url).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_invalid_uploads() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert!(matches!(
            storage.save("application/pdf", b"%PDF").await,
            Err(StorageError::InvalidType(_))
        ));
        assert!(matches!(
            storage.save("image/jpeg", &[0u8; 17]).await,
            Err(StorageError::TooLarge { size: 17, max: 16 })
        ));
        assert!(matches!(storage.save("image/jpeg", b"").await, Err(StorageError::Empty)));
    }

    #[tokio::test]
    async fn test_foreign_urls_are_ignored() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert!(!storage
            .delete_by_url("https://cdn.example.com/img/cancun.jpg")
            .await
            .unwrap());
        assert!(storage.path_for_url("/uploads/../secret.txt").is_none());
        assert!(storage.path_for_url("/uploads/").is_none());
    }

    #[test]
    fn test_path_for_absolute_url() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let path = storage
            .path_for_url("http://localhost:8080/uploads/packages/a.jpg?v=2")
            .unwrap();
        assert_eq!(path, dir.path().join("packages/a.jpg"));
    }
}

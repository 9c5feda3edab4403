//! Read side over the storage root: listing, retrieval and on-demand hashing.

use crate::config::StorageConfig;
use crate::models::CatalogEntry;
use crate::services::error::{Result, StorageError};
use crate::utils::hash::hash_file;
use crate::utils::naming::sanitize_name;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::File;

/// An opened stored file ready to be streamed back.
pub struct RetrievedFile {
    pub name: String,
    pub size_bytes: u64,
    pub file: File,
}

pub struct CatalogService {
    config: StorageConfig,
}

impl CatalogService {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Regular files directly inside the storage root, sorted by name, with
    /// sizes read at call time.
    pub async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.config.upload_dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            // file_type() does not follow symlinks
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Removed between read_dir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            entries.push(CatalogEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: metadata.len(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Opens the stored file addressed by `token`.
    pub async fn retrieve(&self, token: &str) -> Result<RetrievedFile> {
        let (name, path) = self.resolve(token).await?;
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(name)),
            Err(e) => return Err(e.into()),
        };
        let size_bytes = file.metadata().await?.len();
        Ok(RetrievedFile {
            name,
            size_bytes,
            file,
        })
    }

    /// SHA-256 of the stored file addressed by `token`, recomputed on every call.
    pub async fn hash_of(&self, token: &str) -> Result<(String, String)> {
        let (name, path) = self.resolve(token).await?;
        match hash_file(&path, self.config.chunk_size()).await {
            Ok(hash) => Ok((name, hash)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Maps a caller token to a regular file directly under the storage root.
    async fn resolve(&self, token: &str) -> Result<(String, PathBuf)> {
        let name = sanitize_name(token).ok_or_else(|| StorageError::NotFound(token.to_string()))?;
        let path = self.config.upload_dir.join(&name);

        match tokio::fs::symlink_metadata(&path).await {
            Ok(m) if m.is_file() => Ok((name, path)),
            Ok(_) => Err(StorageError::NotFound(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }
}

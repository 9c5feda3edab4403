use crate::models::{CatalogEntry, StoredFile};
use crate::utils::format::human_size;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct UploadResponse {
    /// Name the file was stored under
    pub filename: String,
    pub bytes: u64,
    pub size_human: String,
    pub sha256: String,
}

impl From<StoredFile> for UploadResponse {
    fn from(stored: StoredFile) -> Self {
        Self {
            size_human: human_size(stored.size_bytes),
            filename: stored.name,
            bytes: stored.size_bytes,
            sha256: stored.content_hash,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct FileEntry {
    pub name: String,
    pub bytes: u64,
    pub size_human: String,
}

impl From<CatalogEntry> for FileEntry {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            size_human: human_size(entry.size_bytes),
            name: entry.name,
            bytes: entry.size_bytes,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ListResponse {
    pub files: Vec<FileEntry>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HashResponse {
    pub name: String,
    pub sha256: String,
}

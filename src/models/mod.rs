use serde::Serialize;

/// A file committed to the storage root by a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size_bytes: u64,
    /// Lower-case hex SHA-256 of the committed bytes
    pub content_hash: String,
}

/// One regular file found directly inside the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub size_bytes: u64,
}

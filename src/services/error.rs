use thiserror::Error;

/// Failures of the ingestion pipeline and the catalog.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Declared or measured size exceeds the configured ceiling.
    #[error("File exceeds the maximum allowed size of {limit} bytes")]
    TooLarge { limit: u64 },

    /// The storage volume cannot keep its safety margin.
    #[error("Insufficient storage space: {available} bytes available, {required} bytes required")]
    InsufficientSpace { available: u64, required: u64 },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

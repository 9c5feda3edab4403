use std::env;
use std::path::PathBuf;

/// Smallest chunk the pipeline will read or hash with, whatever `CHUNK_SIZE` says.
pub const MIN_CHUNK_SIZE: usize = 64 * 1024;

/// Storage configuration for the upload pipeline and catalog
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding every stored file (default: "uploads")
    pub upload_dir: PathBuf,

    /// Maximum file size in bytes, 0 disables the ceiling (default: 5 GB)
    pub max_file_size: u64,

    /// Chunk size for streaming writes and hashing in bytes (default: 1 MB)
    pub chunk_size: usize,

    /// Bytes that must always stay free on the storage volume (default: 0)
    pub safety_margin: u64,

    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_file_size: 5 * 1024 * 1024 * 1024, // 5 GB
            chunk_size: 1024 * 1024,               // 1 MB
            safety_margin: 0,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
            ],
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.max_file_size),

            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.chunk_size),

            safety_margin: env::var("SAFETY_MARGIN")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.safety_margin),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Config rooted at `upload_dir` with the given ceiling, used by tests and tooling.
    pub fn with_root(upload_dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_file_size,
            ..Self::default()
        }
    }

    /// Effective chunk size, never below [`MIN_CHUNK_SIZE`].
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(MIN_CHUNK_SIZE)
    }

    /// The configured ceiling, or `None` when uploads are unlimited.
    pub fn size_limit(&self) -> Option<u64> {
        (self.max_file_size > 0).then_some(self.max_file_size)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| o.trim_end_matches('/').to_string())
        .collect()
}

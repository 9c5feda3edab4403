pub mod download;
pub mod hash;
pub mod list;
pub mod types;
pub mod upload;

// Re-export all types
pub use types::*;

// Re-export all handlers
pub use download::download_file;
pub use hash::file_hash;
pub use list::list_files;
pub use upload::{upload_file, upload_raw};

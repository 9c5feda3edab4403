pub mod catalog;
pub mod error;
pub mod ingest;
pub mod space;

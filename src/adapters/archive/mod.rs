//! Scrape batch archival.
//!
//! - `encode_batch` - Raw dictionaries to Parquet bytes
//! - `ArchivalUploader` - Encodes and uploads through the `ObjectStorage` port

mod parquet_encoder;
mod uploader;

pub use parquet_encoder::{encode_batch, PARQUET_CONTENT_TYPE};
pub use uploader::{ArchivalUploader, ArchiveFailurePolicy, ArchiveOutcome};

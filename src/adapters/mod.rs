//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `postgres` - Workout store on PostgreSQL
//! - `memory` - In-process store and bucket for tests and development
//! - `s3` - Archive bucket on S3-compatible storage
//! - `archive` - Parquet encoding and the archival uploader
//! - `graphql` - Schema, resolver adaptation and request lifecycle
//! - `http` - Axum routes serving the schema

pub mod archive;
pub mod graphql;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod s3;

pub use archive::{ArchivalUploader, ArchiveFailurePolicy, ArchiveOutcome};
pub use memory::{InMemoryObjectStorage, InMemoryWorkoutStore};
pub use postgres::PostgresWorkoutStore;
pub use s3::S3ObjectStorage;

//! S3 adapters - Remote object storage.

mod object_storage;

pub use object_storage::S3ObjectStorage;

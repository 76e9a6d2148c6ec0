//! In-memory adapters for tests and local development.
//!
//! - `InMemoryWorkoutStore` - Observation log held in process memory
//! - `InMemoryObjectStorage` - Bucket held in process memory

mod object_storage;
mod workout_store;

pub use object_storage::{InMemoryObjectStorage, StoredObject};
pub use workout_store::InMemoryWorkoutStore;

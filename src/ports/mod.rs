//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `WorkoutStore` / `WorkoutSession` - Observation log persistence
//! - `ObjectStorage` - Remote blob storage for scrape archives

mod object_storage;
mod workout_store;

pub use object_storage::{ArchivalUploadError, ObjectStorage};
pub use workout_store::{WorkoutSession, WorkoutStore};

//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresWorkoutStore` - The `workout` observation table

mod workout_store;

pub use workout_store::{PostgresWorkoutSession, PostgresWorkoutStore};

//! Workout store port.
//!
//! Defines the contract for the observation log's persistence.
//! The store hands out exclusive sessions; each inbound request owns
//! exactly one session for its whole lifetime.
//!
//! # Design
//!
//! - **Append-only**: sessions insert and read, never update or delete
//! - **Session-scoped**: dropping a session releases its underlying handle
//!   (a pooled connection for PostgreSQL)

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, WorkoutId};
use crate::domain::workout::{NewWorkout, Workout, WorkoutFilter};

/// Port for the workout observation table.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Create the backing table if it does not exist yet.
    ///
    /// Must be idempotent; called once at process start.
    async fn ensure_schema(&self) -> Result<(), DomainError>;

    /// Acquire a fresh exclusive session.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` if no handle could be acquired
    async fn open_session(&self) -> Result<Box<dyn WorkoutSession>, DomainError>;
}

/// An exclusive handle to the store, held by one request.
///
/// Implementations release their handle on drop, so every exit path of
/// the owning request gives the handle back.
#[async_trait]
pub trait WorkoutSession: Send {
    /// Append one observation; returns it with its storage id.
    async fn insert(&mut self, workout: &NewWorkout) -> Result<Workout, DomainError>;

    /// Find an observation by storage id.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(&mut self, id: WorkoutId) -> Result<Option<Workout>, DomainError>;

    /// List observations, newest `observed_at` first (ties broken by
    /// descending storage id).
    async fn list(&mut self, filter: &WorkoutFilter) -> Result<Vec<Workout>, DomainError>;
}

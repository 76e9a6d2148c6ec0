//! In-Memory Workout Store Adapter
//!
//! Keeps the observation log in a vector behind a lock.
//! Useful for testing and development. Tracks how many sessions are
//! currently checked out so tests can assert that every request gives its
//! session back.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, WorkoutId};
use crate::domain::workout::{NewWorkout, Workout, WorkoutFilter};
use crate::ports::{WorkoutSession, WorkoutStore};

#[derive(Debug, Default)]
struct Shared {
    rows: RwLock<Vec<Workout>>,
    next_id: AtomicI32,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
}

/// In-memory storage for workout observations
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkoutStore {
    shared: Arc<Shared>,
}

impl InMemoryWorkoutStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently checked out
    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of sessions ever opened
    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of stored observations
    pub async fn len(&self) -> usize {
        self.shared.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl WorkoutStore for InMemoryWorkoutStore {
    async fn ensure_schema(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn WorkoutSession>, DomainError> {
        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.shared.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryWorkoutSession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct InMemoryWorkoutSession {
    shared: Arc<Shared>,
}

impl Drop for InMemoryWorkoutSession {
    fn drop(&mut self) {
        self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkoutSession for InMemoryWorkoutSession {
    async fn insert(&mut self, workout: &NewWorkout) -> Result<Workout, DomainError> {
        let id = WorkoutId::new(self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Workout::persisted(id, workout.clone());
        self.shared.rows.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&mut self, id: WorkoutId) -> Result<Option<Workout>, DomainError> {
        let rows = self.shared.rows.read().await;
        Ok(rows.iter().find(|w| w.id() == id).cloned())
    }

    async fn list(&mut self, filter: &WorkoutFilter) -> Result<Vec<Workout>, DomainError> {
        let rows = self.shared.rows.read().await;
        let mut matching: Vec<Workout> = rows.iter().filter(|w| filter.matches(w)).cloned().collect();
        matching.sort_by(|a, b| {
            b.observed_at()
                .cmp(a.observed_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        if let Some(limit) = filter.limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }
}

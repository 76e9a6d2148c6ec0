//! Request Context - the per-request scoped store session.
//!
//! A context is opened when an inbound API request begins and closed when
//! it finishes. It owns one exclusive [`WorkoutSession`]:
//!
//! ```text
//! request begins ──► Open (session acquired)
//!                      │  insert / find_by_id / list
//!                      ▼
//! request ends   ──► Closed (session released, further ops rejected)
//! ```
//!
//! Closing is idempotent. Dropping an open context (for example when the
//! request future is cancelled) releases the session as well, so the store
//! handle is given back on every exit path.

use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, RequestId, Timestamp, WorkoutId};
use crate::domain::workout::{NewWorkout, Workout, WorkoutFilter};
use crate::ports::{WorkoutSession, WorkoutStore};

/// Metadata about the inbound request a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestInfo {
    pub request_id: RequestId,
    pub started_at: Timestamp,
}

impl RequestInfo {
    /// Metadata for a request starting now.
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            started_at: Timestamp::now(),
        }
    }
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state of a [`RequestContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Open,
    Closed,
}

/// Errors from store operations routed through a context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context was already closed when the operation was attempted.
    #[error("Request context {0} is closed")]
    Closed(RequestId),

    #[error(transparent)]
    Store(#[from] DomainError),
}

impl From<ContextError> for DomainError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Closed(request_id) => DomainError::new(
                ErrorCode::ContextClosed,
                format!("Request context {} is closed", request_id),
            )
            .with_detail("request_id", request_id.to_string()),
            ContextError::Store(inner) => inner,
        }
    }
}

/// Per-request handle to the workout store.
///
/// Exactly one exists per inbound request. Operations are serialized on
/// the owned session.
pub struct RequestContext {
    info: RequestInfo,
    session: Mutex<Option<Box<dyn WorkoutSession>>>,
}

impl RequestContext {
    /// Opens a context for a request starting now.
    ///
    /// # Errors
    ///
    /// Returns the store's error if no session could be acquired.
    pub async fn open(store: &dyn WorkoutStore) -> Result<Self, DomainError> {
        Self::open_with(store, RequestInfo::new()).await
    }

    /// Opens a context with caller-supplied request metadata.
    pub async fn open_with(store: &dyn WorkoutStore, info: RequestInfo) -> Result<Self, DomainError> {
        let session = store.open_session().await?;
        tracing::debug!(request_id = %info.request_id, "request context opened");
        Ok(Self {
            info,
            session: Mutex::new(Some(session)),
        })
    }

    pub fn info(&self) -> &RequestInfo {
        &self.info
    }

    pub fn request_id(&self) -> RequestId {
        self.info.request_id
    }

    pub async fn state(&self) -> ContextState {
        if self.session.lock().await.is_some() {
            ContextState::Open
        } else {
            ContextState::Closed
        }
    }

    /// Transitions to Closed and releases the session.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// context was already closed.
    pub async fn close(&self) -> bool {
        let released = self.session.lock().await.take();
        match released {
            Some(session) => {
                drop(session);
                tracing::debug!(request_id = %self.info.request_id, "request context closed");
                true
            }
            None => false,
        }
    }

    /// Appends an observation through this request's session.
    pub async fn insert(&self, workout: &NewWorkout) -> Result<Workout, ContextError> {
        let mut slot = self.session.lock().await;
        let session = self.live_session(&mut slot, "insert")?;
        Ok(session.insert(workout).await?)
    }

    /// Appends several observations in order, stopping at the first failure.
    pub async fn insert_all(&self, workouts: &[NewWorkout]) -> Result<Vec<Workout>, ContextError> {
        let mut slot = self.session.lock().await;
        let session = self.live_session(&mut slot, "insert_all")?;
        let mut inserted = Vec::with_capacity(workouts.len());
        for workout in workouts {
            inserted.push(session.insert(workout).await?);
        }
        Ok(inserted)
    }

    pub async fn find_by_id(&self, id: WorkoutId) -> Result<Option<Workout>, ContextError> {
        let mut slot = self.session.lock().await;
        let session = self.live_session(&mut slot, "find_by_id")?;
        Ok(session.find_by_id(id).await?)
    }

    pub async fn list(&self, filter: &WorkoutFilter) -> Result<Vec<Workout>, ContextError> {
        let mut slot = self.session.lock().await;
        let session = self.live_session(&mut slot, "list")?;
        Ok(session.list(filter).await?)
    }

    fn live_session<'a>(
        &self,
        slot: &'a mut Option<Box<dyn WorkoutSession>>,
        operation: &'static str,
    ) -> Result<&'a mut Box<dyn WorkoutSession>, ContextError> {
        match slot.as_mut() {
            Some(session) => Ok(session),
            None => {
                tracing::error!(
                    request_id = %self.info.request_id,
                    operation,
                    "store operation attempted on a closed request context"
                );
                Err(ContextError::Closed(self.info.request_id))
            }
        }
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if self.session.get_mut().take().is_some() {
            tracing::debug!(
                request_id = %self.info.request_id,
                "request context dropped while open, session released"
            );
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

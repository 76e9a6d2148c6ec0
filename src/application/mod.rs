//! Application layer - request-scoped orchestration over the ports.
//!
//! - `context` - The per-request store session and its Open/Closed lifecycle

pub mod context;

pub use context::{ContextError, ContextState, RequestContext, RequestInfo};

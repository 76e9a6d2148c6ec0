//! HTTP adapter for the GraphQL API.
//!
//! - `POST /graphql` - Execute a GraphQL request
//! - `GET /graphql` - GraphiQL explorer
//! - `GET /health` - Liveness check

pub mod handlers;
pub mod routes;

pub use handlers::{GraphqlAppState, HealthResponse};
pub use routes::{graphql_router, graphql_routes};

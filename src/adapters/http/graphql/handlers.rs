//! HTTP handlers for the GraphQL endpoint.

use async_graphql::dynamic::Schema;
use async_graphql::http::GraphiQLSource;
use axum::extract::{Json, State};
use axum::response::{Html, IntoResponse};
use serde::Serialize;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the GraphQL routes.
///
/// The schema carries its own services and lifecycle extension, so it is
/// the only dependency.
#[derive(Clone)]
pub struct GraphqlAppState {
    pub schema: Schema,
}

impl GraphqlAppState {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// Executes a GraphQL request.
///
/// POST /graphql
pub async fn execute_graphql(
    State(state): State<GraphqlAppState>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    Json(state.schema.execute(request).await)
}

/// Serves the GraphiQL explorer.
///
/// GET /graphql
pub async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

//! Axum router configuration for the GraphQL endpoint.

use axum::{routing::get, Router};

use super::handlers::{execute_graphql, graphiql, health, GraphqlAppState};

/// Create the API router.
///
/// # Routes
///
/// - `POST /graphql` - Execute a query or mutation
/// - `GET /graphql` - GraphiQL explorer
/// - `GET /health` - Liveness check
pub fn graphql_routes() -> Router<GraphqlAppState> {
    Router::new()
        .route("/graphql", get(graphiql).post(execute_graphql))
        .route("/health", get(health))
}

/// The API router with its state attached.
pub fn graphql_router(state: GraphqlAppState) -> Router {
    graphql_routes().with_state(state)
}

//! Route table for model rows

use crate::server::handlers::{AppState, create_row, delete_row, get_row, health_check, list_rows};
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

/// Build the REST routes
///
/// These routes are generic and work for every registered model:
/// - GET /health, /healthz - Liveness
/// - GET /{plural} - List rows, annotated with their external ids
/// - POST /{plural} - Create a row
/// - GET /{plural}/{id} - Get a row by public id or primary key
/// - DELETE /{plural}/{id} - Delete a row and its mapping entry
pub fn build_routes(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/{plural}", get(list_rows).post(create_row))
        .route("/{plural}/{id}", get(get_row).delete(delete_row));

    #[cfg(feature = "graphql")]
    let routes = routes.route("/graphql", axum::routing::post(crate::server::graphql::graphql_handler));

    routes.with_state(state).layer(TraceLayer::new_for_http())
}

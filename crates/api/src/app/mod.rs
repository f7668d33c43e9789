use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use tower::ServiceBuilder;

use stockwise_infra::Engine;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Full router: `/health` plus every tenant-scoped route.
pub fn build_app(engine: Arc<Engine>) -> Router {
    // Tenant-scoped routes: require the context headers.
    let scoped = routes::router()
        .layer(Extension(engine))
        .layer(axum::middleware::from_fn(middleware::context_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(scoped)
        .layer(ServiceBuilder::new())
}

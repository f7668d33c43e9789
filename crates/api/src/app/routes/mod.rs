use axum::{routing::post, Router};

pub mod alerts;
pub mod audit;
pub mod products;
pub mod sync;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/reconciliation", post(system::reconcile))
        .nest("/products", products::router())
        .nest("/sync", sync::router())
        .nest("/alerts", alerts::router())
        .nest("/audit", audit::router())
}

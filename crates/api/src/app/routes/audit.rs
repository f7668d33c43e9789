use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockwise_infra::Engine;

use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(query_entries))
        .route("/statistics", get(statistics))
        .route("/consistency", get(consistency))
        .route("/report", get(report))
}

pub async fn query_entries(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Query(params): Query<dto::AuditParams>,
) -> axum::response::Response {
    match engine.ledger.query(tenant.tenant_id(), &params.into_query()).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn statistics(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Query(params): Query<dto::RangeParams>,
) -> axum::response::Response {
    match engine.ledger.statistics(tenant.tenant_id(), params.range()).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn consistency(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match engine.ledger.validate_consistency(tenant.tenant_id()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn report(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Query(params): Query<dto::AuditParams>,
) -> axum::response::Response {
    match engine.ledger.generate_report(tenant.tenant_id(), &params.into_query()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

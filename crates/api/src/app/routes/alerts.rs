use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockwise_infra::Engine;
use stockwise_inventory::AlertConfig;

use crate::app::errors;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/scan", post(run_scan))
        .route("/config", get(get_config).put(update_config))
}

pub async fn dashboard(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match engine.alerts.dashboard(tenant.tenant_id()).await {
        Ok(d) => (StatusCode::OK, Json(d)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn run_scan(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match engine.alerts.run_scan(tenant.tenant_id()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_config(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match engine.alerts.get_config(tenant.tenant_id()).await {
        Ok(c) => (StatusCode::OK, Json(c)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_config(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<AlertConfig>,
) -> axum::response::Response {
    match engine.alerts.update_config(tenant.tenant_id(), body).await {
        Ok(c) => (StatusCode::OK, Json(c)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use stockwise_infra::Engine;

use crate::app::errors;
use crate::context::{ActorContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn reconcile(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    match engine.reconciler.reconcile(tenant.tenant_id(), actor.actor_id()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

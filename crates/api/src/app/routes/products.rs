use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use stockwise_core::ProductId;
use stockwise_infra::Engine;

use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

const DEFAULT_HISTORY_LIMIT: u32 = 50;

pub fn router() -> Router {
    Router::new()
        .route("/:id", post(register_product).delete(unregister_product))
        .route("/:id/movements", post(apply_movement))
        .route("/:id/availability", put(update_availability))
        .route("/:id/stock", get(get_stock))
        .route("/:id/history", get(get_history))
}

fn parse_product_id(id: &str) -> Result<ProductId, axum::response::Response> {
    id.parse().map_err(|_| errors::invalid_id("product"))
}

pub async fn register_product(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product = body.into_product(tenant.tenant_id(), product_id);

    match engine
        .inventory
        .register_product(tenant.tenant_id(), product, actor.actor_id())
        .await
    {
        Ok(level) => (StatusCode::CREATED, Json(dto::level_to_json(level))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn unregister_product(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine
        .inventory
        .unregister_product(tenant.tenant_id(), product_id, actor.actor_id())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn apply_movement(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let movement = body.into_movement(product_id, actor.actor_id());

    match engine.inventory.apply_movement(tenant.tenant_id(), movement).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_availability(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AvailabilityRequest>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine
        .inventory
        .update_availability(
            tenant.tenant_id(),
            product_id,
            body.available,
            body.reason.as_deref(),
            actor.actor_id(),
        )
        .await
    {
        Ok(level) => (StatusCode::OK, Json(dto::level_to_json(level))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.inventory.get_level(tenant.tenant_id(), product_id).await {
        Ok(level) => (StatusCode::OK, Json(dto::level_to_json(level))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_history(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Query(params): Query<dto::HistoryParams>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    match engine.ledger.history(tenant.tenant_id(), product_id, limit).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

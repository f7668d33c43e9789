use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use stockwise_infra::{Engine, ServiceResult};
use stockwise_inventory::{PurchaseOperation, ReservationOperation, SaleOperation, SyncResult};

use crate::app::{dto, errors};
use crate::context::{ActorContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/sales", post(sync_sale))
        .route("/purchases", post(sync_purchase))
        .route("/reservations", post(sync_reservation))
}

/// Applied events answer 200; rejected ones carry the per-line detail under
/// the status of the first failing line.
fn sync_response(result: ServiceResult<SyncResult>) -> axum::response::Response {
    match result {
        Ok(result) if result.success => (StatusCode::OK, Json(result)).into_response(),
        Ok(result) => {
            let status = result
                .first_error_kind()
                .map(errors::status_for)
                .unwrap_or(StatusCode::CONFLICT);
            (status, Json(result)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn sync_sale(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::SyncRequestBody<SaleOperation>>,
) -> axum::response::Response {
    let actor_id = match actor.require() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sync_response(engine.sync.sync_sale(body.into_request(tenant.tenant_id(), actor_id)).await)
}

pub async fn sync_purchase(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::SyncRequestBody<PurchaseOperation>>,
) -> axum::response::Response {
    let actor_id = match actor.require() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sync_response(
        engine
            .sync
            .sync_purchase(body.into_request(tenant.tenant_id(), actor_id))
            .await,
    )
}

pub async fn sync_reservation(
    Extension(engine): Extension<Arc<Engine>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::SyncRequestBody<ReservationOperation>>,
) -> axum::response::Response {
    let actor_id = match actor.require() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sync_response(
        engine
            .sync
            .sync_reservation(body.into_request(tenant.tenant_id(), actor_id))
            .await,
    )
}

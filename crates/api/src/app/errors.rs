use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockwise_core::ErrorKind;
use stockwise_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err.kind() {
        ErrorKind::Validation => json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string()),
        ErrorKind::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ErrorKind::Conflict => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        ErrorKind::System => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "internal_error",
                "message": "internal error",
                "correlation_id": err.correlation_id(),
            })),
        )
            .into_response(),
    }
}

/// Status for a per-line sync failure.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::System => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwise_core::ProductId;
    use stockwise_inventory::InventoryError;

    #[test]
    fn error_kinds_map_to_statuses() {
        let not_found = ServiceError::from(InventoryError::ProductNotFound(ProductId::new()));
        assert_eq!(service_error_to_response(not_found).status(), StatusCode::NOT_FOUND);

        let conflict = ServiceError::Concurrency("version moved".to_string());
        assert_eq!(service_error_to_response(conflict).status(), StatusCode::CONFLICT);

        let system = ServiceError::System { correlation_id: uuid::Uuid::now_v7() };
        assert_eq!(service_error_to_response(system).status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
    }
}

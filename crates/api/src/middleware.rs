use std::str::FromStr;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockwise_core::{TenantId, UserId};

use crate::app::errors;
use crate::context::{ActorContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Takes tenant and actor from headers set by the authenticating proxy.
pub async fn context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id: TenantId = header_id(req.headers(), TENANT_HEADER)?.ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_tenant",
            "x-tenant-id header is required",
        )
    })?;
    let actor_id: Option<UserId> = header_id(req.headers(), ACTOR_HEADER)?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(ActorContext::new(actor_id));

    Ok(next.run(req).await)
}

fn header_id<T: FromStr>(headers: &HeaderMap, name: &'static str) -> Result<Option<T>, Response> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{name} is empty")))?;
    value
        .parse()
        .map(Some)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{name} is not a valid id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn absent_header_is_none_and_garbage_is_rejected() {
        let mut headers = HeaderMap::new();
        assert!(matches!(header_id::<TenantId>(&headers, TENANT_HEADER), Ok(None)));

        headers.insert(TENANT_HEADER, HeaderValue::from_static("nope"));
        let err = header_id::<TenantId>(&headers, TENANT_HEADER).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let tenant = TenantId::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_str(&tenant.to_string()).unwrap());
        assert_eq!(header_id::<TenantId>(&headers, TENANT_HEADER).unwrap(), Some(tenant));
    }
}

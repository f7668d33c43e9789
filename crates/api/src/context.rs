use axum::http::StatusCode;
use axum::response::Response;

use stockwise_core::{TenantId, UserId};

use crate::app::errors;

/// Tenant context for a request.
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Acting user, recorded in the audit ledger. Optional for most routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: Option<UserId>,
}

impl ActorContext {
    pub fn new(actor_id: Option<UserId>) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> Option<UserId> {
        self.actor_id
    }

    /// The actor, or a 400 response for routes that must attribute the change.
    pub fn require(&self) -> Result<UserId, Response> {
        self.actor_id.ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "missing_actor",
                "x-actor-id header is required for this operation",
            )
        })
    }
}

//! Errors returned by the engine services.

use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use stockwise_core::ErrorKind;
use stockwise_inventory::InventoryError;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rule rejected the request; the message is safe to show.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The touched rows changed under us; nothing was written.
    #[error("concurrent modification, retry the operation: {0}")]
    Concurrency(String),

    /// Infrastructure failure. Details are only in the logs, under the
    /// correlation id.
    #[error("internal error (correlation id {correlation_id})")]
    System { correlation_id: Uuid },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Inventory(err) => err.kind(),
            ServiceError::Concurrency(_) => ErrorKind::Conflict,
            ServiceError::System { .. } => ErrorKind::System,
        }
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            ServiceError::System { correlation_id } => Some(*correlation_id),
            _ => None,
        }
    }

    /// Log `err` under a fresh correlation id and return the generic error.
    pub fn system(operation: &'static str, err: impl std::fmt::Display) -> Self {
        let correlation_id = Uuid::now_v7();
        error!(%correlation_id, operation, error = %err, "inventory operation failed");
        ServiceError::System { correlation_id }
    }

    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::Concurrency(msg) => ServiceError::Concurrency(msg),
            other => Self::system(operation, other),
        }
    }
}

/// Shorthand for `map_err(|e| ServiceError::from_store(op, e))`.
pub(crate) trait StoreResultExt<T> {
    fn or_system(self, operation: &'static str) -> ServiceResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn or_system(self, operation: &'static str) -> ServiceResult<T> {
        self.map_err(|e| ServiceError::from_store(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwise_core::ProductId;

    #[test]
    fn kinds_follow_the_taxonomy() {
        let not_found = ServiceError::from(InventoryError::ProductNotFound(ProductId::new()));
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.correlation_id(), None);

        let conflict = ServiceError::from_store("save", StoreError::Concurrency("v".into()));
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn system_errors_hide_details_behind_a_correlation_id() {
        let err = ServiceError::from_store("commit", StoreError::Backend("password=hunter2".into()));
        assert_eq!(err.kind(), ErrorKind::System);
        let id = err.correlation_id().unwrap();
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(!msg.contains("hunter2"));
    }
}

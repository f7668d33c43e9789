use serde::{Deserialize, Serialize};

use stockwise_core::{ProductId, TenantId};

/// Read-only view of a catalog product.
///
/// The catalog itself is owned by another module; the engine only needs to know
/// which tenant a product belongs to and whether it is physical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Services never carry stock. Immutable once the product exists.
    pub is_service: bool,
    pub category: Option<String>,
    /// Price in smallest currency unit (e.g., cents).
    pub price: Option<u64>,
}

impl ProductInfo {
    pub fn physical(tenant_id: TenantId, id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id,
            tenant_id,
            name: name.into(),
            is_service: false,
            category: None,
            price: None,
        }
    }

    pub fn service(tenant_id: TenantId, id: ProductId, name: impl Into<String>) -> Self {
        Self {
            is_service: true,
            ..Self::physical(tenant_id, id, name)
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_price(mut self, price: u64) -> Self {
        self.price = Some(price);
        self
    }
}

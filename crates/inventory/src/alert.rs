//! Threshold-based stock alerts.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{DomainError, ProductId, UserId};

use crate::error::{InventoryError, InventoryResult};
use crate::level::StockLevel;
use crate::product::ProductInfo;
use crate::validation;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    InApp,
    Email,
    Push,
    Chat,
}

/// Per-tenant alert thresholds and delivery preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub stock_minimo: i64,
    pub stock_critico: i64,
    pub enabled: bool,
    pub channels: Vec<AlertChannel>,
    pub frequency_minutes: u32,
    pub recipient_ids: Vec<UserId>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            stock_minimo: 10,
            stock_critico: 5,
            enabled: true,
            channels: vec![AlertChannel::InApp],
            frequency_minutes: 60,
            recipient_ids: Vec::new(),
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> InventoryResult<()> {
        validation::validate_threshold(self.stock_minimo)?;
        validation::validate_threshold(self.stock_critico)?;
        if self.stock_critico > self.stock_minimo {
            return Err(InventoryError::InvalidAlertConfig(format!(
                "stock_critico ({}) must not exceed stock_minimo ({})",
                self.stock_critico, self.stock_minimo
            )));
        }
        if self.frequency_minutes == 0 {
            return Err(InventoryError::InvalidAlertConfig(
                "frequency_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    /// Nothing on hand.
    SinStock,
    /// Stock exists but all of it is committed.
    Agotado,
    StockCritico,
    StockBajo,
}

/// Ordered from least to most urgent, so `max()` picks the most urgent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPriority {
    Baja,
    Media,
    Alta,
    Critica,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::SinStock => "SIN_STOCK",
            AlertType::Agotado => "AGOTADO",
            AlertType::StockCritico => "STOCK_CRITICO",
            AlertType::StockBajo => "STOCK_BAJO",
        }
    }
}

impl FromStr for AlertType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIN_STOCK" => Ok(AlertType::SinStock),
            "AGOTADO" => Ok(AlertType::Agotado),
            "STOCK_CRITICO" => Ok(AlertType::StockCritico),
            "STOCK_BAJO" => Ok(AlertType::StockBajo),
            other => Err(DomainError::validation(format!("unknown alert type '{other}'"))),
        }
    }
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::Baja => "BAJA",
            AlertPriority::Media => "MEDIA",
            AlertPriority::Alta => "ALTA",
            AlertPriority::Critica => "CRITICA",
        }
    }
}

impl FromStr for AlertPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BAJA" => Ok(AlertPriority::Baja),
            "MEDIA" => Ok(AlertPriority::Media),
            "ALTA" => Ok(AlertPriority::Alta),
            "CRITICA" => Ok(AlertPriority::Critica),
            other => Err(DomainError::validation(format!("unknown alert priority '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_qty: i64,
    pub available: i64,
    pub threshold: i64,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub category: Option<String>,
    pub price: Option<u64>,
    pub detected_at: DateTime<Utc>,
}

/// First matching rule wins:
/// `qty == 0` → SinStock, `available == 0` → Agotado,
/// `qty <= critico` → StockCritico, `qty <= minimo` → StockBajo.
///
/// Returns the alert type, its priority and the threshold that fired.
pub fn classify(
    quantity: i64,
    available: i64,
    config: &AlertConfig,
) -> Option<(AlertType, AlertPriority, i64)> {
    if quantity <= 0 {
        Some((AlertType::SinStock, AlertPriority::Critica, 0))
    } else if available <= 0 {
        Some((AlertType::Agotado, AlertPriority::Alta, 0))
    } else if quantity <= config.stock_critico {
        Some((AlertType::StockCritico, AlertPriority::Alta, config.stock_critico))
    } else if quantity <= config.stock_minimo {
        Some((AlertType::StockBajo, AlertPriority::Media, config.stock_minimo))
    } else {
        None
    }
}

impl Alert {
    /// Alert for one product, if any. Services never alert.
    pub fn detect(
        product: &ProductInfo,
        level: &StockLevel,
        config: &AlertConfig,
        detected_at: DateTime<Utc>,
    ) -> Option<Self> {
        if product.is_service {
            return None;
        }
        let (alert_type, priority, threshold) = classify(level.quantity, level.available, config)?;
        Some(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            current_qty: level.quantity,
            available: level.available,
            threshold,
            alert_type,
            priority,
            category: product.category.clone(),
            price: product.price,
            detected_at,
        })
    }

    pub fn is_critical(&self) -> bool {
        self.priority == AlertPriority::Critica
    }
}

/// Read-only summary of the current alert state of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDashboard {
    pub total: usize,
    pub by_priority: BTreeMap<AlertPriority, usize>,
    pub by_type: BTreeMap<AlertType, usize>,
    pub alerts: Vec<Alert>,
    pub generated_at: DateTime<Utc>,
}

impl AlertDashboard {
    pub fn from_alerts(mut alerts: Vec<Alert>, generated_at: DateTime<Utc>) -> Self {
        sort_by_urgency(&mut alerts);
        let mut by_priority = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        for alert in &alerts {
            *by_priority.entry(alert.priority).or_insert(0) += 1;
            *by_type.entry(alert.alert_type).or_insert(0) += 1;
        }
        Self {
            total: alerts.len(),
            by_priority,
            by_type,
            alerts,
            generated_at,
        }
    }

    pub fn count(&self, priority: AlertPriority) -> usize {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }
}

/// Most urgent first, then by product name for a stable order.
pub fn sort_by_urgency(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
}

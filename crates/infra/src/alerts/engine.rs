use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use stockwise_core::{ProductId, TenantId};
use stockwise_inventory::alert::sort_by_urgency;
use stockwise_inventory::{Alert, AlertConfig, AlertDashboard, AlertPriority, StockLevel};

use super::lock::TenantLock;
use super::notifier::{Notification, Notifier};
use crate::error::{ServiceResult, StoreResultExt};
use crate::store::Stores;

/// Result of one completed scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertScan {
    pub tenant_id: TenantId,
    pub alerts: Vec<Alert>,
    pub critical: usize,
    pub notifications_sent: usize,
    pub notification_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "scan", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Alerts are switched off for the tenant.
    Disabled,
    /// Another scan of the tenant holds the lock.
    AlreadyRunning,
    Completed(AlertScan),
}

#[derive(Clone)]
pub struct AlertEngine {
    stores: Stores,
    lock: Arc<dyn TenantLock>,
    notifier: Arc<dyn Notifier>,
    default_config: AlertConfig,
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}

impl AlertEngine {
    pub fn new(stores: Stores, lock: Arc<dyn TenantLock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            stores,
            lock,
            notifier,
            default_config: AlertConfig::default(),
        }
    }

    /// Config used for tenants that never stored their own.
    pub fn with_default_config(mut self, config: AlertConfig) -> Self {
        self.default_config = config;
        self
    }

    pub async fn get_config(&self, tenant_id: TenantId) -> ServiceResult<AlertConfig> {
        Ok(self
            .stores
            .alert_configs
            .get_config(tenant_id)
            .await
            .or_system("get_alert_config")?
            .unwrap_or_else(|| self.default_config.clone()))
    }

    #[instrument(skip(self, config), fields(tenant_id = %tenant_id), err)]
    pub async fn update_config(
        &self,
        tenant_id: TenantId,
        config: AlertConfig,
    ) -> ServiceResult<AlertConfig> {
        config.validate()?;
        self.stores
            .alert_configs
            .put_config(tenant_id, &config)
            .await
            .or_system("put_alert_config")?;
        info!(
            stock_minimo = config.stock_minimo,
            stock_critico = config.stock_critico,
            enabled = config.enabled,
            "alert config updated"
        );
        Ok(config)
    }

    async fn detect(&self, tenant_id: TenantId, config: &AlertConfig) -> ServiceResult<Vec<Alert>> {
        let products = self
            .stores
            .catalog
            .list_physical(tenant_id)
            .await
            .or_system("list_products")?;
        let levels: HashMap<ProductId, StockLevel> = self
            .stores
            .inventory
            .list_levels(tenant_id)
            .await
            .or_system("list_levels")?
            .into_iter()
            .map(|level| (level.product_id, level))
            .collect();

        let now = Utc::now();
        let mut alerts: Vec<Alert> = products
            .iter()
            .filter_map(|p| levels.get(&p.id).and_then(|level| Alert::detect(p, level, config, now)))
            .collect();
        sort_by_urgency(&mut alerts);
        Ok(alerts)
    }

    /// Current alerts, computed on the fly. Nothing is persisted or sent.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn dashboard(&self, tenant_id: TenantId) -> ServiceResult<AlertDashboard> {
        let config = self.get_config(tenant_id).await?;
        let alerts = self.detect(tenant_id, &config).await?;
        Ok(AlertDashboard::from_alerts(alerts, Utc::now()))
    }

    /// Scan the tenant, persist and notify critical alerts, then send one
    /// summary. Concurrent scans of the same tenant are refused, not queued.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn run_scan(&self, tenant_id: TenantId) -> ServiceResult<ScanOutcome> {
        let config = self.get_config(tenant_id).await?;
        if !config.enabled {
            return Ok(ScanOutcome::Disabled);
        }

        let Some(guard) = self
            .lock
            .try_acquire(tenant_id)
            .await
            .or_system("acquire_scan_lock")?
        else {
            info!("scan already running, skipped");
            return Ok(ScanOutcome::AlreadyRunning);
        };

        let result = self.scan_locked(tenant_id, &config).await;
        guard.release().await;
        result.map(ScanOutcome::Completed)
    }

    async fn scan_locked(&self, tenant_id: TenantId, config: &AlertConfig) -> ServiceResult<AlertScan> {
        let started_at = Utc::now();
        let alerts = self.detect(tenant_id, config).await?;
        let mut sent = 0;
        let mut failures = 0;

        let critical: Vec<&Alert> = alerts.iter().filter(|a| a.is_critical()).collect();
        for alert in &critical {
            if let Err(err) = self.stores.alert_history.record_alert(tenant_id, alert).await {
                warn!(product_id = %alert.product_id, error = %err, "failed to persist alert");
            }
            match self.notifier.notify(critical_notification(tenant_id, config, alert)).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    failures += 1;
                    warn!(product_id = %alert.product_id, error = %err, "critical alert not delivered");
                }
            }
        }

        if !alerts.is_empty() {
            match self.notifier.notify(summary_notification(tenant_id, config, &alerts)).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    failures += 1;
                    warn!(error = %err, "alert summary not delivered");
                }
            }
        }

        info!(alerts = alerts.len(), critical = critical.len(), sent, "alert scan finished");
        Ok(AlertScan {
            tenant_id,
            critical: critical.len(),
            alerts,
            notifications_sent: sent,
            notification_failures: failures,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn critical_notification(tenant_id: TenantId, config: &AlertConfig, alert: &Alert) -> Notification {
    Notification {
        tenant_id,
        title: format!("Sin stock: {}", alert.product_name),
        body: format!(
            "El producto {} se quedó sin existencias (stock {}, disponible {}).",
            alert.product_name, alert.current_qty, alert.available
        ),
        priority: alert.priority,
        recipient_ids: config.recipient_ids.clone(),
        channels: config.channels.clone(),
        metadata: json!({
            "product_id": alert.product_id,
            "alert_type": alert.alert_type,
            "category": alert.category,
        }),
    }
}

fn summary_notification(tenant_id: TenantId, config: &AlertConfig, alerts: &[Alert]) -> Notification {
    let count = |p: AlertPriority| alerts.iter().filter(|a| a.priority == p).count();
    let priority = alerts
        .iter()
        .map(|a| a.priority)
        .max()
        .unwrap_or(AlertPriority::Baja);
    Notification {
        tenant_id,
        title: "Resumen de alertas de inventario".to_string(),
        body: format!(
            "{} alertas: {} críticas, {} altas, {} medias.",
            alerts.len(),
            count(AlertPriority::Critica),
            count(AlertPriority::Alta),
            count(AlertPriority::Media)
        ),
        priority,
        recipient_ids: config.recipient_ids.clone(),
        channels: config.channels.clone(),
        metadata: json!({
            "products": alerts.iter().map(|a| a.product_id).collect::<Vec<_>>(),
        }),
    }
}

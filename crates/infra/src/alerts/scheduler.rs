//! Periodic alert scans per tenant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stockwise_core::TenantId;

use super::engine::{AlertEngine, ScanOutcome};

/// Fallback cadence when the tenant config cannot be read.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct AlertScheduler {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for AlertScheduler {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Running scheduler: one task per tenant.
#[derive(Debug)]
pub struct AlertSchedulerHandle {
    shutdown: watch::Sender<bool>,
    triggers: HashMap<TenantId, mpsc::Sender<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl AlertSchedulerHandle {
    /// Request an immediate scan. Triggers are coalesced: if one is already
    /// pending this is a no-op. Returns `false` for unknown tenants.
    pub fn trigger(&self, tenant_id: TenantId) -> bool {
        match self.triggers.get(&tenant_id) {
            Some(tx) => {
                let _ = tx.try_send(());
                true
            }
            None => false,
        }
    }

    pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.triggers.keys()
    }

    /// Stop every tenant task and wait for in-flight scans to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl AlertScheduler {
    /// Spawn a task per tenant. Each scans once at startup, then every
    /// `frequency_minutes` of the tenant's config, and on `trigger`.
    /// Failed scans are retried with bounded exponential backoff and never
    /// propagate.
    pub fn spawn(
        &self,
        engine: Arc<AlertEngine>,
        tenants: impl IntoIterator<Item = TenantId>,
    ) -> AlertSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut triggers = HashMap::new();
        let mut tasks = Vec::new();

        for tenant_id in tenants {
            if triggers.contains_key(&tenant_id) {
                continue;
            }
            let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
            triggers.insert(tenant_id, trigger_tx);
            tasks.push(tokio::spawn(tenant_loop(
                tenant_id,
                self.clone(),
                engine.clone(),
                shutdown_rx.clone(),
                trigger_rx,
            )));
        }

        AlertSchedulerHandle {
            shutdown: shutdown_tx,
            triggers,
            tasks,
        }
    }
}

async fn tenant_loop(
    tenant_id: TenantId,
    cfg: AlertScheduler,
    engine: Arc<AlertEngine>,
    mut shutdown: watch::Receiver<bool>,
    mut trigger: mpsc::Receiver<()>,
) {
    info!(tenant_id = %tenant_id, "alert scheduler started");

    // Run once on startup.
    let mut delay = Duration::ZERO;
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            Some(()) = trigger.recv() => {}
            _ = tokio::time::sleep(delay) => {}
        }
        if *shutdown.borrow() {
            break;
        }

        match engine.run_scan(tenant_id).await {
            Ok(outcome) => {
                failures = 0;
                match outcome {
                    ScanOutcome::Completed(scan) => {
                        debug!(tenant_id = %tenant_id, alerts = scan.alerts.len(), "scheduled scan done")
                    }
                    other => debug!(tenant_id = %tenant_id, outcome = ?other, "scheduled scan skipped"),
                }
                delay = interval(&engine, tenant_id).await;
            }
            Err(err) => {
                warn!(tenant_id = %tenant_id, error = %err, "scheduled alert scan failed");
                failures += 1;
                if failures <= cfg.max_retries {
                    delay = backoff(cfg.base_backoff, failures);
                } else {
                    failures = 0;
                    delay = interval(&engine, tenant_id).await;
                }
            }
        }
    }

    info!(tenant_id = %tenant_id, "alert scheduler stopped");
}

async fn interval(engine: &AlertEngine, tenant_id: TenantId) -> Duration {
    match engine.get_config(tenant_id).await {
        Ok(config) => Duration::from_secs(u64::from(config.frequency_minutes.max(1)) * 60),
        Err(_) => DEFAULT_INTERVAL,
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff(base, 1), Duration::from_millis(250));
        assert_eq!(backoff(base, 2), Duration::from_millis(500));
        assert_eq!(backoff(base, 4), Duration::from_millis(2000));
        assert_eq!(backoff(base, 30), Duration::from_millis(10_000));
    }
}

use std::sync::Arc;

use stockwise_infra::alerts::{InMemoryTenantLock, Notifier, TracingNotifier};
use stockwise_infra::config::EngineConfig;
use stockwise_infra::{db, Engine, Stores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load()?;
    stockwise_observability::init(&config.log_level);

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let engine = match &config.database.url {
        Some(url) => {
            let pool = db::connect(url, &config.database).await?;
            if config.database.run_migrations {
                db::migrate(&pool).await?;
            }
            Engine::postgres(pool, notifier, config.alerts.defaults.clone())
        }
        None => {
            tracing::warn!("no database url configured; state lives in memory and is lost on exit");
            let (stores, _) = Stores::in_memory();
            Engine::new(
                stores,
                Arc::new(InMemoryTenantLock::new()),
                notifier,
                config.alerts.defaults.clone(),
            )
        }
    };
    let engine = Arc::new(engine);

    let scheduler = if config.alerts.scan_enabled {
        let mut tenants = config.alerts.tenant_ids();
        tenants.extend(engine.stores.alert_configs.configured_tenants().await?);
        let handle = config.alerts.scheduler().spawn(engine.alerts.clone(), tenants);
        tracing::info!(tenants = handle.tenants().count(), "alert scheduler started");
        Some(handle)
    } else {
        None
    };

    let app = stockwise_api::app::build_app(engine);
    let listener = tokio::net::TcpListener::bind(config.server.addr()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    tracing::info!("shut down");
    Ok(())
}

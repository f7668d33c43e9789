//! Connection pool and schema bootstrap.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::{StoreError, map_sqlx_error};

const SCHEMA: &str = include_str!("../migrations/0001_inventory.sql");

pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;
    info!(max_connections = config.max_connections, "database pool ready");
    Ok(pool)
}

/// Apply the schema. Every statement is idempotent.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    info!("schema up to date");
    Ok(())
}

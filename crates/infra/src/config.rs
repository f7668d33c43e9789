//! Engine configuration.
//!
//! Sources, later ones win: built-in defaults, `stockwise.toml` (or the file
//! named by `STOCKWISE_CONFIG`), then `STOCKWISE_*` environment variables with
//! `__` as the nesting separator (`STOCKWISE_DATABASE__URL`).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use stockwise_core::TenantId;
use stockwise_inventory::AlertConfig;

use crate::alerts::AlertScheduler;

pub const DEFAULT_CONFIG_FILE: &str = "stockwise.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] figment::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL. Without one the engine runs on in-memory stores.
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Used for tenants without a stored config.
    pub defaults: AlertConfig,
    pub scan_enabled: bool,
    /// Tenants scanned by the scheduler in addition to those with a stored config.
    pub tenants: Vec<Uuid>,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            defaults: AlertConfig::default(),
            scan_enabled: false,
            tenants: Vec::new(),
            max_retries: 5,
            base_backoff_ms: 250,
        }
    }
}

impl AlertsConfig {
    pub fn scheduler(&self) -> AlertScheduler {
        AlertScheduler {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
        }
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.iter().copied().map(TenantId::from_uuid).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub alerts: AlertsConfig,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            alerts: AlertsConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("STOCKWISE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_figment(Self::figment(&path))
    }

    pub fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("STOCKWISE_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: EngineConfig = figment.extract()?;
        if config.log_level.trim().is_empty() {
            config.log_level = "info".to_string();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alerts
            .defaults
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("alerts.defaults: {e}")))?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|_jail| {
            let config = EngineConfig::from_figment(EngineConfig::figment("missing.toml")).unwrap();
            assert_eq!(config.database.url, None);
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.alerts.defaults, AlertConfig::default());
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "stockwise.toml",
                r#"
                log_level = "debug"

                [server]
                port = 9000

                [alerts.defaults]
                stock_minimo = 20
                stock_critico = 4
                enabled = true
                channels = ["in_app", "email"]
                frequency_minutes = 15
                recipient_ids = []
                "#,
            )?;
            jail.set_env("STOCKWISE_SERVER__PORT", "9100");
            jail.set_env("STOCKWISE_DATABASE__URL", "postgres://localhost/stockwise");

            let config = EngineConfig::from_figment(EngineConfig::figment("stockwise.toml")).unwrap();
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.alerts.defaults.stock_minimo, 20);
            assert_eq!(config.alerts.defaults.frequency_minutes, 15);
            assert_eq!(
                config.database.url.as_deref(),
                Some("postgres://localhost/stockwise")
            );
            Ok(())
        });
    }

    #[test]
    fn invalid_alert_defaults_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "stockwise.toml",
                r#"
                [alerts.defaults]
                stock_minimo = 3
                stock_critico = 8
                enabled = true
                channels = []
                frequency_minutes = 60
                recipient_ids = []
                "#,
            )?;
            let err = EngineConfig::from_figment(EngineConfig::figment("stockwise.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
            Ok(())
        });
    }
}

use crate::types::CatalogOrder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Position store configuration
    #[serde(default)]
    pub positions: PositionStoreConfig,

    /// Order catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Where position records live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PositionBackend {
    /// Single-file SQLite database
    Sqlite,
    /// Process memory; lost on exit
    Memory,
}

/// Position store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionStoreConfig {
    /// Storage backend
    #[serde(default = "default_backend")]
    pub backend: PositionBackend,

    /// Database file path (sqlite backend)
    #[serde(default = "default_positions_path")]
    pub path: String,
}

/// Order catalog source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogConfig {
    /// Live `orders` table in PostgreSQL
    Postgres(DatabaseConfig),
    /// Fixed list of orders from configuration
    Static {
        #[serde(default)]
        orders: Vec<CatalogOrder>,
    },
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_database")]
    pub database: String,

    /// Database user
    #[serde(default = "default_user")]
    pub user: String,

    /// Database password
    #[serde(default = "default_password")]
    pub password: String,

    /// Maximum number of connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout_sec")]
    pub connection_timeout_sec: u64,

    /// Per-query timeout in seconds
    #[serde(default = "default_query_timeout_sec")]
    pub query_timeout_sec: u64,
}

impl DatabaseConfig {
    /// Get query timeout as Duration
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_sec)
    }
}

// Default value functions
fn default_backend() -> PositionBackend {
    PositionBackend::Sqlite
}

fn default_positions_path() -> String {
    "./db/positions.sqlite".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "orders".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_password() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_connection_timeout_sec() -> u64 {
    5
}

fn default_query_timeout_sec() -> u64 {
    10
}

impl Default for PositionStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_positions_path(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            connection_timeout_sec: default_connection_timeout_sec(),
            query_timeout_sec: default_query_timeout_sec(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig::Postgres(DatabaseConfig::default())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            positions: PositionStoreConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, crate::error::StorageError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::error::StorageError::ConfigError(e.to_string()))?;

        let config: StorageConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, crate::error::StorageError> {
        let config: StorageConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleType;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.positions.backend, PositionBackend::Sqlite);
        match config.catalog {
            CatalogConfig::Postgres(db) => {
                assert_eq!(db.host, "localhost");
                assert_eq!(db.port, 5432);
            }
            other => panic!("unexpected catalog: {:?}", other),
        }
    }

    #[test]
    fn test_query_timeout() {
        let config = DatabaseConfig {
            query_timeout_sec: 3,
            ..DatabaseConfig::default()
        };
        assert_eq!(config.query_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_static_catalog_yaml() {
        let yaml = r#"
positions:
  backend: memory
catalog:
  kind: static
  orders:
    - order_id: o-1
      symbol: BTCUSDT
      quantity: 1
      timeframe: 5m
      rule_type: EMA
      ema_period: 15
      user_id: u-1
"#;
        let config = StorageConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.positions.backend, PositionBackend::Memory);
        assert_eq!(config.positions.path, "./db/positions.sqlite");

        let CatalogConfig::Static { orders } = config.catalog else {
            panic!("expected static catalog");
        };
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].rule_type, RuleType::Ema);
        assert_eq!(orders[0].leverage, 1);
    }

    #[test]
    fn test_postgres_catalog_yaml() {
        let yaml = r#"
catalog:
  kind: postgres
  host: catalog.internal
  database: trading
"#;
        let config = StorageConfig::from_yaml(yaml).unwrap();
        let CatalogConfig::Postgres(db) = config.catalog else {
            panic!("expected postgres catalog");
        };
        assert_eq!(db.host, "catalog.internal");
        assert_eq!(db.database, "trading");
        assert_eq!(db.query_timeout_sec, 10);
    }
}

use crate::config::DatabaseConfig;
use crate::error::{Result, StorageError};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Pooled connections to the order catalog database
pub struct ConnectionPool {
    pool: Pool,
}

impl ConnectionPool {
    /// Create the pool and check out one connection to prove the database is reachable
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to order catalog at {}:{}/{} (max_connections: {})",
            config.host, config.port, config.database, config.max_connections
        );

        let timeout = Duration::from_secs(config.connection_timeout_sec);

        let mut pg_config = Config::new();
        pg_config.host = Some(config.host.clone());
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database.clone());
        pg_config.user = Some(config.user.clone());
        pg_config.password = Some(config.password.clone());
        pg_config.connect_timeout = Some(timeout);
        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        pg_config.pool = Some(PoolConfig {
            max_size: config.max_connections,
            timeouts: Timeouts {
                wait: Some(timeout),
                create: Some(timeout),
                recycle: Some(timeout),
            },
            ..PoolConfig::default()
        });

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        let connection = Self { pool };
        connection.ping().await?;
        Ok(connection)
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> Result<deadpool_postgres::Client> {
        self.pool.get().await.map_err(|e| e.into())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<()> {
        let client = self.get().await?;
        let one: i32 = client.query_one("SELECT 1", &[]).await?.get(0);
        if one != 1 {
            return Err(StorageError::ConnectionError(format!("unexpected ping reply {}", one)));
        }
        Ok(())
    }

    /// Maximum number of pooled connections
    pub fn max_size(&self) -> usize {
        self.pool.status().max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn test_connection() {
        let config = DatabaseConfig::default();

        let pool = ConnectionPool::new(&config).await.unwrap();
        pool.ping().await.unwrap();
        assert_eq!(pool.max_size(), config.max_connections);
    }
}

//! Persistent state for signalgate
//!
//! This crate owns the position store (last known direction per
//! instrument, timeframe and rule) and the client side of the order catalog.
//!
//! # Features
//!
//! - Ordered key-value contract with SQLite-file and in-memory backends
//! - Position records in a stable JSON layout, keyed `{symbol}/{timeframe}/{rule}`
//! - Order catalog over PostgreSQL or a static list from configuration
//!
//! # Example
//!
//! ```no_run
//! use sg_storage::{PositionKey, PositionStore, PositionStoreConfig, RuleType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PositionStore::open(&PositionStoreConfig::default())?;
//!
//!     let key = PositionKey::new("BTCUSDT", "5m", RuleType::Ema);
//!     let record = store.load_or_init(&key, Some(15)).await?;
//!     println!("{} -> {:?}", key, record.position);
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod kv;
pub mod positions;
pub mod types;

// Include backend implementations from parent directory
#[path = "../backends/mod.rs"]
pub mod backends_impl;
pub mod backends {
    pub use super::backends_impl::*;
}

// Include postgres module from parent directory
#[path = "../postgres/mod.rs"]
pub mod postgres_impl;
pub mod postgres {
    pub use super::postgres_impl::*;
}

// Re-export main types
pub use catalog::{OrderCatalog, PgOrderCatalog, StaticCatalog};
pub use config::{CatalogConfig, DatabaseConfig, PositionBackend, PositionStoreConfig, StorageConfig};
pub use error::{Result, StorageError};
pub use kv::KeyValueStore;
pub use positions::PositionStore;
pub use postgres::ConnectionPool;
pub use types::{
    ActiveRule, CatalogOrder, OrderRef, Position, PositionKey, PositionRecord, RuleType,
};

pub use backends::{MemoryStore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing subscriber (for examples and tests)
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sg_storage=info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.positions.backend, PositionBackend::Sqlite);
    }
}

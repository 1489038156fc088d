//! Position store: last known direction per `(symbol, timeframe, rule)`
//!
//! Records are never deleted by the evaluation path, so history survives
//! renamed or retired instruments until an operator removes the key.
//!
//! Read-then-write on one key is not atomic. That is safe only because a
//! single scheduler tick touches a given key at a time; nothing here enforces
//! it.

use crate::backends::{MemoryStore, SqliteStore};
use crate::config::{PositionBackend, PositionStoreConfig};
use crate::error::{Result, StorageError};
use crate::kv::KeyValueStore;
use crate::types::{PositionKey, PositionRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Typed access to position records over a [`KeyValueStore`]
#[derive(Clone)]
pub struct PositionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl PositionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Open the backend named by configuration
    pub fn open(config: &PositionStoreConfig) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = match config.backend {
            PositionBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
            PositionBackend::Memory => {
                warn!("Position store is in memory; positions are lost on exit");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(kv))
    }

    /// Read the record for `key`, creating and persisting a fresh one if absent
    ///
    /// # Returns
    /// * `Ok(record)` - Stored record, or the fresh record that was just written
    /// * `Err(StorageError::CorruptRecord)` - Stored bytes are not a valid record
    /// * `Err(StorageError)` - Backend failure
    pub async fn load_or_init(
        &self,
        key: &PositionKey,
        ema_period: Option<u32>,
    ) -> Result<PositionRecord> {
        let raw_key = key.as_key();

        match self.kv.get(&raw_key).await {
            Ok(bytes) => {
                let record = decode(&raw_key, &bytes)?;
                if ema_period.is_some() && record.ema_period.is_some() && record.ema_period != ema_period {
                    warn!(
                        "{} was stored with EMA period {:?}, evaluating with {:?}",
                        raw_key, record.ema_period, ema_period
                    );
                }
                Ok(record)
            }
            Err(StorageError::NotFound(_)) => {
                let record = PositionRecord::fresh(&key.symbol, key.rule_type, ema_period);
                self.kv.put(&raw_key, &serde_json::to_vec(&record)?).await?;
                info!("Initialized position record {}", raw_key);
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    /// Read the record for `key` without creating it
    pub async fn get(&self, key: &PositionKey) -> Result<Option<PositionRecord>> {
        let raw_key = key.as_key();
        match self.kv.get(&raw_key).await {
            Ok(bytes) => decode(&raw_key, &bytes).map(Some),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or overwrite the record for `key`
    pub async fn save(&self, key: &PositionKey, record: &PositionRecord) -> Result<()> {
        let raw_key = key.as_key();
        debug!("Saving position {} = {:?}", raw_key, record.position);
        self.kv.put(&raw_key, &serde_json::to_vec(record)?).await
    }

    /// Remove the record stored under a raw key
    pub async fn remove(&self, raw_key: &str) -> Result<()> {
        info!("Removing position record {}", raw_key);
        self.kv.delete(raw_key).await
    }

    /// All records whose key starts with `prefix`, in key order
    ///
    /// Undecodable entries are reported per entry instead of failing the listing.
    pub async fn list(&self, prefix: &str) -> Result<Vec<(String, Result<PositionRecord>)>> {
        let entries = self.kv.scan_prefix(prefix).await?;
        Ok(entries
            .into_iter()
            .map(|(key, bytes)| {
                let record = decode(&key, &bytes);
                (key, record)
            })
            .collect())
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<PositionRecord> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

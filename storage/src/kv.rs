//! Ordered key-value contract backing the position store
//!
//! Keys are opaque strings and values opaque bytes. Every operation touches a
//! single key; there are no cross-key transactions.

use async_trait::async_trait;

use crate::error::Result;

/// Durable, ordered key-value map
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    ///
    /// # Returns
    /// * `Ok(bytes)` - Stored value
    /// * `Err(StorageError::NotFound)` - Key has never been written (or was deleted)
    /// * `Err(StorageError)` - Backend failure
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a value
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`, in key order
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

//! String key/value storage with per-entry expiry.
//!
//! The pipeline only ever stores strings; JSON encoding and encryption happen above this layer.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::Result;
use async_trait::async_trait;
use core::fmt::Debug;
use core::time::Duration;

#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Fetch a live value. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, replacing any previous entry.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Store `value` only when no live entry exists. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remove an entry. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

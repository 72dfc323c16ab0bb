use super::KeyValueStore;
use crate::Result;
use async_trait::async_trait;
use core::time::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    // `None` when the TTL overflows the clock, i.e. never expires
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Duration, now: Instant) -> Self {
        Self {
            value: value.to_string(),
            expires_at: now.checked_add(ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local store. Expired entries are dropped lazily when next touched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including ones that expired but were not touched since.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key)
            && entry.is_live(now)
        {
            return Ok(Some(entry.value.clone()));
        }

        let _ = self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let _ = self.entries.insert(key.to_string(), StoredValue::new(value, ttl, Instant::now()));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                let _ = occupied.insert(StoredValue::new(value, ttl, now));
            }
            Entry::Vacant(vacant) => {
                let _ = vacant.insert(StoredValue::new(value, ttl, now));
            }
        }

        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self.entries.remove(key).is_some_and(|(_, entry)| entry.is_live(now)))
    }
}

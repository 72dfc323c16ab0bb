use super::{PushEvent, TaskId};
use crate::Result;
use crate::context::KeyValueStore;
use core::time::Duration;
use ohno::IntoAppError;
use std::sync::Arc;

const LOG_TARGET: &str = "  fallback";

/// How long an undelivered result waits to be pulled.
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::from_secs(60 * 60);

/// Parks events whose channel was gone, for exactly one later pull.
#[derive(Debug, Clone)]
pub struct FallbackStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl FallbackStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[must_use]
    pub fn key(task_id: TaskId) -> String {
        format!("readme-forge:fallback:{task_id}")
    }

    /// Park `event` unless something is already parked for the task.
    ///
    /// Returns `false` when an earlier entry was kept.
    pub async fn store(&self, task_id: TaskId, event: &PushEvent) -> Result<bool> {
        let json = serde_json::to_string(event)?;
        let stored = self.store.set_if_absent(&Self::key(task_id), &json, self.ttl).await?;

        if stored {
            log::info!(target: LOG_TARGET, "Parked '{}' for task {task_id}", event.event);
        } else {
            log::warn!(target: LOG_TARGET, "Task {task_id} already has a parked result, keeping it");
        }

        Ok(stored)
    }

    /// Remove and return the parked event.
    ///
    /// Only the caller whose delete actually removed the entry gets the value, so concurrent
    /// pulls see it at most once between them.
    pub async fn take(&self, task_id: TaskId) -> Result<Option<PushEvent>> {
        let key = Self::key(task_id);

        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };

        if !self.store.delete(&key).await? {
            log::debug!(target: LOG_TARGET, "Parked result for task {task_id} was taken concurrently");
            return Ok(None);
        }

        let event = serde_json::from_str(&json).into_app_err_with(|| format!("decoding parked result for task {task_id}"))?;
        log::debug!(target: LOG_TARGET, "Handed out parked result for task {task_id}");
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::store::MemoryStore;
    use serde_json::json;

    fn fallback() -> (Arc<MemoryStore>, FallbackStore) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), FallbackStore::new(store, DEFAULT_FALLBACK_TTL))
    }

    #[tokio::test]
    async fn store_then_take_once() {
        let (_, fallback) = fallback();
        let id = TaskId::new();
        let event = PushEvent::new("generation-complete", json!({"markdown": "# Hi"}));

        assert!(fallback.store(id, &event).await.unwrap());
        assert_eq!(fallback.take(id).await.unwrap(), Some(event));
        assert_eq!(fallback.take(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn first_stored_event_wins() {
        let (_, fallback) = fallback();
        let id = TaskId::new();
        let first = PushEvent::new("evaluation-complete", json!(1));

        assert!(fallback.store(id, &first).await.unwrap());
        assert!(!fallback.store(id, &PushEvent::new("error", json!(2))).await.unwrap());
        assert_eq!(fallback.take(id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn entries_are_envelopes_under_task_key() {
        let (store, fallback) = fallback();
        let id = TaskId::new();
        let _ = fallback.store(id, &PushEvent::new("error", json!({"code": "NOT_FOUND"}))).await.unwrap();

        let raw = store.get(&format!("readme-forge:fallback:{id}")).await.unwrap().unwrap();
        let envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope["event"], "error");
        assert_eq!(envelope["data"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn expired_entries_cannot_be_taken() {
        let store = Arc::new(MemoryStore::new());
        let fallback = FallbackStore::new(store, Duration::from_millis(20));
        let id = TaskId::new();
        let _ = fallback.store(id, &PushEvent::new("x", json!(null))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fallback.take(id).await.unwrap(), None);
    }
}

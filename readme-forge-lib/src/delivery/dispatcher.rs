use super::{ChannelRegistry, DeliveryFailure, FallbackStore, PushEvent, TaskId};
use crate::context::ApiError;
use core::any::Any;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "dispatcher";

/// Default number of background tasks allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

/// Where a task's outcome ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the subscriber's open channel.
    Pushed,
    /// Parked in the fallback store.
    FallbackStored,
    /// The fallback store already held an entry for the task, which was kept.
    AlreadyStored,
    /// Neither the channel nor the fallback store accepted it.
    Lost,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no result is waiting for task {0}")]
    NotFound(TaskId),

    #[error("fallback store unavailable: {0}")]
    Store(ohno::AppError),
}

impl DeliveryError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Store(_) => "UPSTREAM_ERROR",
        }
    }
}

/// Runs work on a bounded pool and routes its outcome to a channel or the fallback store.
#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    registry: ChannelRegistry,
    fallback: FallbackStore,
    permits: Arc<Semaphore>,
}

impl TaskDispatcher {
    #[must_use]
    pub fn new(registry: ChannelRegistry, fallback: FallbackStore, max_concurrent: usize) -> Self {
        Self {
            registry,
            fallback,
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Run `work` in the background and deliver its outcome under `task_id`.
    ///
    /// Returns at once. Success is delivered as `event_name`; failures (including panics)
    /// as an `error` event. The handle resolves once delivery was attempted.
    pub fn dispatch<F, T>(&self, task_id: TaskId, event_name: &'static str, work: F) -> JoinHandle<Delivery>
    where
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let this = self.clone();
        log::debug!(target: LOG_TARGET, "Scheduling task {task_id}");

        tokio::spawn(async move {
            let event = match this.run(work).await {
                Ok(data) => PushEvent::new(event_name, data),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Task {task_id} failed: {e}");
                    PushEvent::error(&e.to_payload())
                }
            };

            this.deliver(task_id, event).await
        })
    }

    /// Push `event` to the task's channel, falling back to storage when that fails.
    pub async fn deliver(&self, task_id: TaskId, event: PushEvent) -> Delivery {
        let (failure, event) = match self.registry.push(task_id, event) {
            Ok(()) => {
                log::info!(target: LOG_TARGET, "Task {task_id} delivered over its channel");
                return Delivery::Pushed;
            }
            Err(rejected) => rejected,
        };

        match failure {
            DeliveryFailure::NoChannel => log::info!(target: LOG_TARGET, "Task {task_id} has no open channel, parking result"),
            DeliveryFailure::Disconnected => log::info!(target: LOG_TARGET, "Task {task_id} lost its subscriber, parking result"),
        }

        match self.fallback.store(task_id, &event).await {
            Ok(true) => Delivery::FallbackStored,
            Ok(false) => Delivery::AlreadyStored,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not park result of task {task_id}: {e:#}");
                Delivery::Lost
            }
        }
    }

    /// Hand out a parked result exactly once, closing any channel still registered for it.
    pub async fn fetch_fallback(&self, task_id: TaskId) -> Result<PushEvent, DeliveryError> {
        let _ = self.registry.deregister(task_id);

        self.fallback
            .take(task_id)
            .await
            .map_err(DeliveryError::Store)?
            .ok_or(DeliveryError::NotFound(task_id))
    }

    async fn run<F, T>(&self, work: F) -> Result<Value, ApiError>
    where
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ApiError::TaskFailed {
                reason: "worker pool is shut down".to_string(),
            })?;

        // an inner task so a panic surfaces as a JoinError instead of tearing down delivery
        let worker = tokio::spawn(async move {
            let _permit = permit;
            work.await
        });

        match worker.await {
            Ok(Ok(value)) => serde_json::to_value(value).map_err(|e| ApiError::TaskFailed {
                reason: format!("result could not be serialized: {e}"),
            }),
            Ok(Err(e)) => Err(e),
            Err(e) if e.is_panic() => Err(ApiError::TaskFailed {
                reason: panic_message(e.into_panic().as_ref()),
            }),
            Err(e) => Err(ApiError::TaskFailed { reason: e.to_string() }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}

//! Background task execution with push delivery and a pull-based fallback.
//!
//! A client subscribes and receives a [`ChannelHandle`] whose first event is `connected`,
//! carrying the task id. Work dispatched under that id runs on a bounded worker pool; its
//! outcome is pushed down the channel when it is still open, or parked in the
//! [`FallbackStore`] for a single later pull when it is not.

mod dispatcher;
mod fallback;
mod registry;

pub use dispatcher::{DEFAULT_MAX_CONCURRENT_TASKS, Delivery, DeliveryError, TaskDispatcher};
pub use fallback::{DEFAULT_FALLBACK_TTL, FallbackStore};
pub use registry::{ChannelHandle, ChannelRegistry, DEFAULT_CHANNEL_TIMEOUT, DeliveryFailure};

use crate::context::ErrorPayload;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const CONNECTED_EVENT: &str = "connected";
pub const ERROR_EVENT: &str = "error";

/// Opaque identifier shared by a channel, its background task, and its fallback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A named event as seen by channel subscribers and fallback pulls alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub event: String,
    pub data: Value,
}

impl PushEvent {
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    #[must_use]
    pub fn connected(task_id: TaskId) -> Self {
        Self::new(CONNECTED_EVENT, serde_json::json!({ "task_id": task_id.to_string() }))
    }

    #[must_use]
    pub fn error(payload: &ErrorPayload) -> Self {
        Self::new(ERROR_EVENT, serde_json::to_value(payload).unwrap_or(Value::Null))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.event == ERROR_EVENT
    }

    /// The structured error carried by an `error` event.
    #[must_use]
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if self.is_error() {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }
}

use super::{PushEvent, TaskId};
use core::time::Duration;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::AbortHandle;

const LOG_TARGET: &str = "  registry";

/// Longest a channel stays registered without delivery.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(20 * 60);

// `connected` plus one terminal event, with headroom
const CHANNEL_CAPACITY: usize = 8;

/// Why an event could not be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Nothing is registered under the task id (never subscribed, timed out, or already used).
    NoChannel,
    /// The subscriber went away before the event could be written.
    Disconnected,
}

/// The subscriber's end of a push channel.
#[derive(Debug)]
pub struct ChannelHandle {
    task_id: TaskId,
    receiver: Receiver<PushEvent>,
}

impl ChannelHandle {
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Next event, or `None` once the channel completed, timed out or was deregistered.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }
}

#[derive(Debug)]
struct Registration {
    sender: Sender<PushEvent>,
    watchdog: Option<AbortHandle>,
}

impl Registration {
    fn close(self) -> Sender<PushEvent> {
        if let Some(watchdog) = self.watchdog {
            watchdog.abort();
        }
        self.sender
    }
}

/// Open push channels keyed by task id.
///
/// Each key is inserted once and removed exactly once, by whichever of delivery, timeout,
/// channel error or fallback retrieval gets there first.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Arc<DashMap<TaskId, Registration>>,
    timeout: Duration,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_TIMEOUT)
    }
}

impl ChannelRegistry {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Open a channel under a fresh task id and emit `connected` on it.
    ///
    /// Must be called from within a tokio runtime: a watchdog task deregisters the channel
    /// when it times out or the subscriber drops its handle.
    #[must_use]
    pub fn subscribe(&self) -> ChannelHandle {
        let task_id = TaskId::new();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        // a fresh channel always has room
        let _ = sender.try_send(PushEvent::connected(task_id));

        let _ = self.channels.insert(
            task_id,
            Registration {
                sender: sender.clone(),
                watchdog: None,
            },
        );

        // registered first so an immediate timeout still finds the entry
        let watchdog = tokio::spawn(watch(self.clone(), task_id, sender)).abort_handle();
        if let Some(mut registration) = self.channels.get_mut(&task_id) {
            registration.watchdog = Some(watchdog);
        }

        log::debug!(target: LOG_TARGET, "Channel {task_id} opened");
        ChannelHandle { task_id, receiver }
    }

    /// Push `event` and close the channel.
    ///
    /// The channel is deregistered whether or not the write succeeds. On failure the event is
    /// handed back so the caller can park it elsewhere.
    pub fn push(&self, task_id: TaskId, event: PushEvent) -> Result<(), (DeliveryFailure, PushEvent)> {
        let Some((_, registration)) = self.channels.remove(&task_id) else {
            log::debug!(target: LOG_TARGET, "No open channel for {task_id}");
            return Err((DeliveryFailure::NoChannel, event));
        };

        match registration.close().try_send(event) {
            Ok(()) => {
                log::debug!(target: LOG_TARGET, "Channel {task_id} completed");
                Ok(())
            }
            Err(TrySendError::Closed(event) | TrySendError::Full(event)) => {
                log::debug!(target: LOG_TARGET, "Channel {task_id} rejected its final event");
                Err((DeliveryFailure::Disconnected, event))
            }
        }
    }

    /// Drop a channel after a transport error. Pending work is unaffected.
    pub fn on_channel_error(&self, task_id: TaskId) {
        if self.deregister(task_id) {
            log::info!(target: LOG_TARGET, "Channel {task_id} failed and was closed");
        }
    }

    /// Remove a channel if still registered. Returns whether anything was removed.
    pub fn deregister(&self, task_id: TaskId) -> bool {
        self.channels
            .remove(&task_id)
            .map(|(_, registration)| registration.close())
            .is_some()
    }

    #[must_use]
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.channels.contains_key(&task_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

async fn watch(registry: ChannelRegistry, task_id: TaskId, sender: Sender<PushEvent>) {
    let expired = tokio::select! {
        () = tokio::time::sleep(registry.timeout) => true,
        () = sender.closed() => false,
    };

    // release our sender before deregistering so the subscriber sees the channel end
    drop(sender);

    // `remove` here rather than `deregister`: aborting ourselves is pointless
    if registry.channels.remove(&task_id).is_some() {
        if expired {
            log::info!(target: LOG_TARGET, "Channel {task_id} timed out");
        } else {
            log::info!(target: LOG_TARGET, "Channel {task_id} was dropped by its subscriber");
        }
    }
}

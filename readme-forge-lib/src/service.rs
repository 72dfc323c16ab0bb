//! The entry points request handlers call.
//!
//! Synchronous callers use [`ReadmeService::fetch_repository_context`]. The asynchronous path
//! is `subscribe` → `request_background_*` with the subscription's task id → either events on
//! the channel or a single [`ReadmeService::fetch_fallback`].

use crate::context::{ApiError, ContextCollector, ReadmeContent, ReadmeMode, RepoRef, RepositoryContext};
use crate::delivery::{ChannelHandle, Delivery, DeliveryError, PushEvent, TaskDispatcher, TaskId};
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "   service";

#[derive(Debug, Clone)]
pub struct ReadmeService {
    collector: ContextCollector,
    dispatcher: TaskDispatcher,
}

impl ReadmeService {
    #[must_use]
    pub const fn new(collector: ContextCollector, dispatcher: TaskDispatcher) -> Self {
        Self { collector, dispatcher }
    }

    /// Gather the full context for a repository branch.
    pub async fn fetch_repository_context(&self, repo: &RepoRef) -> Result<RepositoryContext, ApiError> {
        self.collector.fetch_repository_context(repo).await
    }

    /// Open a push channel. Its first event is `connected` with the task id to dispatch under.
    #[must_use]
    pub fn subscribe(&self) -> ChannelHandle {
        self.dispatcher.registry().subscribe()
    }

    /// Evaluate the repository's README in the background; completes as `evaluation-complete`.
    pub fn request_background_evaluation(&self, task_id: TaskId, repo: RepoRef) -> JoinHandle<Delivery> {
        self.request_background(task_id, repo, ReadmeMode::Evaluate)
    }

    /// Generate a README in the background; completes as `generation-complete`.
    pub fn request_background_generation(&self, task_id: TaskId, repo: RepoRef) -> JoinHandle<Delivery> {
        self.request_background(task_id, repo, ReadmeMode::Generate)
    }

    /// Pull a result whose push failed. Succeeds at most once per task.
    pub async fn fetch_fallback(&self, task_id: TaskId) -> Result<PushEvent, DeliveryError> {
        self.dispatcher.fetch_fallback(task_id).await
    }

    /// Report a transport failure on a subscriber's channel.
    pub fn channel_failed(&self, task_id: TaskId) {
        self.dispatcher.registry().on_channel_error(task_id);
    }

    fn request_background(&self, task_id: TaskId, repo: RepoRef, mode: ReadmeMode) -> JoinHandle<Delivery> {
        log::info!(target: LOG_TARGET, "Requested {mode} of {repo} as task {task_id}");
        let collector = self.collector.clone();

        self.dispatcher
            .dispatch(task_id, mode.event_name(), async move { run_readme_task(&collector, &repo, mode).await })
    }
}

async fn run_readme_task(collector: &ContextCollector, repo: &RepoRef, mode: ReadmeMode) -> Result<ReadmeContent, ApiError> {
    let context = collector.fetch_repository_context(repo).await?;
    collector.llm().evaluate_or_generate_readme(mode, &context).await
}

use super::Host;
use super::common::{CommonArgs, build_service, init_logging, load_config};
use crate::Result;
use crate::context::ReadmeMode;
use crate::delivery::{CONNECTED_EVENT, PushEvent};
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::io::Write;

const LOG_TARGET: &str = "    readme";

#[derive(Parser, Debug)]
pub struct ReadmeArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run a README evaluation or generation through the background path.
///
/// Every event received on the push channel is printed as one JSON line. When the channel
/// closes before the result arrives, the result is pulled from the fallback store instead.
pub async fn process_readme<H: Host>(host: &mut H, args: &ReadmeArgs, mode: ReadmeMode) -> Result<()> {
    init_logging(args.common.log_level);

    let config = load_config(args.common.config.as_deref())?;
    let service = build_service(&config, &args.common)?;
    let repo = args.common.repo_ref()?;

    let mut channel = service.subscribe();
    let task_id = channel.task_id();

    let task = match mode {
        ReadmeMode::Evaluate => service.request_background_evaluation(task_id, repo.clone()),
        ReadmeMode::Generate => service.request_background_generation(task_id, repo.clone()),
    };

    let mut outcome = None;
    while let Some(event) = channel.recv().await {
        print_event(host, &event)?;
        if event.event != CONNECTED_EVENT {
            outcome = Some(event);
        }
    }

    let outcome = if let Some(event) = outcome {
        event
    } else {
        log::info!(target: LOG_TARGET, "Channel for task {task_id} closed without a result, pulling it instead");

        let delivery = task.await.into_app_err("waiting for the background task")?;
        log::debug!(target: LOG_TARGET, "Task {task_id} finished with delivery {delivery:?}");

        let event = service
            .fetch_fallback(task_id)
            .await
            .into_app_err_with(|| format!("retrieving the result of task {task_id}"))?;
        print_event(host, &event)?;
        event
    };

    if let Some(payload) = outcome.error_payload() {
        let _ = writeln!(host.error(), "error [{}]: {}", payload.code, payload.message);
        if let Some(wait) = payload.wait_seconds {
            let _ = writeln!(host.error(), "retry in {wait}s");
        }

        host.exit(1);
        bail!("{mode} of {repo} failed: {}", payload.message);
    }

    Ok(())
}

fn print_event<H: Host>(host: &mut H, event: &PushEvent) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let _ = writeln!(host.output(), "{line}");
    Ok(())
}

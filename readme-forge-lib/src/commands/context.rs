use super::Host;
use super::common::{CommonArgs, build_service, init_logging, load_config, report_api_error};
use crate::Result;
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ContextArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print the context on a single line
    #[arg(long)]
    pub compact: bool,
}

/// Gather the repository context synchronously and print it as JSON.
pub async fn fetch_context<H: Host>(host: &mut H, args: &ContextArgs) -> Result<()> {
    init_logging(args.common.log_level);

    let config = load_config(args.common.config.as_deref())?;
    let service = build_service(&config, &args.common)?;
    let repo = args.common.repo_ref()?;

    match service.fetch_repository_context(&repo).await {
        Ok(context) => {
            let json = if args.compact {
                serde_json::to_string(&context)?
            } else {
                serde_json::to_string_pretty(&context)?
            };

            let _ = writeln!(host.output(), "{json}");
            Ok(())
        }
        Err(e) => {
            report_api_error(host, &e);
            host.exit(1);
            Err(e).into_app_err_with(|| format!("collecting context for {repo}"))
        }
    }
}

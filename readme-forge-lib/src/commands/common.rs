//! Shared argument handling and service wiring for the context, evaluate and generate commands.

use super::Host;
use super::config::Config;
use crate::Result;
use crate::context::hosting::HostingClient;
use crate::context::store::{FileStore, MemoryStore};
use crate::context::{AesGcmCipher, ApiError, ApiExecutor, ContextCollector, HttpLlmClient, KeyValueStore, Memoizer, PayloadCipher, RepoRef};
use crate::delivery::{ChannelRegistry, FallbackStore, TaskDispatcher};
use crate::service::ReadmeService;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use directories::BaseDirs;
use ohno::IntoAppError;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "       cli";

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by every command that talks to GitHub
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Repository to work on, as `owner/repo`
    #[arg(value_name = "OWNER/REPO")]
    pub repo: String,

    /// Branch to read
    #[arg(long, short = 'b', default_value = "main")]
    pub branch: String,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// API key sent to the LLM gateway
    #[arg(long, value_name = "KEY", env = "README_FORGE_LLM_KEY", hide_env_values = true)]
    pub llm_key: Option<String>,

    /// Base64 AES-256 key used to encrypt cached file contents. Without it, file contents are not cached
    #[arg(long, value_name = "KEY", env = "README_FORGE_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Path to configuration file (default is `readme-forge.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory where artifacts are cached
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Keep the cache in memory for this run only
    #[arg(long)]
    pub no_cache: bool,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

impl CommonArgs {
    /// The repository these arguments name.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is not of the form `owner/repo`
    pub fn repo_ref(&self) -> Result<RepoRef> {
        RepoRef::parse(&self.repo, &self.branch, self.github_token.as_deref().unwrap_or_default())
    }
}

/// Initialize logger based on log level
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // a second initialization (repeated runs in one process) keeps the first logger
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

/// Assemble the service from configuration and secrets.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the cache directory cannot be created,
/// or the encryption key is malformed
pub fn build_service(config: &Config, args: &CommonArgs) -> Result<ReadmeService> {
    let store: Arc<dyn KeyValueStore> = if args.no_cache {
        log::info!(target: LOG_TARGET, "Using an in-memory cache for this run");
        Arc::new(MemoryStore::new())
    } else {
        let dir = cache_dir(config, args.cache_dir.as_deref())?;
        log::info!(target: LOG_TARGET, "Caching artifacts in '{}'", dir.display());
        Arc::new(FileStore::new(dir)?)
    };

    let cipher = args
        .encryption_key
        .as_deref()
        .map(AesGcmCipher::from_base64)
        .transpose()?
        .map(|cipher| Arc::new(cipher) as Arc<dyn PayloadCipher>);

    if cipher.is_none() {
        log::warn!(target: LOG_TARGET, "No encryption key configured, file contents will not be cached");
    }

    let executor = ApiExecutor::new(config.request_timeout)?;
    let hosting = HostingClient::new(executor.clone(), &config.api_base_url)?;
    let llm = HttpLlmClient::new(executor, &config.llm_endpoint, args.llm_key.clone().unwrap_or_default())?;

    let memoizer = Memoizer::new(Arc::clone(&store), config.artifact_ttl, cipher);
    let collector = ContextCollector::new(hosting, Arc::new(llm), memoizer)
        .with_max_contributors(config.max_contributors)
        .with_max_files_per_kind(config.max_files_per_kind);

    let dispatcher = TaskDispatcher::new(
        ChannelRegistry::new(config.channel_timeout),
        FallbackStore::new(store, config.fallback_ttl),
        config.max_concurrent_tasks,
    );

    Ok(ReadmeService::new(collector, dispatcher))
}

/// Load configuration the way every command does: explicit path, else `readme-forge.toml` in
/// the working directory, else defaults.
///
/// # Errors
///
/// Returns an error if a configuration file exists but cannot be loaded
pub fn load_config(config_path: Option<&Utf8Path>) -> Result<Config> {
    Config::load(Utf8Path::new("."), config_path)
}

/// Print a classified failure to the host's error stream.
pub fn report_api_error<H: Host>(host: &mut H, e: &ApiError) {
    let _ = writeln!(host.error(), "error [{}]: {e}", e.code());
    if let Some(wait) = e.wait_seconds() {
        let _ = writeln!(host.error(), "retry in {wait}s");
    }
}

fn cache_dir(config: &Config, from_args: Option<&Utf8Path>) -> Result<PathBuf> {
    if let Some(dir) = from_args.or(config.cache_dir.as_deref()) {
        return Ok(dir.as_std_path().to_path_buf());
    }

    Ok(BaseDirs::new()
        .into_app_err("could not determine cache directory")?
        .cache_dir()
        .join("readme-forge"))
}

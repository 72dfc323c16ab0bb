use crate::Result;
use crate::context::hosting::DEFAULT_API_BASE_URL;
use crate::context::{DEFAULT_ARTIFACT_TTL, DEFAULT_MAX_CONTRIBUTORS, DEFAULT_MAX_FILES_PER_KIND, DEFAULT_REQUEST_TIMEOUT};
use crate::delivery::{DEFAULT_CHANNEL_TIMEOUT, DEFAULT_FALLBACK_TTL, DEFAULT_MAX_CONCURRENT_TASKS};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// File looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "readme-forge.toml";

const DEFAULT_LLM_ENDPOINT: &str = "http://127.0.0.1:8787";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root of the GitHub REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the LLM gateway
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,

    /// Per-request timeout for GitHub and LLM calls
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Duration to keep cached artifacts
    #[serde(default = "default_artifact_ttl", with = "humantime_serde")]
    pub artifact_ttl: Duration,

    /// Duration an undelivered background result waits to be pulled
    #[serde(default = "default_fallback_ttl", with = "humantime_serde")]
    pub fallback_ttl: Duration,

    /// Duration a push channel stays open waiting for its result
    #[serde(default = "default_channel_timeout", with = "humantime_serde")]
    pub channel_timeout: Duration,

    /// Number of background tasks allowed to run at once
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Number of contributors whose commit history is sampled
    #[serde(default = "default_max_contributors")]
    pub max_contributors: usize,

    /// Number of files fetched for each of the entry and important file lists
    #[serde(default = "default_max_files_per_kind")]
    pub max_files_per_kind: usize,

    /// Directory for the artifact cache, the platform cache directory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<Utf8PathBuf>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_llm_endpoint() -> String {
    DEFAULT_LLM_ENDPOINT.to_string()
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

const fn default_artifact_ttl() -> Duration {
    DEFAULT_ARTIFACT_TTL
}

const fn default_fallback_ttl() -> Duration {
    DEFAULT_FALLBACK_TTL
}

const fn default_channel_timeout() -> Duration {
    DEFAULT_CHANNEL_TIMEOUT
}

const fn default_max_concurrent_tasks() -> usize {
    DEFAULT_MAX_CONCURRENT_TASKS
}

const fn default_max_contributors() -> usize {
    DEFAULT_MAX_CONTRIBUTORS
}

const fn default_max_files_per_kind() -> usize {
    DEFAULT_MAX_FILES_PER_KIND
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `readme-forge.toml` in `base_dir` is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or fails validation
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading readme-forge configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading readme-forge configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a limit is zero, a duration is zero, or a URL does not parse
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(app_err!("max_concurrent_tasks must be at least 1"));
        }

        if self.max_contributors == 0 {
            return Err(app_err!("max_contributors must be at least 1"));
        }

        if self.max_files_per_kind == 0 {
            return Err(app_err!("max_files_per_kind must be at least 1"));
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("artifact_ttl", self.artifact_ttl),
            ("fallback_ttl", self.fallback_ttl),
            ("channel_timeout", self.channel_timeout),
        ] {
            if value.is_zero() {
                return Err(app_err!("{name} must be greater than zero"));
            }
        }

        for (name, value) in [("api_base_url", &self.api_base_url), ("llm_endpoint", &self.llm_endpoint)] {
            let _ = url::Url::parse(value).into_app_err_with(|| format!("{name} '{value}' is not a valid URL"))?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            llm_endpoint: default_llm_endpoint(),
            request_timeout: default_request_timeout(),
            artifact_ttl: default_artifact_ttl(),
            fallback_ttl: default_fallback_ttl(),
            channel_timeout: default_channel_timeout(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            max_contributors: default_max_contributors(),
            max_files_per_kind: default_max_files_per_kind(),
            cache_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, root)
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_config_matches_embedded() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = Config { max_concurrent_tasks: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_contributors() {
        let config = Config { max_contributors: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = Config { artifact_ttl: Duration::ZERO, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { channel_timeout: Duration::ZERO, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_url() {
        let config = Config { llm_endpoint: "not a url".to_string(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_default_and_load() {
        let (_tmp, root) = temp_root();
        let output_path = root.join("custom.toml");
        Config::save_default(&output_path).unwrap();

        let loaded = Config::load(&root, Some(output_path.as_path())).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let (_tmp, root) = temp_root();
        assert_eq!(Config::load(&root, None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let (_tmp, root) = temp_root();
        assert!(Config::load(&root, Some(root.join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn test_load_picks_up_file_in_base_dir() {
        let (_tmp, root) = temp_root();
        fs::write(
            root.join(DEFAULT_CONFIG_FILE),
            "artifact_ttl = \"2h\"\nmax_contributors = 3\ncache_dir = \"/tmp/forge\"\n",
        )
        .unwrap();

        let config = Config::load(&root, None).unwrap();
        assert_eq!(config.artifact_ttl, Duration::from_secs(2 * 60 * 60));
        assert_eq!(config.max_contributors, 3);
        assert_eq!(config.cache_dir, Some(Utf8PathBuf::from("/tmp/forge")));
        assert_eq!(config.fallback_ttl, DEFAULT_FALLBACK_TTL);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let (_tmp, root) = temp_root();
        let path = root.join("unknown.toml");
        fs::write(&path, "unknown_field = 1\n").unwrap();

        assert!(Config::load(&root, Some(path.as_path())).is_err());
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let (_tmp, root) = temp_root();
        let path = root.join("duration.toml");
        fs::write(&path, "fallback_ttl = \"soon\"\n").unwrap();

        assert!(Config::load(&root, Some(path.as_path())).is_err());
    }
}

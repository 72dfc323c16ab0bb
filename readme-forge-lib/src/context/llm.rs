//! LLM collaborators: repository analysis and README evaluation/generation.

use super::collector::RepositoryContext;
use super::{ApiError, ApiExecutor};
use async_trait::async_trait;
use core::fmt::{Debug, Display, Formatter};
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// What the LLM derived about a repository from its README, languages and tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub project_type: String,
    /// Paths the project starts executing from (`main.rs`, `index.ts`, ...).
    #[serde(default)]
    pub entry_files: Vec<String>,
    /// Paths that explain the project best (manifests, core modules, ...).
    #[serde(default)]
    pub important_files: Vec<String>,
}

/// Input to [`LlmClient::analyze_repository`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalysisRequest<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub readme: &'a str,
    pub languages: &'a BTreeMap<String, u64>,
    pub tree: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeMode {
    Evaluate,
    Generate,
}

impl ReadmeMode {
    /// Name of the push event that carries this mode's result.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Evaluate => "evaluation-complete",
            Self::Generate => "generation-complete",
        }
    }
}

impl Display for ReadmeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Evaluate => f.write_str("evaluate"),
            Self::Generate => f.write_str("generate"),
        }
    }
}

/// Structured README evaluation or generation output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadmeContent {
    /// Generated README text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    /// Evaluation score out of 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn analyze_repository(&self, request: &AnalysisRequest<'_>) -> Result<RepositoryMetadata, ApiError>;

    async fn evaluate_or_generate_readme(
        &self,
        mode: ReadmeMode,
        context: &RepositoryContext,
    ) -> Result<ReadmeContent, ApiError>;
}

#[derive(Serialize)]
struct ReadmeRequest<'a> {
    mode: ReadmeMode,
    context: &'a RepositoryContext,
}

/// Talks to an LLM gateway over JSON: `POST {endpoint}/analyze` and `POST {endpoint}/readme`.
#[derive(Clone)]
pub struct HttpLlmClient {
    executor: ApiExecutor,
    endpoint: Url,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(executor: ApiExecutor, endpoint: &str, api_key: impl Into<String>) -> crate::Result<Self> {
        let mut endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            bail!("LLM endpoint '{endpoint}' cannot carry path segments");
        }

        // a trailing slash makes `join` append rather than replace the last segment
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            executor,
            endpoint,
            api_key: api_key.into(),
        })
    }

    async fn post<B, T>(&self, route: &str, body: &B, operation: &str) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint.join(route).map_err(|e| ApiError::Llm {
            reason: format!("invalid LLM route '{route}': {e}"),
        })?;
        let request = self.executor.post_json(url.as_str(), &self.api_key, body);

        self.executor
            .execute(request, |raw| serde_json::from_str::<T>(raw.body()), operation)
            .await
            .map_err(into_llm_error)
    }
}

impl Debug for HttpLlmClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpLlmClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn analyze_repository(&self, request: &AnalysisRequest<'_>) -> Result<RepositoryMetadata, ApiError> {
        self.post("analyze", request, "analyze repository").await
    }

    async fn evaluate_or_generate_readme(
        &self,
        mode: ReadmeMode,
        context: &RepositoryContext,
    ) -> Result<ReadmeContent, ApiError> {
        let operation = format!("{mode} README");
        self.post("readme", &ReadmeRequest { mode, context }, &operation).await
    }
}

/// Gateway-side failures become `LLM_ERROR`; auth, rate limits and transport keep their codes.
fn into_llm_error(e: ApiError) -> ApiError {
    match e {
        ApiError::MalformedResponse { .. } | ApiError::Upstream { .. } | ApiError::NotFound { .. } => {
            ApiError::Llm { reason: e.to_string() }
        }
        other => other,
    }
}

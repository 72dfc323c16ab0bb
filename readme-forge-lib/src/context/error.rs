//! Error taxonomy for provider, LLM, and background-task failures.

use serde::{Deserialize, Serialize};

/// A classified failure from the provider API, the LLM, or a background task.
///
/// Every variant maps to a stable machine-readable code (see [`ApiError::code`]) so
/// synchronous callers and push/fallback consumers see the same structure.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{operation}: authorization failed")]
    Unauthorized { operation: String },

    #[error("{operation}: access forbidden")]
    Forbidden { operation: String },

    #[error("{operation}: rate limited, retry in {wait_seconds}s")]
    RateLimited { operation: String, wait_seconds: u64 },

    #[error("{operation}: resource not found")]
    NotFound { operation: String },

    #[error("branch '{branch}' not found in {owner}/{repo}")]
    BranchNotFound { owner: String, repo: String, branch: String },

    #[error("{operation}: malformed response: {reason}")]
    MalformedResponse { operation: String, reason: String },

    #[error("{operation}: upstream returned HTTP {status}")]
    Upstream { operation: String, status: u16 },

    #[error("{operation}: transport failure: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("LLM request failed: {reason}")]
    Llm { reason: String },

    #[error("background task failed: {reason}")]
    TaskFailed { reason: String },
}

impl ApiError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BranchNotFound { .. } => "BRANCH_NOT_FOUND",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Llm { .. } => "LLM_ERROR",
            Self::TaskFailed { .. } => "TASK_FAILED",
        }
    }

    /// How long the caller should wait before trying again, when rate limited.
    #[must_use]
    pub const fn wait_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited { wait_seconds, .. } => Some(*wait_seconds),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the HTTP status behind this error, if it came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured form delivered to asynchronous consumers.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            wait_seconds: self.wait_seconds(),
        }
    }
}

/// Serializable error body carried by `error` events and fallback entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<u64>,
}

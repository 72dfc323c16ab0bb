//! Single-shot HTTP execution with typed failure classification.
//!
//! [`ApiExecutor`] performs exactly one request per call and never retries. Failures are
//! classified into [`ApiError`] variants so every call site shares the same rate-limit and
//! authorization semantics. Callers that treat a particular failure as an empty value (a
//! missing README, say) pass a recovery closure to [`ApiExecutor::execute_or_recover`].

use super::ApiError;
use chrono::{DateTime, Utc};
use core::fmt::Display;
use core::time::Duration;
use reqwest::header::{ACCEPT, HeaderMap, LINK, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;

const LOG_TARGET: &str = "  executor";
const USER_AGENT: &str = "readme-forge";

/// Default per-call timeout applied by the underlying HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait applied to rate-limit responses that carry neither `Retry-After` nor a reset header.
pub const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Status, headers, and body text of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl RawResponse {
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: String) -> Self {
        Self { status, headers, body }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The web-linking header, if present.
    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.headers.get(LINK).and_then(|h| h.to_str().ok())
    }
}

/// Executes provider and LLM requests and classifies their outcome.
#[derive(Debug, Clone)]
pub struct ApiExecutor {
    client: reqwest::Client,
}

impl ApiExecutor {
    /// Create an executor whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Build a GET request with bearer auth and an explicit accept header.
    ///
    /// An empty token sends the request anonymously.
    #[must_use]
    pub fn get(&self, url: &str, token: &str, accept: &str) -> RequestBuilder {
        with_auth(self.client.get(url).header(ACCEPT, accept), token)
    }

    /// Build a POST request with a JSON body and bearer auth.
    #[must_use]
    pub fn post_json<B: Serialize + ?Sized>(&self, url: &str, token: &str, body: &B) -> RequestBuilder {
        with_auth(self.client.post(url).header(ACCEPT, "application/json").json(body), token)
    }

    /// Perform the request once and parse a successful response.
    ///
    /// Any failure is logged with `operation` and the raw body, then propagated.
    pub async fn execute<T, P, E>(&self, request: RequestBuilder, parse: P, operation: &str) -> Result<T, ApiError>
    where
        P: FnOnce(&RawResponse) -> Result<T, E>,
        E: Display,
    {
        let raw = self.send(request, operation).await?;

        if !raw.status().is_success() {
            log::warn!(
                target: LOG_TARGET,
                "{operation} failed with HTTP {}: {}",
                raw.status().as_u16(),
                raw.body()
            );
            return Err(classify(operation, &raw, Utc::now()));
        }

        parse(&raw).map_err(|e| {
            log::warn!(target: LOG_TARGET, "{operation} returned an unparseable body ({e}): {}", raw.body());
            ApiError::MalformedResponse {
                operation: operation.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Like [`execute`](Self::execute), but lets `recover` substitute a value for a failure.
    ///
    /// When `recover` returns `None` the original error propagates.
    pub async fn execute_or_recover<T, P, E, R>(
        &self,
        request: RequestBuilder,
        parse: P,
        operation: &str,
        recover: R,
    ) -> Result<T, ApiError>
    where
        P: FnOnce(&RawResponse) -> Result<T, E>,
        E: Display,
        R: FnOnce(&ApiError) -> Option<T>,
    {
        match self.execute(request, parse, operation).await {
            Ok(value) => Ok(value),
            Err(e) => match recover(&e) {
                Some(value) => {
                    log::debug!(target: LOG_TARGET, "{operation}: recovered from {}", e.code());
                    Ok(value)
                }
                None => Err(e),
            },
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<RawResponse, ApiError> {
        let transport = |source: reqwest::Error| {
            log::warn!(target: LOG_TARGET, "{operation} failed in transport: {source:#}");
            ApiError::Transport {
                operation: operation.to_string(),
                source,
            }
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(transport)?;

        Ok(RawResponse::new(status, headers, body))
    }
}

fn with_auth(request: RequestBuilder, token: &str) -> RequestBuilder {
    if token.is_empty() { request } else { request.bearer_auth(token) }
}

/// Map a non-success response onto the error taxonomy.
#[must_use]
pub fn classify(operation: &str, raw: &RawResponse, now: DateTime<Utc>) -> ApiError {
    let operation = operation.to_string();

    match raw.status() {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { operation },
        StatusCode::FORBIDDEN if mentions_rate_limit(raw.body()) => ApiError::RateLimited {
            operation,
            wait_seconds: rate_limit_wait_seconds(raw.headers(), now),
        },
        StatusCode::FORBIDDEN => ApiError::Forbidden { operation },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
            operation,
            wait_seconds: rate_limit_wait_seconds(raw.headers(), now),
        },
        StatusCode::NOT_FOUND => ApiError::NotFound { operation },
        status => ApiError::Upstream {
            operation,
            status: status.as_u16(),
        },
    }
}

fn mentions_rate_limit(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("rate limit") || body.contains("quota")
}

/// Compute how long to wait before the provider accepts requests again.
///
/// `Retry-After` (seconds) wins; otherwise `X-RateLimit-Reset` (Unix seconds) minus `now`;
/// otherwise [`DEFAULT_RATE_LIMIT_WAIT_SECS`].
#[must_use]
pub fn rate_limit_wait_seconds(headers: &HeaderMap, now: DateTime<Utc>) -> u64 {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok()).map(str::trim);

    if let Some(retry_after) = header(RETRY_AFTER.as_str()).and_then(|s| s.parse::<u64>().ok()) {
        return retry_after;
    }

    if let Some(reset) = header(RATE_LIMIT_RESET).and_then(|s| s.parse::<i64>().ok()) {
        return (reset - now.timestamp()).max(0).cast_unsigned();
    }

    DEFAULT_RATE_LIMIT_WAIT_SECS
}

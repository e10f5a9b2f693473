//! Traits and types for HTTP execution

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::ExecutorError;
use crate::task::Task;
use crate::types::{HttpMethod, HttpResponse};

/// A fully resolved HTTP call
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute target URL
    pub url: Url,
    /// JSON payload (query parameters for GET, ignored for DELETE)
    pub body: Option<serde_json::Value>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Per-request timeout; `None` falls back to the executor's default
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request without body, headers or timeout override
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
            headers: HashMap::new(),
            timeout: None,
        }
    }

    /// Resolve a task's request fields against `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::InvalidRequest`] if the resulting URL does not parse.
    pub fn for_task(
        task: &Task,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ExecutorError> {
        Ok(Self {
            method: task.method(),
            url: build_url(base_url, task.endpoint())?,
            body: task.body().cloned(),
            headers: task.headers().clone(),
            timeout: Some(timeout),
        })
    }
}

/// Join a base URL and an endpoint path
///
/// Absolute endpoints (`http://...`) are used as-is. Otherwise the endpoint is
/// appended to the base with exactly one `/` between them, so a base path such
/// as `/v1` is preserved.
pub fn build_url(base_url: &str, endpoint: &str) -> Result<Url, ExecutorError> {
    if let Ok(absolute) = Url::parse(endpoint) {
        if absolute.has_host() {
            return Ok(absolute);
        }
    }

    let joined = if endpoint.is_empty() {
        base_url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    };

    Url::parse(&joined)
        .map_err(|e| ExecutorError::InvalidRequest(format!("invalid URL '{joined}': {e}")))
}

/// Trait for performing a single HTTP call
///
/// Implementations must not retry internally: retries, backoff and accounting
/// belong to [`RetryPolicy`](crate::retry::RetryPolicy). Errors should be
/// classified so that [`IsRetryable`](crate::retry::IsRetryable) gives the right
/// answer: transport failures, timeouts and 5xx are recoverable, malformed
/// requests are permanent.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Perform the call
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutorError`] for transport failures and non-success statuses.
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ExecutorError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Builds the executor owned by one worker
pub trait ExecutorFactory: Send + Sync {
    /// Create the executor for worker `worker_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the executor cannot be constructed; `start()` fails with it.
    fn create(&self, worker_id: usize) -> crate::Result<Arc<dyn HttpExecutor>>;
}

impl<F> ExecutorFactory for F
where
    F: Fn(usize) -> crate::Result<Arc<dyn HttpExecutor>> + Send + Sync,
{
    fn create(&self, worker_id: usize) -> crate::Result<Arc<dyn HttpExecutor>> {
        self(worker_id)
    }
}

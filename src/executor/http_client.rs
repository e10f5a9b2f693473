//! reqwest-based HTTP executor

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{ExecutorFactory, HttpExecutor, HttpRequest};
use crate::config::ApiConfig;
use crate::error::ExecutorError;
use crate::types::{HttpMethod, HttpResponse};

/// HTTP executor backed by a [`reqwest::Client`]
///
/// Body handling follows the method: GET sends a JSON object body as query
/// parameters, POST/PUT/PATCH send it as JSON, DELETE sends no body.
/// Statuses below 400 count as success (redirects are followed by reqwest).
///
/// # Examples
///
/// ```no_run
/// use http_batch::config::ApiConfig;
/// use http_batch::executor::ReqwestExecutor;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = ReqwestExecutor::new(&ApiConfig {
///     base_url: "http://localhost:5000".to_string(),
///     ..Default::default()
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct ReqwestExecutor {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestExecutor {
    /// Build an executor with its own connection pool
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`](crate::Error::Network) if the TLS backend cannot be initialized.
    pub fn new(config: &ApiConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            default_timeout: config.timeout,
        })
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ExecutorError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.clone())
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            match request.method {
                HttpMethod::Get => builder = builder.query(&query_pairs(body)?),
                HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                    builder = builder.json(body)
                }
                HttpMethod::Delete => {
                    tracing::debug!(url = %request.url, "Ignoring body on DELETE request");
                }
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| classify(e, timeout))?;

        if status.is_client_error() || status.is_server_error() {
            let body = (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(ExecutorError::from_status(status.as_u16(), body));
        }

        Ok(HttpResponse {
            status_code: status.as_u16(),
            body: decode_body(&bytes),
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

/// Factory creating one [`ReqwestExecutor`] per worker
#[derive(Clone, Debug)]
pub struct ReqwestExecutorFactory {
    config: ApiConfig,
}

impl ReqwestExecutorFactory {
    /// Create a factory for the given API settings
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl ExecutorFactory for ReqwestExecutorFactory {
    fn create(&self, _worker_id: usize) -> crate::Result<Arc<dyn HttpExecutor>> {
        Ok(Arc::new(ReqwestExecutor::new(&self.config)?))
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> ExecutorError {
    if error.is_timeout() {
        ExecutorError::Timeout(timeout)
    } else {
        ExecutorError::from(error)
    }
}

/// Flatten a JSON object into query parameters
///
/// Strings are sent verbatim, other scalars via their JSON text, nested values
/// as compact JSON. `null` values are skipped.
fn query_pairs(body: &serde_json::Value) -> Result<Vec<(String, String)>, ExecutorError> {
    let object = body.as_object().ok_or_else(|| {
        ExecutorError::InvalidRequest("GET body must be a JSON object of query parameters".into())
    })?;

    Ok(object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect())
}

fn decode_body(bytes: &[u8]) -> Option<serde_json::Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(serde_json::Value::String(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
    }
}

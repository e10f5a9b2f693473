//! Task model: an HTTP request descriptor plus its lifecycle state.
//!
//! Request fields are fixed at construction. Lifecycle fields are only written
//! through crate-private transitions, which keep the invariants:
//! - a terminal task has exactly one of `response` / `error_message`
//! - `attempts` never decreases
//! - `completed_at` is set once, together with the terminal status

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::{HttpMethod, HttpResponse, TaskId, TaskStatus, TaskSummary};

/// One HTTP request and its lifecycle/result state
#[derive(Clone, Debug)]
pub struct Task {
    id: TaskId,
    method: HttpMethod,
    endpoint: String,
    body: Option<serde_json::Value>,
    headers: HashMap<String, String>,
    status: TaskStatus,
    attempts: u32,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    response: Option<HttpResponse>,
}

impl Task {
    /// Create a pending task for `method` on `endpoint`
    ///
    /// # Example
    ///
    /// ```
    /// use http_batch::{HttpMethod, Task, TaskStatus};
    ///
    /// let task = Task::new(HttpMethod::Patch, "/users/1")
    ///     .with_body(serde_json::json!({"status": "active"}))
    ///     .with_header("Authorization", "Bearer token123");
    ///
    /// assert_eq!(task.status(), TaskStatus::Pending);
    /// assert_eq!(task.attempts(), 0);
    /// ```
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            method,
            endpoint: endpoint.into(),
            body: None,
            headers: HashMap::new(),
            status: TaskStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
            response: None,
        }
    }

    /// Builder method to attach a JSON payload
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Builder method to add a header (later values replace earlier ones)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Builder method to add several headers
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Task identifier
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// HTTP method
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Endpoint path, relative to the configured base URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request payload
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Request headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time the task reached a terminal status
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Failure message, set only on failed tasks
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Response, set only on completed tasks
    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Whether the task reached `Completed` or `Failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Serializable snapshot without request body or response payload
    pub fn to_summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.id,
            method: self.method,
            endpoint: self.endpoint.clone(),
            status: self.status,
            attempts: self.attempts,
            created_at: self.created_at,
            completed_at: self.completed_at,
            error_message: self.error_message.clone(),
        }
    }

    /// Move a pending task into `Processing`
    pub(crate) fn mark_processing(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            tracing::warn!(
                task_id = %self.id,
                status = %self.status,
                "Ignoring transition to processing"
            );
            return false;
        }
        self.status = TaskStatus::Processing;
        true
    }

    /// Count a new attempt and return its 1-based number
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Terminal transition to `Completed`
    pub(crate) fn mark_completed(&mut self, response: HttpResponse) -> bool {
        if self.is_terminal() {
            tracing::warn!(task_id = %self.id, status = %self.status, "Task already terminal");
            return false;
        }
        self.status = TaskStatus::Completed;
        self.response = Some(response);
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Terminal transition to `Failed`
    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            tracing::warn!(task_id = %self.id, status = %self.status, "Task already terminal");
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error_message = Some(error.into());
        self.response = None;
        self.completed_at = Some(Utc::now());
        true
    }
}

//! Core types for http-batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// HTTP method of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET (body is sent as query parameters)
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE (no body)
    Delete,
}

impl HttpMethod {
    /// Uppercase method name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(Error::InvalidRequest(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

/// Task lifecycle status
///
/// `Pending → Processing → {Completed, Failed}`. Retries happen inside
/// `Processing` and are only observable through [`Event::TaskRetrying`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, not yet picked up by a worker
    Pending,
    /// Owned by a worker, attempts in progress
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl TaskStatus {
    /// `Completed` and `Failed` are terminal; no transitions leave them
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Successful HTTP response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Decoded body; non-JSON bodies are stored as a JSON string, empty bodies as `None`
    pub body: Option<serde_json::Value>,
}

/// Serializable snapshot of a task, without request or response payloads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task identifier
    pub task_id: TaskId,
    /// HTTP method
    pub method: HttpMethod,
    /// Endpoint path
    pub endpoint: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Attempts made so far
    pub attempts: u32,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message for failed tasks
    pub error_message: Option<String>,
}

/// Aggregate statistics over collected results
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    /// Number of results collected
    pub total_processed: usize,
    /// Number of completed tasks
    pub completed: usize,
    /// Number of failed tasks
    pub failed: usize,
    /// Percentage of completed tasks (0.0 to 100.0; 0.0 when nothing was processed)
    pub success_rate: f64,
    /// Items currently waiting in the intake queue
    pub queue_depth: usize,
}

/// Statistics plus per-task summaries, suitable for writing to disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Aggregate statistics
    pub statistics: BatchStatistics,
    /// One summary per collected task, in completion order
    pub results: Vec<TaskSummary>,
}

impl BatchSummary {
    /// Write the summary as pretty-printed JSON, creating parent directories
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Event emitted during the task and pool lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Worker pool started
    PoolStarted {
        /// Number of workers spawned
        workers: usize,
    },

    /// Task accepted into the intake queue
    TaskQueued {
        /// Task ID
        id: TaskId,
    },

    /// Worker picked up a task
    TaskStarted {
        /// Task ID
        id: TaskId,
        /// Worker index
        worker_id: usize,
    },

    /// An attempt is about to be made
    TaskAttempt {
        /// Task ID
        id: TaskId,
        /// Attempt number (1-based)
        attempt: u32,
    },

    /// An attempt failed with a recoverable error and will be retried
    TaskRetrying {
        /// Task ID
        id: TaskId,
        /// Attempt that just failed
        attempt: u32,
        /// Backoff before the next attempt, in milliseconds
        delay_ms: u64,
        /// Error of the failed attempt
        error: String,
    },

    /// Task completed successfully
    TaskCompleted {
        /// Task ID
        id: TaskId,
        /// Attempts used
        attempts: u32,
        /// HTTP status code of the final response
        status_code: u16,
    },

    /// Task failed permanently or exhausted its attempts
    TaskFailed {
        /// Task ID
        id: TaskId,
        /// Attempts used
        attempts: u32,
        /// Error message
        error: String,
    },

    /// Worker pool stopped
    PoolStopped,
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
    }

    #[test]
    fn http_method_rejects_unknown_verbs() {
        let err = "TRACE".parse::<HttpMethod>().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.to_string().contains("TRACE"));
    }

    #[test]
    fn http_method_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&HttpMethod::Put).unwrap(), "\"PUT\"");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }

    #[test]
    fn task_status_terminality() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert_eq!(
            serde_json::to_string(&TaskStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn task_ids_are_unique_and_parse_back() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<TaskId>().unwrap(), a);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::TaskRetrying {
            id: TaskId::new(),
            attempt: 2,
            delay_ms: 2000,
            error: "server error: HTTP 503".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_retrying");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["delay_ms"], 2000);
    }

    #[tokio::test]
    async fn batch_summary_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("batch_summary.json");

        let summary = BatchSummary {
            statistics: BatchStatistics {
                total_processed: 1,
                completed: 1,
                failed: 0,
                success_rate: 100.0,
                queue_depth: 0,
            },
            results: vec![],
        };
        summary.write_json(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["statistics"]["completed"], 1);
        assert_eq!(parsed["statistics"]["success_rate"], 100.0);
        assert!(raw.contains('\n'), "summary should be pretty-printed");
    }
}

//! Transaction logging
//!
//! One [`TransactionRecord`] is emitted per terminal task outcome (success or
//! final failure). Sinks implement [`TransactionLog`]; recording is
//! fire-and-forget and must never block or fail the task pipeline.
//!
//! - [`FileTransactionLog`]: one pretty-printed JSON file per record
//! - [`NoOpTransactionLog`]: discards records (transaction logs disabled)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio_util::task::TaskTracker;

use crate::error::Result;
use crate::task::Task;
use crate::types::{HttpMethod, HttpResponse, TaskId};

/// Header names whose values are replaced before a record is written
const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

const REDACTED: &str = "[redacted]";

/// Outcome marker of a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// The task completed
    Success,
    /// The task failed permanently or exhausted its attempts
    Failed,
}

/// Request half of a transaction record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestRecord {
    /// HTTP method
    pub method: HttpMethod,
    /// Resolved URL
    pub url: String,
    /// Headers, with credentials redacted
    pub headers: HashMap<String, String>,
    /// Request payload
    pub body: Option<serde_json::Value>,
}

/// Record of one terminal task outcome
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
    /// Task the record belongs to
    pub task_id: TaskId,
    /// The request that was sent
    pub request: RequestRecord,
    /// Final response (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpResponse>,
    /// Final error (failure only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts used
    pub attempts: u32,
    /// Success/failure marker
    pub status: TransactionStatus,
}

impl TransactionRecord {
    /// Record for a task that completed with `response`
    pub fn success(task: &Task, url: &str, response: &HttpResponse) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id: task.id(),
            request: RequestRecord::from_task(task, url),
            response: Some(response.clone()),
            error: None,
            attempts: task.attempts(),
            status: TransactionStatus::Success,
        }
    }

    /// Record for a task that failed with `error`
    pub fn failure(task: &Task, url: &str, error: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id: task.id(),
            request: RequestRecord::from_task(task, url),
            response: None,
            error: Some(error.to_string()),
            attempts: task.attempts(),
            status: TransactionStatus::Failed,
        }
    }

    /// File name used by [`FileTransactionLog`]: `<task_id>_<YYYYmmdd_HHMMSS>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.task_id,
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }
}

impl RequestRecord {
    fn from_task(task: &Task, url: &str) -> Self {
        Self {
            method: task.method(),
            url: url.to_string(),
            headers: redact_headers(task.headers()),
            body: task.body().cloned(),
        }
    }
}

fn redact_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.to_ascii_lowercase();
            if REDACTED_HEADERS.contains(&lower.as_str()) {
                (name.clone(), REDACTED.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Sink for transaction records
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Record one transaction; must return without waiting on I/O
    fn record(&self, record: TransactionRecord);

    /// Wait for records accepted so far to be persisted
    async fn flush(&self) {}

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Transaction log that discards every record
pub struct NoOpTransactionLog;

#[async_trait]
impl TransactionLog for NoOpTransactionLog {
    fn record(&self, _record: TransactionRecord) {}

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Transaction log writing one JSON file per record
///
/// Writes happen on spawned tasks; failures are logged and otherwise ignored.
pub struct FileTransactionLog {
    dir: PathBuf,
    writes: TaskTracker,
}

impl FileTransactionLog {
    /// Create the log, making sure `dir` exists
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            writes: TaskTracker::new(),
        })
    }

    /// Directory records are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TransactionLog for FileTransactionLog {
    fn record(&self, record: TransactionRecord) {
        let path = self.dir.join(record.file_name());

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(task_id = %record.task_id, error = %e, "No runtime, dropping transaction record");
                return;
            }
        };

        self.writes.spawn_on(
            async move {
                let json = match serde_json::to_vec_pretty(&record) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(task_id = %record.task_id, error = %e, "Failed to serialize transaction record");
                        return;
                    }
                };
                if let Err(e) = tokio::fs::write(&path, json).await {
                    tracing::warn!(
                        task_id = %record.task_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to write transaction record"
                    );
                }
            },
            &handle,
        );
    }

    async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

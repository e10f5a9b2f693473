//! Result collector: the single writer of the result list.

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

use super::pending::PendingCounter;
use crate::task::Task;
use crate::types::TaskStatus;

/// Drain the result channel into `results` until every sender is dropped
pub(crate) async fn run_collector(
    mut result_rx: mpsc::UnboundedReceiver<Task>,
    results: Arc<RwLock<Vec<Task>>>,
    results_pending: Arc<PendingCounter>,
) {
    tracing::debug!("Result collector started");
    let mut collected = 0usize;

    while let Some(task) = result_rx.recv().await {
        match task.status() {
            TaskStatus::Completed => tracing::info!(
                task_id = %task.id(),
                attempts = task.attempts(),
                status_code = task.response().map(|r| r.status_code),
                "Task completed"
            ),
            TaskStatus::Failed => tracing::warn!(
                task_id = %task.id(),
                attempts = task.attempts(),
                error = task.error_message().unwrap_or_default(),
                "Task failed"
            ),
            status => tracing::warn!(task_id = %task.id(), %status, "Collected non-terminal task"),
        }

        results.write().await.push(task);
        results_pending.decrement();
        collected += 1;
    }

    tracing::debug!(collected, "Result channel closed, collector exiting");
}

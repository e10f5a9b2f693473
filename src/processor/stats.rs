//! Result snapshots and statistics.

use super::BatchProcessor;
use crate::task::Task;
use crate::types::{BatchStatistics, BatchSummary, TaskStatus, TaskSummary};

impl BatchStatistics {
    /// Count outcomes over `tasks`
    ///
    /// `queue_depth` is left at zero; only the processor knows it.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Completed)
            .count();
        let failed = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Failed)
            .count();
        let total_processed = tasks.len();

        let success_rate = if total_processed == 0 {
            0.0
        } else {
            completed as f64 / total_processed as f64 * 100.0
        };

        Self {
            total_processed,
            completed,
            failed,
            success_rate,
            queue_depth: 0,
        }
    }
}

impl BatchProcessor {
    /// Statistics over the collected results plus the current intake queue depth
    pub async fn get_statistics(&self) -> BatchStatistics {
        let mut stats = {
            let results = self.results.read().await;
            BatchStatistics::from_tasks(&results)
        };
        stats.queue_depth = self.queue_depth().await;
        stats
    }

    /// Items waiting in the intake queue (0 while stopped)
    pub async fn queue_depth(&self) -> usize {
        let pool = self.pool.lock().await;
        pool.as_ref()
            .map(|p| p.intake_tx.max_capacity() - p.intake_tx.capacity())
            .unwrap_or(0)
    }

    /// Snapshot of the collected tasks, in completion order
    pub async fn results(&self) -> Vec<Task> {
        self.results.read().await.clone()
    }

    /// Summaries of the collected tasks, without payloads
    pub async fn summaries(&self) -> Vec<TaskSummary> {
        self.results
            .read()
            .await
            .iter()
            .map(Task::to_summary)
            .collect()
    }

    /// Statistics and summaries in one serializable value
    pub async fn summary(&self) -> BatchSummary {
        BatchSummary {
            statistics: self.get_statistics().await,
            results: self.summaries().await,
        }
    }

    /// Drop all collected results
    pub async fn clear_results(&self) {
        let mut results = self.results.write().await;
        tracing::debug!(cleared = results.len(), "Clearing collected results");
        results.clear();
    }
}

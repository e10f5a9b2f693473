//! Task admission and batch processing.

use tokio::sync::mpsc::error::TrySendError;

use super::{BatchProcessor, QueueItem};
use crate::config::QueueFullPolicy;
use crate::error::{Error, Result};
use crate::task::Task;
use crate::types::{Event, TaskId, TaskStatus};

impl BatchProcessor {
    /// Submit a task to the intake queue
    ///
    /// When the queue is full the call waits for space
    /// ([`QueueFullPolicy::Block`]) or fails immediately
    /// ([`QueueFullPolicy::Reject`]).
    ///
    /// # Errors
    ///
    /// - [`Error::NotRunning`] if the pool is stopped; nothing is enqueued
    /// - [`Error::QueueFull`] if the queue is full under the reject policy
    /// - [`Error::ShuttingDown`] if the pool stopped while waiting for space
    /// - [`Error::InvalidRequest`] if the task is not pending
    pub async fn submit(&self, task: Task) -> Result<TaskId> {
        if !self.is_running() {
            tracing::warn!(task_id = %task.id(), "Rejecting task: batch processor is not running");
            return Err(Error::NotRunning);
        }
        if task.status() != TaskStatus::Pending {
            return Err(Error::InvalidRequest(format!(
                "task {} is already {}",
                task.id(),
                task.status()
            )));
        }

        let intake_tx = {
            let pool = self.pool.lock().await;
            match pool.as_ref() {
                Some(pool) => pool.intake_tx.clone(),
                None => return Err(Error::NotRunning),
            }
        };

        let task_id = task.id();
        let capacity = self.config.queue.queue_capacity;
        let item = QueueItem::Work(Box::new(task));

        // Count before sending so a fast worker cannot acknowledge first
        self.intake_pending.increment();
        let sent = match self.config.queue.full_policy {
            QueueFullPolicy::Block => intake_tx.send(item).await.map_err(|_| Error::ShuttingDown),
            QueueFullPolicy::Reject => intake_tx.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull { capacity },
                TrySendError::Closed(_) => Error::ShuttingDown,
            }),
        };
        if let Err(e) = sent {
            self.intake_pending.decrement();
            tracing::warn!(task_id = %task_id, error = %e, "Task not admitted");
            return Err(e);
        }

        self.event_tx.send(Event::TaskQueued { id: task_id }).ok();
        tracing::debug!(task_id = %task_id, "Task queued");

        Ok(task_id)
    }

    /// Submit tasks in order
    ///
    /// Not atomic: on the first admission error the tasks before it stay queued.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`submit`](Self::submit).
    pub async fn submit_batch(&self, tasks: impl IntoIterator<Item = Task>) -> Result<Vec<TaskId>> {
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(self.submit(task).await?);
        }
        tracing::info!(count = ids.len(), "Submitted batch");
        Ok(ids)
    }

    /// Start the pool if needed, process `tasks` and return all collected results
    ///
    /// Waits until every submitted task has been acknowledged by a worker, then
    /// up to `queue.drain_grace` for the collector to absorb the last results.
    /// The returned snapshot includes results from earlier batches unless
    /// [`clear_results`](Self::clear_results) was called.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be started or a task is not admitted.
    pub async fn process_batch_sync(
        &self,
        tasks: impl IntoIterator<Item = Task>,
    ) -> Result<Vec<Task>> {
        if !self.is_running() {
            self.start().await?;
        }

        let ids = self.submit_batch(tasks).await?;
        tracing::info!(count = ids.len(), "Waiting for batch to drain");

        self.wait_for_drain().await;

        let grace = self.config.queue.drain_grace;
        if tokio::time::timeout(grace, self.results_pending.wait_zero())
            .await
            .is_err()
        {
            tracing::warn!(
                outstanding = self.results_pending.get(),
                grace_ms = grace.as_millis(),
                "Collector did not absorb all results within the grace period"
            );
        }

        Ok(self.results().await)
    }

    /// Wait until every submitted task has been processed and acknowledged
    ///
    /// Returns immediately when nothing is outstanding. `stop()` releases
    /// waiters as well.
    pub async fn wait_for_drain(&self) {
        self.intake_pending.wait_zero().await;
    }
}

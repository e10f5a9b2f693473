//! Startup and shutdown coordination.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::collector::run_collector;
use super::worker::{WorkerContext, run_worker};
use super::{BatchProcessor, QueueItem, WorkerPool};
use crate::error::Result;
use crate::types::Event;

/// Error recorded on tasks still queued when the pool stops
pub(crate) const STOPPED_BEFORE_PROCESSING: &str = "pool stopped before the task was processed";

impl BatchProcessor {
    /// Start the worker pool
    ///
    /// Spawns `queue.num_workers` workers, each with its own executor, plus the
    /// result collector. Calling `start()` on a running pool is a no-op. A
    /// stopped pool can be started again; collected results are kept until
    /// [`clear_results`](Self::clear_results).
    ///
    /// # Errors
    ///
    /// Returns the factory's error if an executor cannot be created. Nothing is
    /// spawned in that case.
    pub async fn start(&self) -> Result<()> {
        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            tracing::info!("Batch processor already running");
            return Ok(());
        }

        let queue = &self.config.queue;

        // Build every executor first so a failure leaves nothing running
        let executors = (0..queue.num_workers)
            .map(|worker_id| self.executor_factory.create(worker_id))
            .collect::<Result<Vec<_>>>()?;

        let (intake_tx, intake_rx) = mpsc::channel(queue.queue_capacity);
        let intake_rx = Arc::new(Mutex::new(intake_rx));
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let interrupt = CancellationToken::new();

        let collector = tokio::spawn(run_collector(
            result_rx,
            self.results.clone(),
            self.results_pending.clone(),
        ));

        let workers = executors
            .into_iter()
            .enumerate()
            .map(|(worker_id, executor)| {
                tokio::spawn(run_worker(WorkerContext {
                    worker_id,
                    executor,
                    retry_policy: self.retry_policy.clone(),
                    transaction_log: self.transaction_log.clone(),
                    event_tx: self.event_tx.clone(),
                    intake_rx: intake_rx.clone(),
                    result_tx: result_tx.clone(),
                    shutdown: shutdown.clone(),
                    interrupt: interrupt.clone(),
                    poll_interval: queue.poll_interval,
                    intake_pending: self.intake_pending.clone(),
                    results_pending: self.results_pending.clone(),
                }))
            })
            .collect::<Vec<_>>();

        let worker_count = workers.len();
        *pool = Some(WorkerPool {
            intake_tx,
            intake_rx,
            result_tx,
            shutdown,
            interrupt,
            workers,
            collector,
        });
        self.running.store(true, Ordering::SeqCst);

        self.event_tx
            .send(Event::PoolStarted {
                workers: worker_count,
            })
            .ok();
        tracing::info!(
            workers = worker_count,
            queue_capacity = queue.queue_capacity,
            "Batch processor started"
        );

        Ok(())
    }

    /// Stop the worker pool
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks and signals the workers
    /// 2. Waits for each worker (bounded by `queue.worker_join_timeout`); a worker
    ///    that overruns has its in-flight task interrupted, failed and collected
    /// 3. Fails every task still queued and hands it to the collector
    /// 4. Waits for the collector to absorb all results
    /// 5. Flushes the transaction log
    ///
    /// In-flight attempts are allowed to finish within the join timeout.
    /// Calling `stop()` twice, or before `start()`, is a no-op.
    pub async fn stop(&self) {
        let pool = self.pool.lock().await.take();
        let Some(pool) = pool else {
            tracing::debug!("Batch processor not running, nothing to stop");
            return;
        };

        tracing::info!("Initiating batch processor shutdown");

        // 1. Stop accepting new tasks
        self.running.store(false, Ordering::SeqCst);
        pool.shutdown.cancel();
        for _ in 0..pool.workers.len() {
            // Best effort: a full queue is handled by the cancellation token
            if pool.intake_tx.try_send(QueueItem::Stop).is_err() {
                break;
            }
        }

        // 2. Wait for workers; interrupt the ones that overrun
        let join_timeout = self.config.queue.worker_join_timeout;
        for (worker_id, mut handle) in pool.workers.into_iter().enumerate() {
            match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    tracing::warn!(worker_id, error = %e, "Worker ended abnormally");
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        worker_id,
                        timeout_ms = join_timeout.as_millis(),
                        "Timeout waiting for worker, interrupting in-flight tasks"
                    );
                    pool.interrupt.cancel();
                }
            }

            // The interrupted task is failed and forwarded by its worker
            match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(worker_id, error = %e, "Worker ended abnormally");
                }
                Err(_) => {
                    tracing::error!(worker_id, "Worker ignored interruption, aborting it");
                    handle.abort();
                }
            }
        }

        // 3. Fail whatever is still queued
        let abandoned = {
            let mut intake_rx = pool.intake_rx.lock().await;
            intake_rx.close();

            let mut abandoned = 0usize;
            while let Some(item) = intake_rx.recv().await {
                let QueueItem::Work(task) = item else {
                    continue;
                };
                let mut task = *task;
                task.mark_failed(STOPPED_BEFORE_PROCESSING);
                self.event_tx
                    .send(Event::TaskFailed {
                        id: task.id(),
                        attempts: task.attempts(),
                        error: STOPPED_BEFORE_PROCESSING.to_string(),
                    })
                    .ok();

                self.results_pending.increment();
                if pool.result_tx.send(task).is_err() {
                    self.results_pending.decrement();
                }
                self.intake_pending.decrement();
                abandoned += 1;
            }
            abandoned
        };
        if abandoned > 0 {
            tracing::warn!(abandoned, "Failed tasks still queued at shutdown");
        }

        // 4. Close the result channel and wait for the collector
        drop(pool.result_tx);
        drop(pool.intake_tx);
        let mut collector = pool.collector;
        match tokio::time::timeout(join_timeout, &mut collector).await {
            Ok(Ok(())) => tracing::debug!("Result collector finished"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Result collector ended abnormally"),
            Err(_) => {
                tracing::warn!("Timeout waiting for result collector, aborting it");
                collector.abort();
            }
        }

        // Anything still counted belonged to an aborted task
        if self.intake_pending.get() > 0 {
            tracing::warn!(
                lost = self.intake_pending.get(),
                "Tasks lost with aborted workers"
            );
        }
        self.intake_pending.reset();
        self.results_pending.reset();

        // 5. Flush transaction records
        if tokio::time::timeout(join_timeout, self.transaction_log.flush())
            .await
            .is_err()
        {
            tracing::warn!(
                log = self.transaction_log.name(),
                "Timeout flushing transaction log"
            );
        }

        self.event_tx.send(Event::PoolStopped).ok();
        tracing::info!("Batch processor stopped");
    }
}

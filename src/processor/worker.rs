//! Worker loop that pulls tasks from the intake queue and runs them through the retry policy.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::QueueItem;
use super::pending::PendingCounter;
use crate::executor::HttpExecutor;
use crate::retry::RetryPolicy;
use crate::task::Task;
use crate::transaction_log::{TransactionLog, TransactionRecord};
use crate::types::Event;

/// Everything one worker needs, moved into its spawned task
pub(crate) struct WorkerContext {
    pub(crate) worker_id: usize,
    pub(crate) executor: Arc<dyn HttpExecutor>,
    pub(crate) retry_policy: Arc<RetryPolicy>,
    pub(crate) transaction_log: Arc<dyn TransactionLog>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) intake_rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
    pub(crate) result_tx: mpsc::UnboundedSender<Task>,
    pub(crate) shutdown: CancellationToken,
    /// Cancelled by `stop()` once a worker overruns its join timeout
    pub(crate) interrupt: CancellationToken,
    pub(crate) poll_interval: Duration,
    pub(crate) intake_pending: Arc<PendingCounter>,
    pub(crate) results_pending: Arc<PendingCounter>,
}

/// Run one worker until a stop sentinel, a closed intake queue or shutdown
pub(crate) async fn run_worker(ctx: WorkerContext) {
    let worker_id = ctx.worker_id;
    tracing::debug!(worker_id, executor = ctx.executor.name(), "Worker started");

    loop {
        if ctx.shutdown.is_cancelled() {
            tracing::debug!(worker_id, "Shutdown requested");
            break;
        }

        // The bounded wait covers both the shared lock and the receive
        let next = tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => {
                tracing::debug!(worker_id, "Shutdown requested");
                break;
            }
            next = tokio::time::timeout(ctx.poll_interval, async {
                ctx.intake_rx.lock().await.recv().await
            }) => next,
        };

        let task = match next {
            Err(_) => continue,
            Ok(None) => {
                tracing::debug!(worker_id, "Intake queue closed");
                break;
            }
            Ok(Some(QueueItem::Stop)) => {
                tracing::debug!(worker_id, "Received stop sentinel");
                break;
            }
            Ok(Some(QueueItem::Work(task))) => *task,
        };

        process_task(&ctx, task).await;
    }

    tracing::debug!(worker_id, "Worker exited");
}

/// Process one task and hand it to the collector; never lets a fault escape
async fn process_task(ctx: &WorkerContext, mut task: Task) {
    let worker_id = ctx.worker_id;
    let task_id = task.id();

    ctx.event_tx
        .send(Event::TaskStarted {
            id: task_id,
            worker_id,
        })
        .ok();
    tracing::debug!(worker_id, task_id = %task_id, method = %task.method(), endpoint = task.endpoint(), "Processing task");

    let result = AssertUnwindSafe(ctx.retry_policy.execute_until(
        &mut task,
        ctx.executor.as_ref(),
        ctx.transaction_log.as_ref(),
        &ctx.event_tx,
        &ctx.interrupt,
    ))
    .catch_unwind()
    .await;

    match result {
        Ok(outcome) => {
            tracing::debug!(
                worker_id,
                task_id = %task_id,
                success = outcome.is_success(),
                attempts = outcome.attempts(),
                "Task finished"
            );
        }
        Err(panic) => {
            let message = format!("worker fault: {}", panic_message(panic.as_ref()));
            tracing::error!(worker_id, task_id = %task_id, error = %message, "Worker panicked while processing task");
            if task.mark_failed(message.clone()) {
                let url = ctx.retry_policy.task_url(&task);
                ctx.transaction_log
                    .record(TransactionRecord::failure(&task, &url, &message));
                ctx.event_tx
                    .send(Event::TaskFailed {
                        id: task_id,
                        attempts: task.attempts(),
                        error: message,
                    })
                    .ok();
            } else {
                tracing::warn!(
                    worker_id,
                    task_id = %task_id,
                    status = %task.status(),
                    "Fault after the task reached its outcome, keeping it"
                );
            }
        }
    }

    ctx.results_pending.increment();
    if ctx.result_tx.send(task).is_err() {
        ctx.results_pending.decrement();
        tracing::warn!(worker_id, task_id = %task_id, "Result channel closed, dropping result");
    }
    ctx.intake_pending.decrement();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

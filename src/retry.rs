//! Retry logic with backoff
//!
//! [`RetryPolicy`] runs one task against an [`HttpExecutor`] with bounded
//! attempts. Recoverable failures (see [`IsRetryable`]) are retried after a
//! backoff delay; permanent failures end the task after the current attempt.
//! The policy never raises: the final state is written onto the task and
//! returned as a [`TaskOutcome`].
//!
//! # Example
//!
//! ```no_run
//! use http_batch::config::{ApiConfig, RetryConfig};
//! use http_batch::executor::ReqwestExecutor;
//! use http_batch::retry::RetryPolicy;
//! use http_batch::transaction_log::NoOpTransactionLog;
//! use http_batch::{HttpMethod, Task};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiConfig::default();
//! let policy = RetryPolicy::new(RetryConfig::default(), &api);
//! let executor = ReqwestExecutor::new(&api)?;
//! let (events, _rx) = tokio::sync::broadcast::channel(16);
//!
//! let mut task = Task::new(HttpMethod::Get, "/users/1");
//! let outcome = policy
//!     .execute(&mut task, &executor, &NoOpTransactionLog, &events)
//!     .await;
//! println!("{:?} after {} attempts", task.status(), outcome.attempts());
//! # Ok(())
//! # }
//! ```

use rand::Rng;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{ApiConfig, BackoffStrategy, RetryConfig};
use crate::error::ExecutorError;
use crate::executor::{HttpExecutor, HttpRequest, build_url};
use crate::task::Task;
use crate::transaction_log::{TransactionLog, TransactionRecord};
use crate::types::{Event, TaskStatus, duration_millis};

/// Failure recorded when the pool interrupts a request that is still running
pub(crate) const STOPPED_DURING_REQUEST: &str = "pool stopped while the request was in flight";
/// Failure recorded when the pool interrupts a task waiting out its backoff
pub(crate) const STOPPED_DURING_BACKOFF: &str = "pool stopped during retry backoff";

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection resets, 5xx) should return `true`.
/// Permanent failures (malformed request, 4xx) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ExecutorError {
    fn is_retryable(&self) -> bool {
        match self {
            ExecutorError::Timeout(_) => true,
            ExecutorError::Connection(_) => true,
            ExecutorError::Transport(_) => true,
            ExecutorError::ServerError { .. } => true,
            // Request Timeout and Too Many Requests are the only transient 4xx
            ExecutorError::ClientError { status, .. } => matches!(status, 408 | 429),
            ExecutorError::InvalidRequest(_) => false,
        }
    }
}

/// Result of running a task through the retry policy
#[must_use]
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The task completed
    Completed {
        /// Attempts used
        attempts: u32,
        /// Final HTTP status
        status_code: u16,
    },
    /// The task failed
    Failed {
        /// Attempts used
        attempts: u32,
        /// Error of the last attempt
        error: ExecutorError,
        /// True when the error was recoverable and the attempt budget ran out
        retries_exhausted: bool,
    },
    /// The pool was stopped before the task could finish; the task failed
    Interrupted {
        /// Attempts started before the interruption
        attempts: u32,
    },
    /// The task was already terminal; nothing was executed
    AlreadyTerminal {
        /// Status the task was found in
        status: TaskStatus,
    },
}

impl TaskOutcome {
    /// Whether the task ended `Completed`
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Completed { .. }
                | TaskOutcome::AlreadyTerminal {
                    status: TaskStatus::Completed
                }
        )
    }

    /// Attempts used by this run
    pub fn attempts(&self) -> u32 {
        match self {
            TaskOutcome::Completed { attempts, .. }
            | TaskOutcome::Failed { attempts, .. }
            | TaskOutcome::Interrupted { attempts } => *attempts,
            TaskOutcome::AlreadyTerminal { .. } => 0,
        }
    }
}

/// Bounded retry with backoff around a single task
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    base_url: String,
    timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy from retry settings and the target API
    pub fn new(config: RetryConfig, api: &ApiConfig) -> Self {
        Self {
            config,
            base_url: api.base_url.clone(),
            timeout: api.timeout,
        }
    }

    /// Total attempts allowed per task (at least 1)
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based), before jitter
    ///
    /// Linear: `retry_delay * attempt`. Exponential:
    /// `retry_delay * multiplier^(attempt - 1)`. Both are capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base = self.config.retry_delay;
        let delay = match self.config.backoff {
            BackoffStrategy::Linear => base.saturating_mul(attempt),
            BackoffStrategy::Exponential { multiplier } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                Duration::try_from_secs_f64(base.as_secs_f64() * multiplier.powi(exponent))
                    .unwrap_or(self.config.max_delay)
            }
        };
        delay.min(self.config.max_delay)
    }

    /// Absolute URL a task is sent to, or the plain concatenation if it cannot be built
    pub(crate) fn task_url(&self, task: &Task) -> String {
        build_url(&self.base_url, task.endpoint())
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base_url, task.endpoint()))
    }

    /// Run `task` to a terminal status
    ///
    /// Each attempt increments the task's attempt counter before the call. On
    /// success the response is stored; on a recoverable error the policy sleeps
    /// [`backoff_delay`](Self::backoff_delay) and tries again while attempts
    /// remain; otherwise the error message is stored. Exactly one transaction
    /// record is emitted per terminal outcome.
    pub async fn execute(
        &self,
        task: &mut Task,
        executor: &dyn HttpExecutor,
        transaction_log: &dyn TransactionLog,
        events: &broadcast::Sender<Event>,
    ) -> TaskOutcome {
        self.execute_until(task, executor, transaction_log, events, &CancellationToken::new())
            .await
    }

    /// Same as [`execute`](Self::execute), giving up once `interrupt` is cancelled
    ///
    /// Cancellation drops a running request or cuts a backoff short. The task
    /// is then failed, recorded and reported like any other failure, and the
    /// outcome is [`TaskOutcome::Interrupted`].
    pub async fn execute_until(
        &self,
        task: &mut Task,
        executor: &dyn HttpExecutor,
        transaction_log: &dyn TransactionLog,
        events: &broadcast::Sender<Event>,
        interrupt: &CancellationToken,
    ) -> TaskOutcome {
        if task.is_terminal() {
            tracing::warn!(task_id = %task.id(), status = %task.status(), "Task already terminal, skipping");
            return TaskOutcome::AlreadyTerminal {
                status: task.status(),
            };
        }
        if task.status() == TaskStatus::Pending {
            task.mark_processing();
        }

        let request = match HttpRequest::for_task(task, &self.base_url, self.timeout) {
            Ok(request) => request,
            Err(error) => {
                // Counts as the single attempt of a permanently failing task
                task.begin_attempt();
                let url = self.task_url(task);
                return self.fail(task, &url, error, transaction_log, events);
            }
        };
        let url = request.url.to_string();
        let max_attempts = self.max_attempts();

        loop {
            if interrupt.is_cancelled() {
                return self.interrupted(task, &url, STOPPED_DURING_REQUEST, transaction_log, events);
            }

            let attempt = task.begin_attempt();
            events
                .send(Event::TaskAttempt {
                    id: task.id(),
                    attempt,
                })
                .ok();
            tracing::info!(
                task_id = %task.id(),
                attempt,
                method = %request.method,
                url = %url,
                executor = executor.name(),
                "Executing request"
            );

            let result = tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    return self.interrupted(task, &url, STOPPED_DURING_REQUEST, transaction_log, events);
                }
                result = executor.execute(&request) => result,
            };

            match result {
                Ok(response) => {
                    if attempt > 1 {
                        tracing::info!(task_id = %task.id(), attempts = attempt, "Request succeeded after retry");
                    }
                    transaction_log.record(TransactionRecord::success(task, &url, &response));
                    let status_code = response.status_code;
                    task.mark_completed(response);
                    events
                        .send(Event::TaskCompleted {
                            id: task.id(),
                            attempts: attempt,
                            status_code,
                        })
                        .ok();
                    return TaskOutcome::Completed {
                        attempts: attempt,
                        status_code,
                    };
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    let delay = if self.config.jitter {
                        add_jitter(delay)
                    } else {
                        delay
                    };

                    tracing::warn!(
                        task_id = %task.id(),
                        error = %error,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Request failed, retrying"
                    );
                    events
                        .send(Event::TaskRetrying {
                            id: task.id(),
                            attempt,
                            delay_ms: duration_millis(delay),
                            error: error.to_string(),
                        })
                        .ok();

                    tokio::select! {
                        biased;
                        _ = interrupt.cancelled() => {
                            return self.interrupted(
                                task,
                                &url,
                                STOPPED_DURING_BACKOFF,
                                transaction_log,
                                events,
                            );
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) => {
                    return self.fail(task, &url, error, transaction_log, events);
                }
            }
        }
    }

    fn fail(
        &self,
        task: &mut Task,
        url: &str,
        error: ExecutorError,
        transaction_log: &dyn TransactionLog,
        events: &broadcast::Sender<Event>,
    ) -> TaskOutcome {
        let retries_exhausted = error.is_retryable();
        let message = error.to_string();
        let attempts = task.attempts();

        if retries_exhausted {
            tracing::error!(
                task_id = %task.id(),
                error = %error,
                attempts,
                "Request failed after all attempts exhausted"
            );
        } else {
            tracing::error!(
                task_id = %task.id(),
                error = %error,
                attempts,
                "Request failed with non-retryable error"
            );
        }

        task.mark_failed(message.clone());
        transaction_log.record(TransactionRecord::failure(task, url, &message));
        events
            .send(Event::TaskFailed {
                id: task.id(),
                attempts,
                error: message,
            })
            .ok();

        TaskOutcome::Failed {
            attempts,
            error,
            retries_exhausted,
        }
    }

    fn interrupted(
        &self,
        task: &mut Task,
        url: &str,
        reason: &str,
        transaction_log: &dyn TransactionLog,
        events: &broadcast::Sender<Event>,
    ) -> TaskOutcome {
        let attempts = task.attempts();
        tracing::warn!(task_id = %task.id(), attempts, reason, "Task interrupted");

        task.mark_failed(reason);
        transaction_log.record(TransactionRecord::failure(task, url, reason));
        events
            .send(Event::TaskFailed {
                id: task.id(),
                attempts,
                error: reason.to_string(),
            })
            .ok();

        TaskOutcome::Interrupted { attempts }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay.
/// This means the actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    delay.mul_f64(1.0 + jitter_factor)
}

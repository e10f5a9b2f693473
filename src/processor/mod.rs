//! Batch processor split into focused submodules.
//!
//! The `BatchProcessor` struct and its methods are organized by domain:
//! - [`lifecycle`] - Worker pool startup and shutdown
//! - [`submit`] - Task admission and batch processing
//! - [`stats`] - Result snapshots and statistics
//! - [`worker`] - Worker loop and fault isolation
//! - [`collector`] - Result collection
//! - [`pending`] - Drain tracking counters

mod collector;
mod lifecycle;
mod pending;
mod stats;
mod submit;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::executor::{ExecutorFactory, ReqwestExecutorFactory};
use crate::retry::RetryPolicy;
use crate::task::Task;
use crate::transaction_log::{FileTransactionLog, NoOpTransactionLog, TransactionLog};
use crate::types::Event;

use pending::PendingCounter;

/// Element of the intake queue
#[derive(Debug)]
pub(crate) enum QueueItem {
    /// A task to process
    Work(Box<Task>),
    /// Sentinel telling one worker to exit
    Stop,
}

/// Channels and handles of one running pool (recreated on every `start()`)
pub(crate) struct WorkerPool {
    /// Submitters clone this to enqueue work
    pub(crate) intake_tx: mpsc::Sender<QueueItem>,
    /// Shared by all workers; locked for the duration of one bounded receive
    pub(crate) intake_rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
    /// Workers forward finished tasks here
    pub(crate) result_tx: mpsc::UnboundedSender<Task>,
    /// Cancelled by `stop()`
    pub(crate) shutdown: CancellationToken,
    /// Cancelled by `stop()` when a worker overruns the join timeout
    pub(crate) interrupt: CancellationToken,
    pub(crate) workers: Vec<JoinHandle<()>>,
    pub(crate) collector: JoinHandle<()>,
}

/// Bounded-concurrency batch HTTP processor (cloneable - all fields are Arc-wrapped)
///
/// Tasks are submitted to a bounded intake queue, executed by a fixed pool of
/// workers with retry and backoff, and collected into a result list that can
/// be read as a snapshot at any time.
///
/// # Example
///
/// ```no_run
/// use http_batch::{BatchProcessor, Config, HttpMethod, Task};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = BatchProcessor::new(Config::default()).await?;
///
/// let tasks = (1..=10).map(|i| Task::new(HttpMethod::Get, format!("/users/{i}")));
/// let results = processor.process_batch_sync(tasks).await?;
/// println!("{} results", results.len());
///
/// let stats = processor.get_statistics().await;
/// println!("success rate {:.1}%", stats.success_rate);
///
/// processor.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BatchProcessor {
    /// Configuration (validated at construction)
    pub(crate) config: Arc<Config>,
    /// Retry policy shared by all workers
    pub(crate) retry_policy: Arc<RetryPolicy>,
    /// Builds one executor per worker at `start()`
    pub(crate) executor_factory: Arc<dyn ExecutorFactory>,
    /// Sink for one record per terminal task outcome
    pub(crate) transaction_log: Arc<dyn TransactionLog>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Running pool, `None` while stopped
    pub(crate) pool: Arc<Mutex<Option<WorkerPool>>>,
    /// Whether the pool accepts work
    pub(crate) running: Arc<AtomicBool>,
    /// Collected tasks in completion order (single writer: the collector)
    pub(crate) results: Arc<RwLock<Vec<Task>>>,
    /// Tasks submitted but not yet acknowledged by a worker
    pub(crate) intake_pending: Arc<PendingCounter>,
    /// Tasks forwarded by workers but not yet absorbed by the collector
    pub(crate) results_pending: Arc<PendingCounter>,
}

impl BatchProcessor {
    /// Create a processor using the reqwest executor
    ///
    /// Transaction records go to `<log_dir>/transactions/` when
    /// `logging.enable_transaction_logs` is set and are discarded otherwise.
    /// The pool is not started; call [`start`](Self::start) or
    /// [`process_batch_sync`](Self::process_batch_sync).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for invalid settings and
    /// an I/O error if the transaction log directory cannot be created.
    pub async fn new(config: Config) -> Result<Self> {
        Self::builder(config).build().await
    }

    /// Start building a processor with custom collaborators
    pub fn builder(config: Config) -> BatchProcessorBuilder {
        BatchProcessorBuilder {
            config,
            executor_factory: None,
            transaction_log: None,
        }
    }

    /// Subscribe to task and pool events
    ///
    /// Each subscriber receives events independently. Slow subscribers may miss
    /// events once the channel buffer (1000 events) is full.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether the pool is running and accepting work
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Builder for [`BatchProcessor`]
///
/// ```no_run
/// use std::sync::Arc;
/// use http_batch::executor::{HttpExecutor, ReqwestExecutor};
/// use http_batch::transaction_log::NoOpTransactionLog;
/// use http_batch::{BatchProcessor, Config};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let api = config.api.clone();
/// let processor = BatchProcessor::builder(config)
///     .with_executor_factory(
///         move |_worker_id: usize| -> http_batch::Result<Arc<dyn HttpExecutor>> {
///             Ok(Arc::new(ReqwestExecutor::new(&api)?))
///         },
///     )
///     .with_transaction_log(NoOpTransactionLog)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct BatchProcessorBuilder {
    config: Config,
    executor_factory: Option<Arc<dyn ExecutorFactory>>,
    transaction_log: Option<Arc<dyn TransactionLog>>,
}

impl BatchProcessorBuilder {
    /// Use a custom executor factory instead of the reqwest one
    pub fn with_executor_factory(mut self, factory: impl ExecutorFactory + 'static) -> Self {
        self.executor_factory = Some(Arc::new(factory));
        self
    }

    /// Use a custom transaction log instead of the configured one
    pub fn with_transaction_log(mut self, log: impl TransactionLog + 'static) -> Self {
        self.transaction_log = Some(Arc::new(log));
        self
    }

    /// Validate the configuration and build the processor
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for invalid settings and
    /// an I/O error if the transaction log directory cannot be created.
    pub async fn build(self) -> Result<BatchProcessor> {
        let config = self.config;
        config.validate()?;

        let executor_factory: Arc<dyn ExecutorFactory> = match self.executor_factory {
            Some(factory) => factory,
            None => Arc::new(ReqwestExecutorFactory::new(config.api.clone())),
        };

        let transaction_log: Arc<dyn TransactionLog> = match self.transaction_log {
            Some(log) => log,
            None if config.logging.enable_transaction_logs => {
                let dir = config.logging.transactions_dir();
                tracing::debug!(dir = %dir.display(), "Writing transaction logs");
                Arc::new(FileTransactionLog::new(dir).await?)
            }
            None => Arc::new(NoOpTransactionLog),
        };

        let retry_policy = Arc::new(RetryPolicy::new(config.retry.clone(), &config.api));

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            base_url = %config.api.base_url,
            workers = config.queue.num_workers,
            queue_capacity = config.queue.queue_capacity,
            max_retries = config.retry.max_retries,
            transaction_log = transaction_log.name(),
            "Batch processor created"
        );

        Ok(BatchProcessor {
            config: Arc::new(config),
            retry_policy,
            executor_factory,
            transaction_log,
            event_tx,
            pool: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            results: Arc::new(RwLock::new(Vec::new())),
            intake_pending: Arc::new(PendingCounter::new()),
            results_pending: Arc::new(PendingCounter::new()),
        })
    }
}

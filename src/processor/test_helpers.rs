//! Shared test helpers: a scripted executor, a recording transaction log and
//! processor constructors.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{ApiConfig, Config, LoggingConfig, QueueConfig, RetryConfig};
use crate::error::ExecutorError;
use crate::executor::{HttpExecutor, HttpRequest};
use crate::processor::BatchProcessor;
use crate::transaction_log::{TransactionLog, TransactionRecord};
use crate::types::HttpResponse;

/// How the mock answers each call
#[derive(Clone, Debug)]
pub(crate) enum Behavior {
    /// 200 with `{"url": ...}`
    Succeed,
    /// 503 for the first `n` calls per URL, then 200
    FailFirst(u32),
    /// Always 503
    AlwaysFail,
    /// Always the given 4xx
    Permanent(u16),
    /// Panic when the URL contains the marker, succeed otherwise
    PanicOn(&'static str),
}

/// Scripted executor; clones share counters so one instance can serve every worker
#[derive(Clone)]
pub(crate) struct MockExecutor {
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicU32>,
    calls_by_url: Arc<Mutex<HashMap<String, u32>>>,
    last_url: Arc<Mutex<Option<String>>>,
}

impl MockExecutor {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicU32::new(0)),
            calls_by_url: Arc::new(Mutex::new(HashMap::new())),
            last_url: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn always_ok() -> Self {
        Self::new(Behavior::Succeed)
    }

    pub(crate) fn fail_then_succeed(failures: u32) -> Self {
        Self::new(Behavior::FailFirst(failures))
    }

    pub(crate) fn always_fail() -> Self {
        Self::new(Behavior::AlwaysFail)
    }

    pub(crate) fn permanent_failure(status: u16) -> Self {
        Self::new(Behavior::Permanent(status))
    }

    pub(crate) fn panic_on(marker: &'static str) -> Self {
        Self::new(Behavior::PanicOn(marker))
    }

    /// Sleep before answering each call
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Total calls across all clones
    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }

    /// Factory handing every worker a clone of this mock
    pub(crate) fn factory(
        &self,
    ) -> impl Fn(usize) -> crate::Result<Arc<dyn HttpExecutor>> + Send + Sync + 'static {
        let mock = self.clone();
        move |_worker_id: usize| -> crate::Result<Arc<dyn HttpExecutor>> {
            Ok(Arc::new(mock.clone()))
        }
    }
}

#[async_trait]
impl HttpExecutor for MockExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ExecutorError> {
        let url = request.url.to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.clone());
        let call = {
            let mut by_url = self.calls_by_url.lock().unwrap();
            let count = by_url.entry(url.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let ok = HttpResponse {
            status_code: 200,
            body: Some(serde_json::json!({ "url": url })),
        };
        match &self.behavior {
            Behavior::Succeed => Ok(ok),
            Behavior::FailFirst(n) if call <= *n => Err(ExecutorError::from_status(503, None)),
            Behavior::FailFirst(_) => Ok(ok),
            Behavior::AlwaysFail => Err(ExecutorError::from_status(503, None)),
            Behavior::Permanent(status) => Err(ExecutorError::from_status(*status, None)),
            Behavior::PanicOn(marker) if url.contains(marker) => {
                panic!("mock executor exploded on {url}")
            }
            Behavior::PanicOn(_) => Ok(ok),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Transaction log keeping records in memory; clones share the list
#[derive(Clone, Default)]
pub(crate) struct RecordingLog {
    records: Arc<Mutex<Vec<TransactionRecord>>>,
}

impl RecordingLog {
    pub(crate) fn records(&self) -> Vec<TransactionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionLog for RecordingLog {
    fn record(&self, record: TransactionRecord) {
        self.records.lock().unwrap().push(record);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Small, fast configuration for pool tests
pub(crate) fn test_config() -> Config {
    Config {
        api: ApiConfig {
            base_url: "http://mock.test".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        },
        retry: RetryConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        },
        queue: QueueConfig {
            num_workers: 2,
            queue_capacity: 100,
            poll_interval: Duration::from_millis(20),
            worker_join_timeout: Duration::from_secs(2),
            drain_grace: Duration::from_millis(500),
            ..Default::default()
        },
        logging: LoggingConfig {
            enable_transaction_logs: false,
            ..Default::default()
        },
    }
}

/// Processor wired to `mock` and a recording log, not yet started
pub(crate) async fn create_test_processor_with(
    config: Config,
    mock: &MockExecutor,
) -> (BatchProcessor, RecordingLog) {
    let log = RecordingLog::default();
    let processor = BatchProcessor::builder(config)
        .with_executor_factory(mock.factory())
        .with_transaction_log(log.clone())
        .build()
        .await
        .unwrap();
    (processor, log)
}

/// [`create_test_processor_with`] using [`test_config`]
pub(crate) async fn create_test_processor(mock: &MockExecutor) -> (BatchProcessor, RecordingLog) {
    create_test_processor_with(test_config(), mock).await
}

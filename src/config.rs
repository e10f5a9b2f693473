//! Configuration types for http-batch
//!
//! Configuration is a plain value handed to [`BatchProcessor`](crate::BatchProcessor)
//! at construction. Nothing here is global: tests and callers build their own
//! [`Config`] and the processor keeps it behind an `Arc`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Target API settings used to build each request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL prepended to every task endpoint (default: "https://api.example.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent by the default executor
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_api_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// How the delay between attempts grows
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Attempt `n` waits `retry_delay * n` (default)
    #[default]
    Linear,
    /// Attempt `n` waits `retry_delay * multiplier^(n-1)`
    Exponential {
        /// Growth factor applied after each attempt
        multiplier: f64,
    },
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per task, first attempt included (default: 3)
    ///
    /// A task's attempt counter never exceeds this value. Zero is rejected by
    /// [`Config::validate`].
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts (default: 1 second)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub retry_delay: Duration,

    /// Backoff growth strategy (default: linear)
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            backoff: BackoffStrategy::default(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

/// What `submit` does when the intake queue is at capacity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    /// Wait until a worker frees a slot (default)
    #[default]
    Block,
    /// Fail immediately with [`Error::QueueFull`]
    Reject,
}

/// Worker pool and queue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent workers (default: 5)
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Intake queue capacity (default: 1000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Behavior of `submit` on a full queue
    #[serde(default)]
    pub full_policy: QueueFullPolicy,

    /// Maximum time a worker waits on the intake queue before re-checking shutdown (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Maximum time `stop()` waits for each worker to exit (default: 5 seconds)
    #[serde(default = "default_worker_join_timeout", with = "duration_serde")]
    pub worker_join_timeout: Duration,

    /// Maximum time `process_batch_sync` waits for the collector after the queue drains (default: 500ms)
    #[serde(default = "default_drain_grace", with = "duration_serde")]
    pub drain_grace: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            queue_capacity: default_queue_capacity(),
            full_policy: QueueFullPolicy::default(),
            poll_interval: default_poll_interval(),
            worker_join_timeout: default_worker_join_timeout(),
            drain_grace: default_drain_grace(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used by binaries that install a subscriber (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for transaction logs (default: "logs")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Write one JSON file per terminal task outcome (default: true)
    #[serde(default = "default_true")]
    pub enable_transaction_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: default_log_dir(),
            enable_transaction_logs: true,
        }
    }
}

impl LoggingConfig {
    /// Directory holding per-transaction JSON files
    pub fn transactions_dir(&self) -> PathBuf {
        self.log_dir.join("transactions")
    }
}

/// Main configuration for [`BatchProcessor`](crate::BatchProcessor)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry and backoff settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool and intake queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Build a configuration from the process environment on top of the defaults
    ///
    /// Recognized variables: `API_BASE_URL`, `API_TIMEOUT_SECS`, `MAX_RETRIES`,
    /// `RETRY_DELAY_MS`, `NUM_WORKERS`, `QUEUE_MAX_SIZE`, `LOG_LEVEL`, `LOG_DIR`,
    /// `ENABLE_TRANSACTION_LOGS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("API_BASE_URL") {
            config.api.base_url = url;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "API_TIMEOUT_SECS")? {
            config.api.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var(&lookup, "MAX_RETRIES")? {
            config.retry.max_retries = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RETRY_DELAY_MS")? {
            config.retry.retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "NUM_WORKERS")? {
            config.queue.num_workers = n;
        }
        if let Some(n) = parse_var(&lookup, "QUEUE_MAX_SIZE")? {
            config.queue.queue_capacity = n;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Some(dir) = lookup("LOG_DIR") {
            config.logging.log_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = parse_flag(&lookup, "ENABLE_TRANSACTION_LOGS")? {
            config.logging.enable_transaction_logs = enabled;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the processor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.num_workers == 0 {
            return Err(Error::config(
                "queue.num_workers",
                "at least one worker is required",
            ));
        }
        if self.queue.queue_capacity == 0 {
            return Err(Error::config(
                "queue.queue_capacity",
                "queue capacity must be greater than zero",
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(Error::config(
                "retry.max_retries",
                "max_retries counts attempts and must be at least 1",
            ));
        }
        if let BackoffStrategy::Exponential { multiplier } = self.retry.backoff {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(Error::config(
                    "retry.backoff",
                    format!("exponential multiplier must be >= 1.0, got {multiplier}"),
                ));
            }
        }
        url::Url::parse(&self.api.base_url).map_err(|e| {
            Error::config(
                "api.base_url",
                format!("invalid base URL '{}': {}", self.api.base_url, e),
            )
        })?;
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(key, format!("cannot parse '{raw}': {e}"))),
    }
}

/// Boolean variable: `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`, any case
fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::config(
            key,
            format!("cannot parse '{raw}': expected true/false, 1/0, yes/no or on/off"),
        )),
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://api.example.com".to_string()
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("http-batch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_num_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_worker_join_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_drain_grace() -> Duration {
    Duration::from_millis(500)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_true() -> bool {
    true
}

// Durations are stored as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use http_batch::config::{ApiConfig, Config, LoggingConfig, QueueConfig, RetryConfig};
use wiremock::MockServer;

/// Configuration pointing at `server` with short delays and logs under `log_dir`
pub fn config_for(server: &MockServer, log_dir: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
        retry: RetryConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(20),
            ..Default::default()
        },
        queue: QueueConfig {
            num_workers: 5,
            poll_interval: Duration::from_millis(20),
            worker_join_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        logging: LoggingConfig {
            log_dir: log_dir.to_path_buf(),
            enable_transaction_logs: true,
            ..Default::default()
        },
    }
}

/// Read every JSON file in `dir`
pub fn read_json_files(dir: &Path) -> Vec<serde_json::Value> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|entry| std::fs::read_to_string(entry.path()).ok())
        .filter_map(|raw| serde_json::from_str(&raw).ok())
        .collect()
}

//! # http-batch
//!
//! Bounded-concurrency batch processor for HTTP requests against a JSON API.
//!
//! ## Design Philosophy
//!
//! http-batch is designed to be:
//! - **Bounded** - A fixed worker pool pulls from a bounded intake queue
//! - **Resilient** - Transient failures are retried with backoff, permanent ones fail fast
//! - **Accountable** - Every task ends `Completed` or `Failed` and is collected for statistics
//! - **Event-driven** - Consumers subscribe to task and pool events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use http_batch::{BatchProcessor, Config, HttpMethod, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.base_url = "http://localhost:5000".to_string();
//!
//!     let processor = BatchProcessor::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = processor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let tasks = vec![
//!         Task::new(HttpMethod::Get, "/users/1"),
//!         Task::new(HttpMethod::Patch, "/users/2")
//!             .with_body(serde_json::json!({"status": "active"})),
//!     ];
//!     let results = processor.process_batch_sync(tasks).await?;
//!     println!("{} tasks processed", results.len());
//!
//!     processor.stop().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// HTTP execution boundary
pub mod executor;
/// Batch processor (decomposed into focused submodules)
pub mod processor;
/// Retry logic with backoff
pub mod retry;
/// Task model
pub mod task;
/// Transaction logging
pub mod transaction_log;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{BackoffStrategy, Config, QueueFullPolicy};
pub use error::{Error, ExecutorError, Result};
pub use processor::{BatchProcessor, BatchProcessorBuilder};
pub use retry::{IsRetryable, RetryPolicy, TaskOutcome};
pub use task::Task;
pub use types::{
    BatchStatistics, BatchSummary, Event, HttpMethod, HttpResponse, TaskId, TaskStatus,
    TaskSummary,
};

/// Run the processor until a termination signal arrives, then stop it.
///
/// Starts the pool if it is not running yet. On shutdown, queued tasks are
/// failed and in-flight attempts finish (see [`BatchProcessor::stop`]).
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to whichever handler registers.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use http_batch::{BatchProcessor, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let processor = BatchProcessor::new(Config::default()).await?;
///
///     // Feed work from elsewhere
///     let feeder = processor.clone();
///     tokio::spawn(async move {
///         let _ = feeder
///             .submit(http_batch::Task::new(http_batch::HttpMethod::Get, "/health"))
///             .await;
///     });
///
///     run_with_shutdown(processor).await?;
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// Returns an error if the pool has to be started and cannot be.
pub async fn run_with_shutdown(processor: BatchProcessor) -> Result<()> {
    if !processor.is_running() {
        processor.start().await?;
    }
    wait_for_signal().await;
    tracing::info!("Shutdown signal received, stopping batch processor");
    processor.stop().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register both signal handlers, waiting on the remaining one");
            only.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    } else {
        tracing::info!("Received Ctrl+C signal");
    }
}

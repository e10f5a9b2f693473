//! Batch processing example
//!
//! This example demonstrates the core functionality of http-batch:
//! - Loading configuration from the environment (and an optional `.env` file)
//! - Creating a processor and subscribing to events
//! - Processing a mixed batch of GET and PATCH tasks
//! - Writing statistics and per-task summaries to `<log_dir>/batch_summary.json`
//!
//! Run against a local API:
//!
//! ```text
//! API_BASE_URL=http://localhost:5000 cargo run --example batch
//! ```

use http_batch::{BatchProcessor, Config, Event, HttpMethod, Task};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional .env file; real environment variables take precedence
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // RUST_LOG overrides LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let summary_path = config.logging.log_dir.join("batch_summary.json");
    let processor = BatchProcessor::new(config).await?;

    // Subscribe to events
    let mut events = processor.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::TaskRetrying {
                    id,
                    attempt,
                    delay_ms,
                    error,
                } => {
                    println!("↻ {id}: attempt {attempt} failed ({error}), retrying in {delay_ms}ms");
                }
                Event::TaskCompleted {
                    id, status_code, ..
                } => {
                    println!("✓ {id}: HTTP {status_code}");
                }
                Event::TaskFailed { id, error, .. } => {
                    println!("✗ {id}: {error}");
                }
                _ => {}
            }
        }
    });

    let mut tasks = Vec::new();
    for i in 0..10 {
        tasks.push(
            Task::new(HttpMethod::Get, format!("/users/{i}"))
                .with_header("Authorization", "Bearer token123"),
        );
    }
    for i in 0..5 {
        tasks.push(
            Task::new(HttpMethod::Patch, format!("/users/{i}"))
                .with_body(serde_json::json!({"status": "active", "updated": true}))
                .with_header("Authorization", "Bearer token123"),
        );
    }

    tracing::info!(count = tasks.len(), "Processing batch");
    let outcome = processor.process_batch_sync(tasks).await;

    // Always stop the pool, even if the batch was not fully admitted
    let summary = processor.summary().await;
    processor.stop().await;
    outcome?;

    println!(
        "\nProcessed {} tasks: {} completed, {} failed ({:.1}% success)",
        summary.statistics.total_processed,
        summary.statistics.completed,
        summary.statistics.failed,
        summary.statistics.success_rate
    );

    summary.write_json(&summary_path).await?;
    println!("Summary written to {}", summary_path.display());

    Ok(())
}

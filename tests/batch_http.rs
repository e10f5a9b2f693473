//! End-to-end tests of the batch processor against a mock HTTP API
//!
//! These tests drive the public API only: a real reqwest executor talks to a
//! wiremock server, and transaction logs are written to a temporary directory.

mod common;

use common::{config_for, read_json_files};
use http_batch::{BatchProcessor, HttpMethod, Task, TaskStatus};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn mixed_batch_completes_and_writes_transaction_logs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/users/\d+$"))
        .and(header("authorization", "Bearer token123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "User"})))
        .expect(10)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"^/users/\d+$"))
        .and(body_json(json!({"status": "active", "updated": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "active"})))
        .expect(5)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let processor = BatchProcessor::new(config_for(&server, dir.path()))
        .await
        .unwrap();

    let mut tasks: Vec<Task> = (0..10)
        .map(|i| {
            Task::new(HttpMethod::Get, format!("/users/{i}"))
                .with_header("Authorization", "Bearer token123")
        })
        .collect();
    tasks.extend((0..5).map(|i| {
        Task::new(HttpMethod::Patch, format!("/users/{i}"))
            .with_body(json!({"status": "active", "updated": true}))
            .with_header("Authorization", "Bearer token123")
    }));

    let results = processor.process_batch_sync(tasks).await.unwrap();
    processor.stop().await;

    assert_eq!(results.len(), 15);
    assert!(results.iter().all(|t| t.status() == TaskStatus::Completed));
    assert!(results.iter().all(|t| t.attempts() == 1));

    let stats = processor.get_statistics().await;
    assert_eq!(stats.completed, 15);
    assert_eq!(stats.success_rate, 100.0);

    // stop() flushes the transaction log
    let records = read_json_files(&dir.path().join("transactions"));
    assert_eq!(records.len(), 15);
    for record in &records {
        assert_eq!(record["status"], "success");
        assert_eq!(record["request"]["headers"]["Authorization"], "[redacted]");
    }
}

#[tokio::test]
async fn service_unavailable_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": "Service temporarily unavailable"})),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let processor = BatchProcessor::new(config_for(&server, dir.path()))
        .await
        .unwrap();

    let results = processor
        .process_batch_sync(vec![Task::new(HttpMethod::Get, "/users/1")])
        .await
        .unwrap();
    processor.stop().await;

    let task = &results[0];
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.attempts(), 3);
    assert_eq!(task.response().unwrap().body, Some(json!({"id": 1})));
}

#[tokio::test]
async fn client_errors_fail_fast_but_rate_limits_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1000"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "User not found"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let processor = BatchProcessor::new(config_for(&server, dir.path()))
        .await
        .unwrap();

    let results = processor
        .process_batch_sync(vec![
            Task::new(HttpMethod::Get, "/users/1000"),
            Task::new(HttpMethod::Get, "/limited"),
        ])
        .await
        .unwrap();
    processor.stop().await;

    let not_found = results.iter().find(|t| t.endpoint() == "/users/1000").unwrap();
    assert_eq!(not_found.status(), TaskStatus::Failed);
    assert_eq!(not_found.attempts(), 1);

    let limited = results.iter().find(|t| t.endpoint() == "/limited").unwrap();
    assert_eq!(limited.status(), TaskStatus::Failed);
    assert_eq!(limited.attempts(), 3);

    let stats = processor.get_statistics().await;
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.success_rate, 0.0);

    let records = read_json_files(&dir.path().join("transactions"));
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["status"] == "failed"));
}

#[tokio::test]
async fn batch_summary_round_trips_through_disk() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server, dir.path());
    config.logging.enable_transaction_logs = false;
    let processor = BatchProcessor::new(config).await.unwrap();

    processor
        .process_batch_sync((1..=3).map(|i| Task::new(HttpMethod::Delete, format!("/users/{i}"))))
        .await
        .unwrap();
    let summary = processor.summary().await;
    processor.stop().await;

    let path = dir.path().join("batch_summary.json");
    summary.write_json(&path).await.unwrap();

    let parsed: http_batch::BatchSummary =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed.statistics.completed, 3);
    assert_eq!(parsed.results.len(), 3);
    assert!(parsed.results.iter().all(|r| r.method == HttpMethod::Delete));
    assert!(!dir.path().join("transactions").exists());
}

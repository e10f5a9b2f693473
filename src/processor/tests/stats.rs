use super::*;

#[tokio::test]
async fn statistics_start_empty() {
    let mock = MockExecutor::always_ok();
    let (processor, _log) = create_test_processor(&mock).await;

    let stats = processor.get_statistics().await;
    assert_eq!(stats.total_processed, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.queue_depth, 0);
    assert!(processor.results().await.is_empty());
}

#[tokio::test]
async fn mixed_outcomes_are_counted() {
    let mock = MockExecutor::panic_on("explode");
    let (processor, _log) = create_test_processor(&mock).await;

    let tasks = vec![
        Task::new(HttpMethod::Get, "/users/1"),
        Task::new(HttpMethod::Get, "/users/2"),
        Task::new(HttpMethod::Get, "/users/3"),
        Task::new(HttpMethod::Get, "/explode"),
    ];
    processor.process_batch_sync(tasks).await.unwrap();

    let stats = processor.get_statistics().await;
    assert_eq!(stats.total_processed, 4);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success_rate, 75.0);
    processor.stop().await;
}

#[tokio::test]
async fn summary_matches_results() {
    let mock = MockExecutor::always_ok();
    let (processor, _log) = create_test_processor(&mock).await;
    processor.process_batch_sync(get_tasks(3)).await.unwrap();

    let summary = processor.summary().await;
    assert_eq!(summary.statistics.total_processed, 3);
    assert_eq!(summary.results.len(), 3);

    let results = processor.results().await;
    for (task, entry) in results.iter().zip(&summary.results) {
        assert_eq!(task.id(), entry.task_id);
        assert_eq!(entry.status, TaskStatus::Completed);
        assert_eq!(entry.attempts, 1);
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch_summary.json");
    summary.write_json(&path).await.unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed["results"].as_array().unwrap().len(), 3);
    processor.stop().await;
}

#[tokio::test]
async fn results_are_snapshots() {
    let mock = MockExecutor::always_ok();
    let (processor, _log) = create_test_processor(&mock).await;

    let first = processor.process_batch_sync(get_tasks(2)).await.unwrap();
    processor.process_batch_sync(get_tasks(2)).await.unwrap();

    assert_eq!(first.len(), 2, "earlier snapshot is unaffected");
    assert_eq!(processor.results().await.len(), 4);
    processor.stop().await;
}

#[tokio::test]
async fn clear_results_resets_statistics() {
    let mock = MockExecutor::always_ok();
    let (processor, _log) = create_test_processor(&mock).await;
    processor.process_batch_sync(get_tasks(2)).await.unwrap();

    processor.clear_results().await;

    assert!(processor.results().await.is_empty());
    assert_eq!(processor.get_statistics().await.total_processed, 0);
    processor.stop().await;
}

use std::time::{Duration, Instant};

use super::test_helpers::*;
use crate::config::{self, QueueFullPolicy};
use crate::error::Error;
use crate::task::Task;
use crate::transaction_log::TransactionStatus;
use crate::types::{Event, HttpMethod, TaskStatus};

mod stats;

fn get_tasks(n: usize) -> Vec<Task> {
    (1..=n)
        .map(|i| Task::new(HttpMethod::Get, format!("/users/{i}")))
        .collect()
}

//! Mock callback notifier for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::callback::Notifier;
use crate::task::Task;

/// Mock implementation of the [`Notifier`] trait.
///
/// Records every notified task so tests can assert the exactly-once
/// hand-off without relying on timing.
#[derive(Default)]
pub struct MockNotifier {
    notified: RwLock<Vec<Task>>,
}

impl MockNotifier {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// All tasks notified so far, in order.
    pub async fn notified(&self) -> Vec<Task> {
        self.notified.read().await.clone()
    }

    /// How many times a given task id was notified.
    pub async fn count_for(&self, task_id: &str) -> usize {
        self.notified
            .read()
            .await
            .iter()
            .filter(|t| t.id == task_id)
            .count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, task: &Task) {
        self.notified.write().await.push(task.clone());
    }
}

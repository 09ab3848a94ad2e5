//! Task storage trait and related types.

use thiserror::Error;

use super::{Task, TaskPayload, TaskResult};

/// Error type for task store operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Cannot perform the operation in the task's current state.
    #[error("cannot {operation} task {task_id}: current state is {current_state}")]
    InvalidState {
        task_id: String,
        current_state: String,
        operation: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Request to create a new task.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    /// Kind-specific payload, including portal credentials.
    pub payload: TaskPayload,
    /// Destination for the final notification.
    pub callback_url: String,
}

/// Filter for querying tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Filter by state (stable string form, e.g. "pending").
    pub state: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TaskFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            state: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by state.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for task storage backends.
///
/// The store exclusively owns the task lifecycle. Workers acquire a logical
/// lease on one attempt through [`TaskStore::begin_attempt`] and may only
/// finish it through [`TaskStore::complete`] or [`TaskStore::fail`].
pub trait TaskStore: Send + Sync {
    /// Create a new task in the Pending state.
    ///
    /// Once this returns, the task is durable and is guaranteed to reach a
    /// terminal state and trigger exactly one callback attempt sequence.
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError>;

    /// Get a task by ID.
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError>;

    /// List tasks matching the filter, most recently created first.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError>;

    /// Count tasks matching the filter.
    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError>;

    /// Atomically claim the lease for execution attempt `attempt`.
    ///
    /// Succeeds only when the task is Pending or Running *and* its
    /// `attempt_count` equals `attempt - 1`; the task then moves to Running
    /// with `attempt_count = attempt` and the updated task is returned.
    ///
    /// Returns `Ok(None)` when the claim loses: the task is terminal, or
    /// another worker already executed this delivery (at-least-once
    /// redelivery). Callers must no-op in that case.
    fn begin_attempt(&self, id: &str, attempt: u32) -> Result<Option<Task>, TaskError>;

    /// Transition Running -> Succeeded with the final result.
    fn complete(&self, id: &str, result: TaskResult) -> Result<Task, TaskError>;

    /// Transition Running -> Failed with the final error.
    fn fail(&self, id: &str, error: &str) -> Result<Task, TaskError>;
}

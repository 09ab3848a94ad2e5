//! In-memory task store, used by tests and the `memory` database backend.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use super::{
    CreateTaskRequest, Task, TaskError, TaskFilter, TaskResult, TaskState, TaskStore,
};

/// In-memory task store. Not durable; state is lost on restart.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemoryTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError> {
        let now = Utc::now();
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            payload: request.payload,
            callback_url: request.callback_url,
            state: TaskState::Pending,
            attempt_count: 0,
            last_error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };

        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.get(id).cloned())
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let tasks = self.tasks.lock().unwrap();

        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|t| match filter.state {
                Some(ref state) => t.state.as_str() == state,
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .filter(|t| match filter.state {
                Some(ref state) => t.state.as_str() == state,
                None => true,
            })
            .count() as i64)
    }

    fn begin_attempt(&self, id: &str, attempt: u32) -> Result<Option<Task>, TaskError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        let claimable = matches!(task.state, TaskState::Pending | TaskState::Running)
            && task.attempt_count == attempt.saturating_sub(1);
        if !claimable {
            return Ok(None);
        }

        task.state = TaskState::Running;
        task.attempt_count = attempt;
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    fn complete(&self, id: &str, result: TaskResult) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        if task.state != TaskState::Running {
            return Err(TaskError::InvalidState {
                task_id: id.to_string(),
                current_state: task.state.to_string(),
                operation: "complete".to_string(),
            });
        }

        task.state = TaskState::Succeeded;
        task.result = Some(result);
        task.last_error = None;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    fn fail(&self, id: &str, error: &str) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        if task.state.is_terminal() {
            return Err(TaskError::InvalidState {
                task_id: id.to_string(),
                current_state: task.state.to_string(),
                operation: "fail".to_string(),
            });
        }

        task.state = TaskState::Failed;
        task.last_error = Some(error.to_string());
        task.result = None;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

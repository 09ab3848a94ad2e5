//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    CreateTaskRequest, Task, TaskError, TaskFilter, TaskPayload, TaskResult, TaskState, TaskStore,
};

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Create a new SQLite task store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(|e| TaskError::Storage(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(|e| TaskError::Storage(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                callback_url TEXT NOT NULL,
                state TEXT NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                result TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks(state);
            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at DESC);
            "#,
        )
        .map_err(|e| TaskError::Storage(e.to_string()))?;

        Ok(())
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let id: String = row.get(0)?;
        let payload_json: String = row.get(1)?;
        let callback_url: String = row.get(2)?;
        let state_str: String = row.get(3)?;
        let attempt_count: u32 = row.get(4)?;
        let last_error: Option<String> = row.get(5)?;
        let result_json: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        let payload: TaskPayload = serde_json::from_str(&payload_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let state = match state_str.as_str() {
            "pending" => TaskState::Pending,
            "running" => TaskState::Running,
            "succeeded" => TaskState::Succeeded,
            _ => TaskState::Failed,
        };

        let result: Option<TaskResult> =
            result_json.and_then(|json| serde_json::from_str(&json).ok());

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Task {
            id,
            payload,
            callback_url,
            state,
            attempt_count,
            last_error,
            result,
            created_at,
            updated_at,
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Option<Task>, TaskError> {
        conn.query_row(
            "SELECT id, payload, callback_url, state, attempt_count, last_error, result,
                    created_at, updated_at
             FROM tasks WHERE id = ?1",
            params![id],
            Self::row_to_task,
        )
        .optional()
        .map_err(|e| TaskError::Storage(e.to_string()))
    }

    /// Map a zero-row CAS update to the right error: missing task or wrong state.
    fn cas_miss(conn: &Connection, id: &str, operation: &str) -> TaskError {
        match Self::get_locked(conn, id) {
            Ok(Some(task)) => TaskError::InvalidState {
                task_id: id.to_string(),
                current_state: task.state.to_string(),
                operation: operation.to_string(),
            },
            Ok(None) => TaskError::NotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let payload_json = serde_json::to_string(&request.payload)
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        conn.execute(
            "INSERT INTO tasks (id, payload, callback_url, state, attempt_count,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            params![
                id,
                payload_json,
                request.callback_url,
                TaskState::Pending.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskError::Storage(e.to_string()))?;

        Ok(Task {
            id,
            payload: request.payload,
            callback_url: request.callback_url,
            state: TaskState::Pending,
            attempt_count: 0,
            last_error: None,
            result: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::get_locked(&conn, id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT id, payload, callback_url, state, attempt_count, last_error, result,
                    created_at, updated_at
             FROM tasks",
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref state) = filter.state {
            sql.push_str(" WHERE state = ?");
            bound.push(Box::new(state.clone()));
        }

        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
        bound.push(Box::new(filter.limit));
        bound.push(Box::new(filter.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(bound.iter().map(|p| p.as_ref())),
                Self::row_to_task,
            )
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| TaskError::Storage(e.to_string()))
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        let conn = self.conn.lock().unwrap();

        match filter.state {
            Some(ref state) => conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE state = ?1",
                params![state],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0)),
        }
        .map_err(|e| TaskError::Storage(e.to_string()))
    }

    fn begin_attempt(&self, id: &str, attempt: u32) -> Result<Option<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        // Lease guard: one UPDATE doubles as the compare-and-swap. A duplicate
        // delivery of an already-executed attempt fails the attempt_count
        // check; a terminal task fails the state check.
        let changed = conn
            .execute(
                "UPDATE tasks
                 SET state = ?1, attempt_count = ?2, updated_at = ?3
                 WHERE id = ?4
                   AND state IN ('pending', 'running')
                   AND attempt_count = ?5",
                params![
                    TaskState::Running.as_str(),
                    attempt,
                    Utc::now().to_rfc3339(),
                    id,
                    attempt.saturating_sub(1),
                ],
            )
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        if changed == 0 {
            // Lost the claim, or the task does not exist at all.
            return match Self::get_locked(&conn, id)? {
                Some(_) => Ok(None),
                None => Err(TaskError::NotFound(id.to_string())),
            };
        }

        Self::get_locked(&conn, id)?
            .ok_or_else(|| TaskError::Storage(format!("task {id} vanished after claim")))
            .map(Some)
    }

    fn complete(&self, id: &str, result: TaskResult) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let result_json =
            serde_json::to_string(&result).map_err(|e| TaskError::Storage(e.to_string()))?;

        let changed = conn
            .execute(
                "UPDATE tasks
                 SET state = ?1, result = ?2, last_error = NULL, updated_at = ?3
                 WHERE id = ?4 AND state = 'running'",
                params![
                    TaskState::Succeeded.as_str(),
                    result_json,
                    Utc::now().to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        if changed == 0 {
            return Err(Self::cas_miss(&conn, id, "complete"));
        }

        Self::get_locked(&conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    fn fail(&self, id: &str, error: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                "UPDATE tasks
                 SET state = ?1, last_error = ?2, result = NULL, updated_at = ?3
                 WHERE id = ?4 AND state IN ('pending', 'running')",
                params![
                    TaskState::Failed.as_str(),
                    error,
                    Utc::now().to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        if changed == 0 {
            return Err(Self::cas_miss(&conn, id, "fail"));
        }

        Self::get_locked(&conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))
    }
}

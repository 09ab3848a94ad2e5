//! Task model and storage for the scrape/order pipeline.

mod memory_store;
mod sqlite_store;
mod store;
mod types;

pub use memory_store::MemoryTaskStore;
pub use sqlite_store::SqliteTaskStore;
pub use store::{CreateTaskRequest, TaskError, TaskFilter, TaskStore};
pub use types::{
    Credentials, LineItem, Task, TaskKind, TaskPayload, TaskResult, TaskState,
};

pub mod callback;
pub mod config;
pub mod credentials;
pub mod metrics;
pub mod queue;
pub mod task;
pub mod testing;
pub mod upstream;
pub mod worker;

pub use callback::{CallbackPayload, HttpNotifier, Notifier};
pub use config::{
    load_config, load_config_from_str, validate_config, CallbackConfig, Config, ConfigError,
    DatabaseBackend, DatabaseConfig, SanitizedConfig, ServerConfig, UpstreamConfig, WorkerConfig,
};
pub use credentials::CredentialBroker;
pub use queue::{Delivery, MemoryTaskQueue, QueueError, TaskQueue};
pub use task::{
    CreateTaskRequest, MemoryTaskStore, SqliteTaskStore, Task, TaskError, TaskFilter, TaskKind,
    TaskPayload, TaskResult, TaskState, TaskStore,
};
pub use upstream::{PortalClient, UpstreamClient, UpstreamError};
pub use worker::{resume_interrupted_tasks, WorkerPool};

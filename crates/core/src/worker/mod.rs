//! Task execution workers.

mod backoff;
mod pool;

pub use backoff::retry_delay;
pub use pool::{resume_interrupted_tasks, WorkerPool};

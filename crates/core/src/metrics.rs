//! Prometheus metrics for the task pipeline.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

/// Tasks that reached Succeeded, by kind.
pub static TASKS_SUCCEEDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("botica_tasks_succeeded_total", "Tasks completed successfully"),
        &["kind"], // "scrape", "order"
    )
    .unwrap()
});

/// Tasks that reached Failed, by kind and cause.
pub static TASKS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("botica_tasks_failed_total", "Tasks that failed permanently"),
        &["kind", "cause"], // cause: "permanent", "exhausted"
    )
    .unwrap()
});

/// Execution attempts that were re-queued for retry.
pub static TASK_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("botica_task_retries_total", "Task attempts re-queued after a retryable failure").unwrap()
});

/// Duplicate queue deliveries that lost the lease CAS and no-oped.
pub static DUPLICATE_DELIVERIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "botica_duplicate_deliveries_total",
        "Queue deliveries skipped because the attempt was already claimed",
    )
    .unwrap()
});

/// Callback delivery sequences that exhausted their retries.
pub static CALLBACK_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "botica_callback_failures_total",
        "Callback deliveries abandoned after exhausting retries",
    )
    .unwrap()
});

/// Register all metrics with a registry. Safe to call once at startup.
pub fn register_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(TASKS_SUCCEEDED.clone()))?;
    registry.register(Box::new(TASKS_FAILED.clone()))?;
    registry.register(Box::new(TASK_RETRIES.clone()))?;
    registry.register(Box::new(DUPLICATE_DELIVERIES.clone()))?;
    registry.register(Box::new(CALLBACK_FAILURES.clone()))?;
    Ok(())
}

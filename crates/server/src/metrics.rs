//! Prometheus metrics for the intake API.
//!
//! Pipeline metrics (attempts, retries, callbacks) live in botica-core and
//! are registered into the same registry here.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use botica_core::task::TaskFilter;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Tasks accepted at intake, by kind.
pub static TASKS_ACCEPTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("botica_tasks_accepted_total", "Tasks accepted at intake"),
        &["kind"],
    )
    .unwrap()
});

/// Requests rejected by intake validation, by endpoint.
pub static INTAKE_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "botica_intake_rejections_total",
            "Requests rejected by intake validation",
        ),
        &["endpoint"],
    )
    .unwrap()
});

/// Tasks by current state (collected on scrape).
pub static TASKS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("botica_tasks_by_state", "Current task count by state"),
        &["state"],
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(TASKS_ACCEPTED.clone())).unwrap();
    registry
        .register(Box::new(INTAKE_REJECTIONS.clone()))
        .unwrap();
    registry.register(Box::new(TASKS_BY_STATE.clone())).unwrap();

    botica_core::metrics::register_metrics(registry).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh the per-state task gauges from the store.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    for state_name in ["pending", "running", "succeeded", "failed"] {
        let filter = TaskFilter::new().with_state(state_name);
        if let Ok(count) = state.store().count(&filter) {
            TASKS_BY_STATE.with_label_values(&[state_name]).set(count);
        }
    }
}

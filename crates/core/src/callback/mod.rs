//! Callback notifier: delivers final task results to the caller's URL.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CallbackConfig;
use crate::metrics;
use crate::task::{Task, TaskResult, TaskState};

/// JSON body POSTed to the caller's `callback_url`.
///
/// The body is identical on every delivery attempt, so deliveries are
/// idempotent from the caller's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    /// The task this notification is about.
    pub task_id: String,
    /// "succeeded" or "failed".
    pub status: String,
    /// Final result, present iff the task succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// Error description, present iff the task failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task reached its terminal state.
    pub completed_at: DateTime<Utc>,
}

impl CallbackPayload {
    /// Build the payload for a terminal task.
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            status: match task.state {
                TaskState::Succeeded => "succeeded".to_string(),
                _ => "failed".to_string(),
            },
            result: task.result.clone(),
            error: task.last_error.clone(),
            completed_at: task.updated_at,
        }
    }
}

/// Trait for callback delivery.
///
/// The worker pool calls [`Notifier::notify`] exactly once per task, after
/// the task reaches a terminal state; the exactly-once guarantee lives in
/// the pool's hand-off, not here.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the final notification for a terminal task.
    async fn notify(&self, task: &Task);
}

/// HTTP notifier with its own bounded retry policy.
///
/// Delivery retries are independent of the task's internal attempt counter.
/// After exhausting retries the failure is logged; the task stays in its
/// terminal state regardless.
pub struct HttpNotifier {
    client: Client,
    config: CallbackConfig,
}

impl HttpNotifier {
    /// Create a notifier from config.
    pub fn new(config: CallbackConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;
        Ok(Self { client, config })
    }

    async fn deliver_once(&self, url: &str, payload: &CallbackPayload) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {status}"))
        }
    }
}

/// Delay after failed delivery attempt `attempt` (1-based): exponential, capped.
pub fn delivery_delay(attempt: u32, config: &CallbackConfig) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let delay_ms = config
        .base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(config.max_delay_ms);
    Duration::from_millis(delay_ms)
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, task: &Task) {
        let payload = CallbackPayload::for_task(task);
        let url = &task.callback_url;

        for attempt in 1..=self.config.max_attempts {
            match self.deliver_once(url, &payload).await {
                Ok(()) => {
                    debug!(
                        "Delivered callback for task {} to {} (attempt {})",
                        task.id, url, attempt
                    );
                    return;
                }
                Err(reason) if attempt < self.config.max_attempts => {
                    let delay = delivery_delay(attempt, &self.config);
                    warn!(
                        "Callback delivery for task {} failed ({}), retrying in {:?}",
                        task.id, reason, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(reason) => {
                    // Best-effort: the task keeps its terminal state.
                    metrics::CALLBACK_FAILURES.inc();
                    warn!(
                        "Callback delivery for task {} to {} abandoned after {} attempts: {}",
                        task.id, url, attempt, reason
                    );
                }
            }
        }
    }
}

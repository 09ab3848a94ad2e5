//! Worker pool: executes scrape/order tasks with retry and callback hand-off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::callback::Notifier;
use crate::config::WorkerConfig;
use crate::credentials::CredentialBroker;
use crate::metrics;
use crate::queue::{Delivery, TaskQueue};
use crate::task::{Task, TaskError, TaskFilter, TaskPayload, TaskResult, TaskStore};
use crate::upstream::{UpstreamClient, UpstreamError};

use super::backoff::retry_delay;

/// The worker pool - drives tasks from the queue to a terminal state.
///
/// Each worker pulls deliveries independently. The store's lease CAS
/// guarantees one execution per attempt under at-least-once redelivery,
/// and a terminal task is handed to the notifier exactly once, by the
/// worker that performed the terminal transition.
pub struct WorkerPool {
    config: WorkerConfig,
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
    broker: Arc<CredentialBroker>,
    upstream: Arc<dyn UpstreamClient>,
    notifier: Arc<dyn Notifier>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn TaskStore>,
        queue: Arc<dyn TaskQueue>,
        broker: Arc<CredentialBroker>,
        upstream: Arc<dyn UpstreamClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            queue,
            broker,
            upstream,
            notifier,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the pool (spawns one loop per configured worker).
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        info!("Starting worker pool with {} workers", self.config.workers);

        for worker_id in 0..self.config.workers {
            self.spawn_worker_loop(worker_id);
        }
    }

    /// Stop the pool gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker pool not running");
            return;
        }

        info!("Stopping worker pool");

        let _ = self.shutdown_tx.send(());
        self.queue.close();

        // Give workers a moment to finish the attempt in flight
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Worker pool stopped");
    }

    fn spawn_worker_loop(self: &Arc<Self>, worker_id: usize) {
        let pool = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Worker {} started", worker_id);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Worker {} received shutdown signal", worker_id);
                        break;
                    }
                    delivery = pool.queue.dequeue() => {
                        match delivery {
                            Some(delivery) => pool.process_delivery(&delivery).await,
                            None => {
                                debug!("Worker {} queue closed", worker_id);
                                break;
                            }
                        }
                    }
                }
            }
            debug!("Worker {} stopped", worker_id);
        });
    }

    /// Execute one queue delivery end to end.
    ///
    /// Public so tests can drive deliveries deterministically without
    /// spawning the worker loops.
    pub async fn process_delivery(&self, delivery: &Delivery) {
        let task = match self
            .store
            .begin_attempt(&delivery.task_id, delivery.attempt)
        {
            Ok(Some(task)) => task,
            Ok(None) => {
                // Lost the lease CAS: duplicate redelivery or terminal task.
                metrics::DUPLICATE_DELIVERIES.inc();
                debug!(
                    "Skipping delivery for task {} attempt {}: already claimed or terminal",
                    delivery.task_id, delivery.attempt
                );
                return;
            }
            Err(e) => {
                error!(
                    "Failed to claim task {} attempt {}: {}",
                    delivery.task_id, delivery.attempt, e
                );
                return;
            }
        };

        debug!(
            "Worker executing {} task {} (attempt {}/{})",
            task.kind(),
            task.id,
            task.attempt_count,
            self.config.max_attempts
        );

        match self.run_attempt(&task).await {
            Ok(result) => self.finish_success(&task, result).await,
            Err(err) => self.handle_failure(&task, delivery, err).await,
        }
    }

    /// One execution attempt: token, portal call, one refresh-and-retry on 401.
    async fn run_attempt(&self, task: &Task) -> Result<TaskResult, UpstreamError> {
        let creds = task.payload.credentials();
        let token = self.broker.token(&creds.usuario, &creds.senha).await?;

        match self.call_portal(task, &token).await {
            Err(UpstreamError::Auth(detail)) => {
                // The cached token went stale mid-flight: refresh once and
                // retry the call. A second 401 fails the task.
                warn!(
                    "Portal rejected token for task {} ({}), refreshing once",
                    task.id, detail
                );
                self.broker.invalidate(&creds.usuario).await;
                let token = self.broker.token(&creds.usuario, &creds.senha).await?;
                self.call_portal(task, &token).await
            }
            other => other,
        }
    }

    async fn call_portal(&self, task: &Task, token: &str) -> Result<TaskResult, UpstreamError> {
        match &task.payload {
            TaskPayload::Scrape { .. } => {
                let products = self.upstream.list_products(token).await?;
                Ok(TaskResult::Products {
                    total: products.len(),
                    products,
                })
            }
            TaskPayload::Order {
                id_pedido,
                produtos,
                ..
            } => {
                let confirmation = self
                    .upstream
                    .submit_order(token, id_pedido, produtos)
                    .await?;
                Ok(TaskResult::Order(confirmation))
            }
        }
    }

    async fn finish_success(&self, task: &Task, result: TaskResult) {
        match self.store.complete(&task.id, result) {
            Ok(completed) => {
                metrics::TASKS_SUCCEEDED
                    .with_label_values(&[&task.kind().to_string()])
                    .inc();
                info!(
                    "Task {} succeeded after {} attempt(s)",
                    task.id, completed.attempt_count
                );
                self.notifier.notify(&completed).await;
            }
            Err(e) => {
                // The lease protocol makes this unreachable in practice.
                error!("Failed to record success for task {}: {}", task.id, e);
            }
        }
    }

    async fn handle_failure(&self, task: &Task, delivery: &Delivery, err: UpstreamError) {
        match err {
            UpstreamError::Permanent(_) | UpstreamError::Auth(_) => {
                // Auth here means login was rejected or a freshly issued
                // token still came back 401; another attempt with the same
                // credentials would only repeat it.
                info!("Task {} failed permanently: {}", task.id, err);
                self.fail_task(task, &err, "permanent").await;
            }
            UpstreamError::Transient(_) => {
                if delivery.attempt >= self.config.max_attempts {
                    warn!(
                        "Task {} exhausted {} attempts, last error: {}",
                        task.id, delivery.attempt, err
                    );
                    self.fail_task(task, &err, "exhausted").await;
                    return;
                }

                let delay = retry_delay(delivery.attempt, &self.config);
                metrics::TASK_RETRIES.inc();
                warn!(
                    "Task {} attempt {} failed ({}), retrying in {:?}",
                    task.id, delivery.attempt, err, delay
                );

                // State stays Running: a concurrent duplicate delivery is
                // recognized as in-flight by the lease CAS.
                if let Err(e) = self
                    .queue
                    .enqueue_after(delivery.next_attempt(), delay)
                    .await
                {
                    error!(
                        "Failed to re-enqueue task {} for retry, failing it: {}",
                        task.id, e
                    );
                    self.fail_task(task, &err, "exhausted").await;
                }
            }
        }
    }

    async fn fail_task(&self, task: &Task, err: &UpstreamError, cause: &str) {
        match self.store.fail(&task.id, &err.to_string()) {
            Ok(failed) => {
                metrics::TASKS_FAILED
                    .with_label_values(&[&task.kind().to_string(), cause])
                    .inc();
                self.notifier.notify(&failed).await;
            }
            Err(e) => {
                error!("Failed to record failure for task {}: {}", task.id, e);
            }
        }
    }
}

/// Re-schedule tasks left non-terminal by a previous shutdown.
///
/// The lease CAS expects the next attempt number, so each task gets a
/// delivery for `attempt_count + 1`. A task interrupted on its final
/// attempt has no attempts left and is failed instead, with the usual
/// callback hand-off. Returns the number of re-scheduled tasks.
pub async fn resume_interrupted_tasks(
    store: &dyn TaskStore,
    queue: &dyn TaskQueue,
    notifier: &dyn Notifier,
    config: &WorkerConfig,
) -> Result<usize, TaskError> {
    let mut resumed = 0;

    for state_name in ["pending", "running"] {
        let filter = TaskFilter::new().with_state(state_name).with_limit(i64::MAX);
        for task in store.list(&filter)? {
            if task.attempt_count >= config.max_attempts {
                warn!(
                    "Task {} was interrupted on its final attempt, failing it",
                    task.id
                );
                let failed =
                    store.fail(&task.id, "interrupted while executing its final attempt")?;
                metrics::TASKS_FAILED
                    .with_label_values(&[&task.kind().to_string(), "exhausted"])
                    .inc();
                notifier.notify(&failed).await;
                continue;
            }

            queue
                .enqueue(Delivery {
                    task_id: task.id.clone(),
                    attempt: task.attempt_count + 1,
                })
                .await
                .map_err(|e| TaskError::Storage(format!("queue rejected delivery: {e}")))?;
            resumed += 1;
        }
    }

    Ok(resumed)
}

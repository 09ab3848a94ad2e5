//! Worker pool lifecycle integration tests.
//!
//! These tests drive complete task lifecycles through a running pool with a
//! durable store: pending -> running -> succeeded/failed, retries included.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use botica_core::{
    config::WorkerConfig,
    queue::{Delivery, MemoryTaskQueue, TaskQueue},
    task::{CreateTaskRequest, Credentials, LineItem, SqliteTaskStore, TaskPayload, TaskState, TaskStore},
    testing::{MockNotifier, MockUpstream},
    upstream::{UpstreamClient, UpstreamError},
    CredentialBroker, Notifier, WorkerPool,
};

/// Test helper wiring a pool over a SQLite store and mock collaborators.
struct TestHarness {
    store: Arc<SqliteTaskStore>,
    queue: Arc<MemoryTaskQueue>,
    upstream: Arc<MockUpstream>,
    notifier: Arc<MockNotifier>,
    pool: Arc<WorkerPool>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new(max_attempts: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let store =
            Arc::new(SqliteTaskStore::new(&db_path).expect("Failed to create task store"));
        let queue = Arc::new(MemoryTaskQueue::new());
        let upstream = Arc::new(MockUpstream::new());
        let notifier = Arc::new(MockNotifier::new());
        let broker = Arc::new(CredentialBroker::new(
            Arc::clone(&upstream) as Arc<dyn UpstreamClient>
        ));

        // Fast retries so exhaustion paths finish quickly.
        let config = WorkerConfig {
            workers: 3,
            max_attempts,
            retry_base_ms: 5,
            retry_max_delay_ms: 20,
            retry_jitter_ms: 0,
        };

        let pool = Arc::new(WorkerPool::new(
            config,
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
            broker,
            Arc::clone(&upstream) as Arc<dyn UpstreamClient>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        ));

        Self {
            store,
            queue,
            upstream,
            notifier,
            pool,
            _temp_dir: temp_dir,
        }
    }

    async fn submit(&self, payload: TaskPayload) -> String {
        let task = self
            .store
            .create(CreateTaskRequest {
                payload,
                callback_url: "https://caller.example.com/cb".to_string(),
            })
            .expect("Failed to create task");

        self.queue
            .enqueue(Delivery::first(&task.id))
            .await
            .expect("Failed to enqueue task");

        task.id
    }

    async fn wait_for_terminal(&self, task_id: &str, timeout: Duration) -> TaskState {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.store.get(task_id).unwrap().unwrap();
            if task.state.is_terminal() {
                return task.state;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task {} did not reach a terminal state in time (state: {})",
                task_id,
                task.state
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn scrape_payload() -> TaskPayload {
    TaskPayload::Scrape {
        credentials: Credentials {
            usuario: "fornecedor_user".to_string(),
            senha: "fornecedor_pass".to_string(),
        },
    }
}

fn order_payload() -> TaskPayload {
    TaskPayload::Order {
        credentials: Credentials {
            usuario: "fornecedor_user".to_string(),
            senha: "fornecedor_pass".to_string(),
        },
        id_pedido: "1234".to_string(),
        produtos: vec![LineItem::new("7898636193493", "444212", 2)],
    }
}

#[tokio::test]
async fn test_scrape_and_order_complete_through_running_pool() {
    let harness = TestHarness::new(5);
    harness.pool.start();

    let scrape_id = harness.submit(scrape_payload()).await;
    let order_id = harness.submit(order_payload()).await;

    let scrape_state = harness
        .wait_for_terminal(&scrape_id, Duration::from_secs(2))
        .await;
    let order_state = harness
        .wait_for_terminal(&order_id, Duration::from_secs(2))
        .await;

    assert_eq!(scrape_state, TaskState::Succeeded);
    assert_eq!(order_state, TaskState::Succeeded);

    // One callback hand-off per task.
    assert_eq!(harness.notifier.count_for(&scrape_id).await, 1);
    assert_eq!(harness.notifier.count_for(&order_id).await, 1);

    harness.pool.stop().await;
}

#[tokio::test]
async fn test_transient_failures_retried_until_success() {
    let harness = TestHarness::new(5);

    harness
        .upstream
        .push_products(Err(UpstreamError::Transient("timeout".to_string())))
        .await;
    harness
        .upstream
        .push_products(Err(UpstreamError::Transient("timeout".to_string())))
        .await;

    harness.pool.start();
    let task_id = harness.submit(scrape_payload()).await;

    let state = harness
        .wait_for_terminal(&task_id, Duration::from_secs(2))
        .await;
    assert_eq!(state, TaskState::Succeeded);

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.attempt_count, 3);
    assert_eq!(harness.notifier.count_for(&task_id).await, 1);

    harness.pool.stop().await;
}

#[tokio::test]
async fn test_exhausted_task_fails_with_ceiling_attempts() {
    let harness = TestHarness::new(3);

    for _ in 0..3 {
        harness
            .upstream
            .push_products(Err(UpstreamError::Transient("portal down".to_string())))
            .await;
    }

    harness.pool.start();
    let task_id = harness.submit(scrape_payload()).await;

    let state = harness
        .wait_for_terminal(&task_id, Duration::from_secs(2))
        .await;
    assert_eq!(state, TaskState::Failed);

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.attempt_count, 3);
    assert!(task.last_error.as_deref().unwrap().contains("portal down"));
    assert_eq!(harness.notifier.count_for(&task_id).await, 1);

    harness.pool.stop().await;
}

#[tokio::test]
async fn test_permanent_order_rejection_fails_immediately() {
    let harness = TestHarness::new(5);

    harness
        .upstream
        .push_order(Err(UpstreamError::Permanent(
            "HTTP 422: produto desconhecido".to_string(),
        )))
        .await;

    harness.pool.start();
    let task_id = harness.submit(order_payload()).await;

    let state = harness
        .wait_for_terminal(&task_id, Duration::from_secs(2))
        .await;
    assert_eq!(state, TaskState::Failed);

    let task = harness.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.attempt_count, 1);
    assert!(task
        .last_error
        .as_deref()
        .unwrap()
        .contains("produto desconhecido"));

    harness.pool.stop().await;
}

#[tokio::test]
async fn test_duplicate_deliveries_execute_once() {
    let harness = TestHarness::new(5);

    let task_id = harness.submit(scrape_payload()).await;
    // Simulated at-least-once redelivery before the pool starts.
    harness
        .queue
        .enqueue(Delivery::first(&task_id))
        .await
        .unwrap();

    harness.pool.start();

    let state = harness
        .wait_for_terminal(&task_id, Duration::from_secs(2))
        .await;
    assert_eq!(state, TaskState::Succeeded);

    // Give the duplicate time to drain through a worker.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(harness.upstream.product_calls().await, 1);
    assert_eq!(harness.notifier.count_for(&task_id).await, 1);

    harness.pool.stop().await;
}

#[tokio::test]
async fn test_tasks_share_one_portal_login() {
    let harness = TestHarness::new(5);
    harness.pool.start();

    let a = harness.submit(scrape_payload()).await;
    let b = harness.submit(scrape_payload()).await;
    let c = harness.submit(order_payload()).await;

    for id in [&a, &b, &c] {
        let state = harness.wait_for_terminal(id, Duration::from_secs(2)).await;
        assert_eq!(state, TaskState::Succeeded);
    }

    // Same username across tasks: the broker logs in once and caches.
    assert_eq!(harness.upstream.login_calls().await, 1);

    harness.pool.stop().await;
}

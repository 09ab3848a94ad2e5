//! Common test utilities for in-process API testing.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use botica_core::{load_config_from_str, MemoryTaskQueue, MemoryTaskStore};
use botica_server::api::create_router;
use botica_server::state::AppState;

/// In-process server with direct access to the store and queue backing it.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<MemoryTaskStore>,
    pub queue: Arc<MemoryTaskQueue>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub fn new() -> Self {
        let config = load_config_from_str(
            r#"
[upstream]
base_url = "https://desafio.cotefacil.net"

[database]
backend = "memory"
"#,
        )
        .expect("test config must parse");

        let store = Arc::new(MemoryTaskStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());

        let state = Arc::new(AppState::new(config, store.clone(), queue.clone()));
        let router = create_router(state);

        Self {
            router,
            store,
            queue,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not fail at the transport level");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }
}

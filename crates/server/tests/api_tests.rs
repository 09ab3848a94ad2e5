//! Intake API integration tests, run against an in-process router.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use botica_core::{TaskQueue, TaskState, TaskStore};

use common::TestFixture;

fn scrape_body() -> serde_json::Value {
    json!({
        "usuario": "fornecedor_user",
        "senha": "fornecedor_pass",
        "callback_url": "https://caller.example.com/cb"
    })
}

fn order_body() -> serde_json::Value {
    json!({
        "usuario": "fornecedor_user",
        "senha": "fornecedor_pass",
        "id_pedido": "1234",
        "produtos": [
            { "gtin": "7898636193493", "codigo": "444212", "quantidade": 2 }
        ],
        "callback_url": "https://caller.example.com/cb"
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_scrape_accepted_and_enqueued() {
    let fixture = TestFixture::new();
    let response = fixture.post("/scraping", scrape_body()).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "pending");

    let task_id = response.body["task_id"].as_str().unwrap().to_string();
    let task = fixture.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.state, TaskState::Pending);
    assert_eq!(task.attempt_count, 0);

    let delivery = fixture.queue.dequeue().await.unwrap();
    assert_eq!(delivery.task_id, task_id);
    assert_eq!(delivery.attempt, 1);
}

#[tokio::test]
async fn test_order_accepted() {
    let fixture = TestFixture::new();
    let response = fixture.post("/pedido", order_body()).await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let task_id = response.body["task_id"].as_str().unwrap().to_string();

    let task = fixture.store.get(&task_id).unwrap().unwrap();
    assert_eq!(task.kind().to_string(), "order");
}

#[tokio::test]
async fn test_order_with_empty_produtos_rejected() {
    let fixture = TestFixture::new();
    let mut body = order_body();
    body["produtos"] = json!([]);

    let response = fixture.post("/pedido", body).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("produtos"));
}

#[tokio::test]
async fn test_order_with_zero_quantity_rejected() {
    let fixture = TestFixture::new();
    let mut body = order_body();
    body["produtos"] = json!([
        { "gtin": "7898636193493", "codigo": "444212", "quantidade": 0 }
    ]);

    let response = fixture.post("/pedido", body).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("quantidade"));
}

#[tokio::test]
async fn test_rejected_order_creates_no_task() {
    let fixture = TestFixture::new();
    let mut body = order_body();
    body["produtos"] = json!([]);

    fixture.post("/pedido", body).await;

    let filter = botica_core::TaskFilter::new();
    assert_eq!(fixture.store.count(&filter).unwrap(), 0);
}

#[tokio::test]
async fn test_scrape_with_bad_callback_url_rejected() {
    let fixture = TestFixture::new();
    let mut body = scrape_body();
    body["callback_url"] = json!("ftp://nope");

    let response = fixture.post("/scraping", body).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("callback_url"));
}

#[tokio::test]
async fn test_get_task_hides_credentials() {
    let fixture = TestFixture::new();
    let accepted = fixture.post("/scraping", scrape_body()).await;
    let task_id = accepted.body["task_id"].as_str().unwrap();

    let response = fixture.get(&format!("/tasks/{task_id}")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], task_id);
    assert_eq!(response.body["state"], "pending");
    assert_eq!(response.body["kind"], "scrape");
    assert!(!response.text.contains("senha"));
    assert!(!response.text.contains("fornecedor_pass"));
}

#[tokio::test]
async fn test_get_unknown_task_is_404() {
    let fixture = TestFixture::new();
    let response = fixture.get("/tasks/no-such-task").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_tasks_with_state_filter() {
    let fixture = TestFixture::new();
    fixture.post("/scraping", scrape_body()).await;
    fixture.post("/pedido", order_body()).await;

    let response = fixture.get("/tasks?state=pending").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["tasks"].as_array().unwrap().len(), 2);

    let response = fixture.get("/tasks?state=succeeded").await;
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_config_endpoint_reports_upstream_url() {
    let fixture = TestFixture::new();
    let response = fixture.get("/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body["upstream_base_url"],
        "https://desafio.cotefacil.net"
    );
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    let fixture = TestFixture::new();
    fixture.post("/scraping", scrape_body()).await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("botica_tasks_accepted_total"));
}

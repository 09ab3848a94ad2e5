//! Task intake and lookup handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use botica_core::task::{
    CreateTaskRequest, Credentials, LineItem, Task, TaskError, TaskFilter, TaskKind, TaskResult,
    TaskState,
};
use botica_core::queue::Delivery;

use crate::metrics;
use crate::state::AppState;

/// Maximum allowed limit for task queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for task queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a catalog scrape task
#[derive(Debug, Deserialize)]
pub struct ScrapeBody {
    /// Portal username
    pub usuario: String,
    /// Portal password
    pub senha: String,
    /// Where the final result is POSTed
    pub callback_url: String,
}

/// Request body for a purchase order task
#[derive(Debug, Deserialize)]
pub struct OrderBody {
    /// Portal username
    pub usuario: String,
    /// Portal password
    pub senha: String,
    /// Caller-side order identifier
    pub id_pedido: String,
    /// Line items to order
    pub produtos: Vec<LineItemBody>,
    /// Where the final result is POSTed
    pub callback_url: String,
}

/// One line item in an order request
#[derive(Debug, Deserialize)]
pub struct LineItemBody {
    pub gtin: String,
    pub codigo: String,
    pub quantidade: u32,
}

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    /// Filter by state ("pending", "running", "succeeded", "failed")
    pub state: Option<String>,
    /// Maximum number of tasks to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for an accepted task
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub task_id: String,
    pub status: String,
}

/// Task view returned by lookup endpoints (credentials never leave the store)
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub kind: TaskKind,
    pub state: TaskState,
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    pub callback_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.clone(),
            kind: task.kind(),
            state: task.state,
            attempt_count: task.attempt_count,
            last_error: task.last_error,
            result: task.result,
            callback_url: task.callback_url,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<TaskErrorResponse>) {
    (
        status,
        Json(TaskErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Validation
// ============================================================================

fn validate_common(
    usuario: &str,
    senha: &str,
    callback_url: &str,
) -> Result<(), String> {
    if usuario.trim().is_empty() {
        return Err("usuario must not be empty".to_string());
    }
    if senha.is_empty() {
        return Err("senha must not be empty".to_string());
    }
    if !callback_url.starts_with("http://") && !callback_url.starts_with("https://") {
        return Err("callback_url must be an http(s) URL".to_string());
    }
    Ok(())
}

fn validate_produtos(produtos: &[LineItemBody]) -> Result<(), String> {
    if produtos.is_empty() {
        return Err("produtos must not be empty".to_string());
    }
    for (i, item) in produtos.iter().enumerate() {
        if item.gtin.trim().is_empty() {
            return Err(format!("produtos[{i}].gtin must not be empty"));
        }
        if item.codigo.trim().is_empty() {
            return Err(format!("produtos[{i}].codigo must not be empty"));
        }
        if item.quantidade == 0 {
            return Err(format!("produtos[{i}].quantidade must be at least 1"));
        }
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn accept(
    state: &AppState,
    request: CreateTaskRequest,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<TaskErrorResponse>)> {
    let kind = request.payload.kind();

    let task = state
        .store()
        .create(request)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // The task is durable at this point; a failed enqueue must not leave it
    // invisible, so surface the fault to the caller.
    if let Err(e) = state.queue().enqueue(Delivery::first(&task.id)).await {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("task {} accepted but not scheduled: {}", task.id, e),
        ));
    }

    metrics::TASKS_ACCEPTED
        .with_label_values(&[&kind.to_string()])
        .inc();

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            task_id: task.id,
            status: task.state.as_str().to_string(),
        }),
    ))
}

/// Accept a catalog scrape task
pub async fn create_scrape_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScrapeBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), impl IntoResponse> {
    if let Err(detail) = validate_common(&body.usuario, &body.senha, &body.callback_url) {
        metrics::INTAKE_REJECTIONS
            .with_label_values(&["scraping"])
            .inc();
        return Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, detail));
    }

    let request = CreateTaskRequest {
        payload: botica_core::task::TaskPayload::Scrape {
            credentials: Credentials {
                usuario: body.usuario,
                senha: body.senha,
            },
        },
        callback_url: body.callback_url,
    };

    accept(&state, request).await
}

/// Accept a purchase order task
pub async fn create_order_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OrderBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), impl IntoResponse> {
    let validation = validate_common(&body.usuario, &body.senha, &body.callback_url)
        .and_then(|()| validate_produtos(&body.produtos));

    if let Err(detail) = validation {
        metrics::INTAKE_REJECTIONS
            .with_label_values(&["pedido"])
            .inc();
        return Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, detail));
    }

    let produtos = body
        .produtos
        .into_iter()
        .map(|item| LineItem::new(item.gtin, item.codigo, item.quantidade))
        .collect();

    let request = CreateTaskRequest {
        payload: botica_core::task::TaskPayload::Order {
            credentials: Credentials {
                usuario: body.usuario,
                senha: body.senha,
            },
            id_pedido: body.id_pedido,
            produtos,
        },
        callback_url: body.callback_url,
    };

    accept(&state, request).await
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, impl IntoResponse> {
    match state.store().get(&id) {
        Ok(Some(task)) => Ok(Json(TaskResponse::from(task))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Task not found: {id}"),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// List tasks with optional filters
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<ListTasksResponse>, (StatusCode, Json<TaskErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TaskFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref state_filter) = params.state {
        filter = filter.with_state(state_filter.as_str());
    }

    let tasks = state
        .store()
        .list(&filter)
        .map_err(|e: TaskError| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Total count without pagination.
    let count_filter = TaskFilter {
        limit: i64::MAX,
        offset: 0,
        ..filter
    };
    let total = state
        .store()
        .count(&count_filter)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ListTasksResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

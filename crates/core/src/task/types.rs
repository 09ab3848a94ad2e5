//! Core task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::upstream::{OrderConfirmation, Product};

/// What kind of work a task performs against the supplier portal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Extract the full product catalog.
    Scrape,
    /// Submit a purchase order.
    Order,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Scrape => write!(f, "scrape"),
            TaskKind::Order => write!(f, "order"),
        }
    }
}

/// Portal login credentials carried inside a task payload.
///
/// Field names follow the portal's wire format (Portuguese).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Portal username.
    pub usuario: String,
    /// Portal password.
    pub senha: String,
}

/// One line item of a purchase order.
///
/// Immutable value: both identifiers are non-empty and quantity is >= 1,
/// enforced at intake before the task reaches the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    /// Global trade item number (GTIN/EAN).
    pub gtin: String,
    /// Supplier-internal product code.
    pub codigo: String,
    /// Requested quantity (>= 1).
    pub quantidade: u32,
}

impl LineItem {
    /// Create a new line item.
    pub fn new(gtin: impl Into<String>, codigo: impl Into<String>, quantidade: u32) -> Self {
        Self {
            gtin: gtin.into(),
            codigo: codigo.into(),
            quantidade,
        }
    }
}

/// Task payload: credentials plus kind-specific data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Scrape the product catalog.
    Scrape {
        /// Portal credentials.
        credentials: Credentials,
    },

    /// Submit a purchase order.
    Order {
        /// Portal credentials.
        credentials: Credentials,
        /// Caller-side order identifier.
        id_pedido: String,
        /// Ordered line items (non-empty, validated at intake).
        produtos: Vec<LineItem>,
    },
}

impl TaskPayload {
    /// The task kind this payload drives.
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Scrape { .. } => TaskKind::Scrape,
            TaskPayload::Order { .. } => TaskKind::Order,
        }
    }

    /// Portal credentials for this payload.
    pub fn credentials(&self) -> &Credentials {
        match self {
            TaskPayload::Scrape { credentials } => credentials,
            TaskPayload::Order { credentials, .. } => credentials,
        }
    }
}

/// Current state of a task.
///
/// State machine flow:
/// ```text
/// Pending -> Running -> Succeeded
///               |   \-> Failed
///               v
///            Running (re-queued retry, attempt_count bumped)
/// ```
///
/// Transitions are monotonic: a terminal state is never left, and the only
/// revisited state is Running across retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, waiting for a worker.
    Pending,
    /// A worker holds the lease for the current attempt.
    Running,
    /// Finished with a result. Terminal.
    Succeeded,
    /// Finished with an error. Terminal.
    Failed,
}

impl TaskState {
    /// Whether no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    /// Stable string form, used for storage filters and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final result of a succeeded task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResult {
    /// Product catalog extracted by a scrape task.
    Products {
        /// Number of products extracted.
        total: usize,
        /// The extracted products.
        products: Vec<Product>,
    },

    /// Confirmation returned by the portal for an order task.
    Order(OrderConfirmation),
}

/// One accepted unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Opaque unique identifier, generated at intake.
    pub id: String,
    /// Kind-specific payload, including portal credentials.
    pub payload: TaskPayload,
    /// Destination for the final notification.
    pub callback_url: String,
    /// Current state.
    pub state: TaskState,
    /// Number of execution attempts so far (0 until first lease).
    pub attempt_count: u32,
    /// Populated only in Failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Populated only in Succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// Touched on every state transition.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// The task kind, derived from the payload.
    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            usuario: "fornecedor_user".to_string(),
            senha: "fornecedor_pass".to_string(),
        }
    }

    #[test]
    fn test_payload_kind() {
        let scrape = TaskPayload::Scrape {
            credentials: creds(),
        };
        assert_eq!(scrape.kind(), TaskKind::Scrape);

        let order = TaskPayload::Order {
            credentials: creds(),
            id_pedido: "1234".to_string(),
            produtos: vec![LineItem::new("7898636193493", "444212", 2)],
        };
        assert_eq!(order.kind(), TaskKind::Order);
    }

    #[test]
    fn test_state_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_payload_serialization_roundtrip() {
        let payload = TaskPayload::Order {
            credentials: creds(),
            id_pedido: "1234".to_string(),
            produtos: vec![LineItem::new("7899095203136", "446231", 1)],
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"order\""));
        assert!(json.contains("\"quantidade\":1"));

        let parsed: TaskPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(TaskState::Pending.as_str(), "pending");
        assert_eq!(TaskState::Running.as_str(), "running");
        assert_eq!(TaskState::Succeeded.as_str(), "succeeded");
        assert_eq!(TaskState::Failed.as_str(), "failed");
    }
}

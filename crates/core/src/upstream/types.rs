//! Wire types for the supplier portal API.

use serde::{Deserialize, Serialize};

use crate::task::LineItem;

/// Response of the portal's OAuth2 token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// Token type, normally "Bearer".
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn default_expires_in() -> u64 {
    1800
}

/// One product as returned by the portal's listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Portal-side product id.
    pub id: i64,
    /// Global trade item number.
    pub gtin: String,
    /// Supplier-internal product code.
    pub codigo: String,
    /// Product description.
    pub descricao: String,
    /// Factory price.
    pub preco_fabrica: f64,
    /// Units in stock.
    pub estoque: i64,
}

/// Confirmation returned by the portal for an accepted order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderConfirmation {
    /// Portal-side order id.
    pub order_id: i64,
    /// Confirmation code handed back to the caller.
    pub codigo_confirmacao: String,
    /// Order status as reported by the portal.
    pub status: String,
    /// Line items the portal accepted.
    pub itens: Vec<LineItem>,
}

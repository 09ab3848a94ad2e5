//! Thin, classification-aware client for the supplier portal API.

mod portal;
mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::LineItem;

pub use portal::{classify_status, PortalClient};
pub use types::{LoginResponse, OrderConfirmation, Product};

/// Failure taxonomy for portal calls.
///
/// The client classifies, the worker pool decides: auth errors trigger one
/// token refresh and a single retry of the call, transient errors are
/// eligible for backoff retry, permanent errors fail the task immediately.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Expired or rejected credentials (401).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network failure, timeout or 5xx; safe to retry with backoff.
    #[error("transient upstream error: {0}")]
    Transient(String),

    /// Business-rule rejection or malformed exchange; never retried.
    #[error("permanent upstream error: {0}")]
    Permanent(String),
}

/// Trait for supplier portal clients.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// OAuth2 password-grant login.
    async fn login(&self, usuario: &str, senha: &str) -> Result<LoginResponse, UpstreamError>;

    /// Fetch the full product catalog.
    async fn list_products(&self, token: &str) -> Result<Vec<Product>, UpstreamError>;

    /// Submit a purchase order and return the portal's confirmation.
    async fn submit_order(
        &self,
        token: &str,
        id_pedido: &str,
        itens: &[LineItem],
    ) -> Result<OrderConfirmation, UpstreamError>;
}

//! Mock supplier portal client for testing.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::task::LineItem;
use crate::upstream::{LoginResponse, OrderConfirmation, Product, UpstreamClient, UpstreamError};

/// Mock implementation of the [`UpstreamClient`] trait.
///
/// Provides controllable behavior for testing:
/// - Script per-call outcomes for product listing and order submission
/// - Fail the next login on demand
/// - Track call counts for assertions (login count backs the
///   single-flight property tests)
///
/// Unscripted calls succeed with canned data.
#[derive(Default)]
pub struct MockUpstream {
    logins: RwLock<Vec<(String, String)>>,
    next_login_error: RwLock<Option<UpstreamError>>,
    product_responses: RwLock<VecDeque<Result<Vec<Product>, UpstreamError>>>,
    order_responses: RwLock<VecDeque<Result<OrderConfirmation, UpstreamError>>>,
    product_calls: RwLock<u32>,
    order_calls: RwLock<u32>,
}

impl MockUpstream {
    /// Create a mock with no scripted behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of login calls made so far.
    pub async fn login_calls(&self) -> usize {
        self.logins.read().await.len()
    }

    /// Number of product-listing calls made so far.
    pub async fn product_calls(&self) -> u32 {
        *self.product_calls.read().await
    }

    /// Number of order-submission calls made so far.
    pub async fn order_calls(&self) -> u32 {
        *self.order_calls.read().await
    }

    /// Make the next login call fail with the given error.
    pub async fn fail_next_login(&self, error: UpstreamError) {
        *self.next_login_error.write().await = Some(error);
    }

    /// Queue an outcome for the next product-listing call.
    pub async fn push_products(&self, response: Result<Vec<Product>, UpstreamError>) {
        self.product_responses.write().await.push_back(response);
    }

    /// Queue an outcome for the next order-submission call.
    pub async fn push_order(&self, response: Result<OrderConfirmation, UpstreamError>) {
        self.order_responses.write().await.push_back(response);
    }

    /// A small canned catalog.
    pub fn sample_products() -> Vec<Product> {
        vec![
            Product {
                id: 1,
                gtin: "7898636193493".to_string(),
                codigo: "444212".to_string(),
                descricao: "Dipirona 500mg".to_string(),
                preco_fabrica: 10.5,
                estoque: 120,
            },
            Product {
                id: 2,
                gtin: "7899095203136".to_string(),
                codigo: "446231".to_string(),
                descricao: "Paracetamol 750mg".to_string(),
                preco_fabrica: 8.9,
                estoque: 45,
            },
        ]
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn login(&self, usuario: &str, senha: &str) -> Result<LoginResponse, UpstreamError> {
        let mut logins = self.logins.write().await;
        logins.push((usuario.to_string(), senha.to_string()));
        let count = logins.len();
        drop(logins);

        if let Some(error) = self.next_login_error.write().await.take() {
            return Err(error);
        }

        Ok(LoginResponse {
            access_token: format!("token-{count}"),
            token_type: "Bearer".to_string(),
            expires_in: 1800,
        })
    }

    async fn list_products(&self, _token: &str) -> Result<Vec<Product>, UpstreamError> {
        *self.product_calls.write().await += 1;

        match self.product_responses.write().await.pop_front() {
            Some(response) => response,
            None => Ok(Self::sample_products()),
        }
    }

    async fn submit_order(
        &self,
        _token: &str,
        _id_pedido: &str,
        itens: &[LineItem],
    ) -> Result<OrderConfirmation, UpstreamError> {
        *self.order_calls.write().await += 1;

        match self.order_responses.write().await.pop_front() {
            Some(response) => response,
            None => Ok(OrderConfirmation {
                order_id: 64,
                codigo_confirmacao: "64".to_string(),
                status: "pedido_realizado".to_string(),
                itens: itens.to_vec(),
            }),
        }
    }
}

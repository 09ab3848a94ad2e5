//! HTTP client for the supplier portal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::task::LineItem;

use super::{LoginResponse, OrderConfirmation, Product, UpstreamClient, UpstreamError};

/// reqwest-based client for the supplier portal.
///
/// Performs no retries of its own; failures are classified into
/// [`UpstreamError`] and retry decisions stay with the worker pool.
pub struct PortalClient {
    client: Client,
    config: UpstreamConfig,
}

#[derive(Serialize)]
struct OrderBody<'a> {
    itens: &'a [LineItem],
}

impl PortalClient {
    /// Create a new portal client.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| UpstreamError::Permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn map_transport(e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Transient("request timed out".to_string())
        } else if e.is_connect() {
            UpstreamError::Transient(format!("connection failed: {e}"))
        } else {
            UpstreamError::Transient(e.to_string())
        }
    }

    /// Check the response status, returning the body text on success.
    async fn read_ok(response: reqwest::Response, expect: StatusCode) -> Result<String, UpstreamError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == expect {
            return Ok(body);
        }

        Err(classify_status(status, &body))
    }
}

/// Classify an HTTP status into the error taxonomy.
///
/// 401 is an auth failure (the caller refreshes the token once and retries);
/// 408/429 and all 5xx are transient; every other non-success status is a
/// permanent, non-retryable rejection.
pub fn classify_status(status: StatusCode, body: &str) -> UpstreamError {
    let detail = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.chars().take(200).collect::<String>())
    };

    if status == StatusCode::UNAUTHORIZED {
        UpstreamError::Auth(detail)
    } else if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        UpstreamError::Transient(detail)
    } else {
        UpstreamError::Permanent(detail)
    }
}

#[async_trait]
impl UpstreamClient for PortalClient {
    async fn login(&self, usuario: &str, senha: &str) -> Result<LoginResponse, UpstreamError> {
        let url = self.url(&self.config.token_endpoint);
        debug!("Requesting portal token from {}", url);

        // OAuth2 password grant, form-encoded as the portal expects.
        let params = [
            ("grant_type", "password"),
            ("username", usuario),
            ("password", senha),
            ("scope", ""),
            ("client_id", "string"),
            ("client_secret", "********"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            // A rejected password grant comes back as 400/401 depending on
            // the portal mood; both mean bad credentials here.
            if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
                return Err(UpstreamError::Auth(format!(
                    "credentials rejected (HTTP {status})"
                )));
            }
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Permanent(format!("malformed token response: {e}")))
    }

    async fn list_products(&self, token: &str) -> Result<Vec<Product>, UpstreamError> {
        let url = self.url(&self.config.products_endpoint);
        debug!("Listing products from {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(Self::map_transport)?;

        let body = Self::read_ok(response, StatusCode::OK).await?;

        serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Permanent(format!("malformed product listing: {e}")))
    }

    async fn submit_order(
        &self,
        token: &str,
        id_pedido: &str,
        itens: &[LineItem],
    ) -> Result<OrderConfirmation, UpstreamError> {
        let url = self.url(&self.config.orders_endpoint);
        debug!(
            "Submitting order {} with {} line items to {}",
            id_pedido,
            itens.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&OrderBody { itens })
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // The portal answers 201 on creation; treat a plain 200 the same.
        if !(status == StatusCode::CREATED || status == StatusCode::OK) {
            return Err(classify_status(status, &body));
        }

        #[derive(serde::Deserialize)]
        struct CreatedOrder {
            id: i64,
            #[serde(default)]
            status: Option<String>,
            #[serde(default)]
            itens: Vec<LineItem>,
        }

        let created: CreatedOrder = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Permanent(format!("malformed order response: {e}")))?;

        // Partial acceptance is treated as rejection of the whole order.
        if created.itens.len() != itens.len() {
            return Err(UpstreamError::Permanent(format!(
                "order partially accepted: {} of {} line items",
                created.itens.len(),
                itens.len()
            )));
        }

        Ok(OrderConfirmation {
            order_id: created.id,
            codigo_confirmacao: created.id.to_string(),
            status: created.status.unwrap_or_else(|| "pedido_realizado".to_string()),
            itens: created.itens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_401_as_auth() {
        let err = classify_status(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, UpstreamError::Auth(_)));
    }

    #[test]
    fn test_classify_5xx_as_transient() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            let err = classify_status(status, "");
            assert!(matches!(err, UpstreamError::Transient(_)), "{status}");
        }
    }

    #[test]
    fn test_classify_throttling_as_transient() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            UpstreamError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::REQUEST_TIMEOUT, ""),
            UpstreamError::Transient(_)
        ));
    }

    #[test]
    fn test_classify_other_4xx_as_permanent() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            let err = classify_status(status, "quantidade invalida");
            assert!(matches!(err, UpstreamError::Permanent(_)), "{status}");
        }
    }

    #[test]
    fn test_classify_includes_body_detail() {
        let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, "produto desconhecido");
        assert!(err.to_string().contains("produto desconhecido"));
    }
}

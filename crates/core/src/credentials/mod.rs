//! Credential broker: cached portal tokens with single-flight refresh.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::upstream::{UpstreamClient, UpstreamError};

/// A cached portal session for one username.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token for portal calls.
    pub access_token: String,
    /// When the token stops being valid.
    pub expires_at: DateTime<Utc>,
    /// The username that owns the session.
    pub username: String,
}

impl Session {
    /// Whether the token is still usable given the safety margin.
    fn is_fresh(&self, margin: Duration) -> bool {
        Utc::now() < self.expires_at - margin
    }
}

/// Hands out portal tokens, logging in only when the cache is stale.
///
/// Sessions are cached per username. Refreshes run under a per-username lock:
/// when several workers hit an expired session at once, exactly one login
/// call goes upstream and every caller receives the new token.
pub struct CredentialBroker {
    upstream: Arc<dyn UpstreamClient>,
    safety_margin: Duration,
    sessions: Mutex<HashMap<String, Arc<Mutex<Option<Session>>>>>,
}

impl CredentialBroker {
    /// Default safety margin before expiry at which a token is refreshed.
    pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 60;

    /// Create a broker over the given upstream client.
    pub fn new(upstream: Arc<dyn UpstreamClient>) -> Self {
        Self::with_safety_margin(upstream, Duration::seconds(Self::DEFAULT_SAFETY_MARGIN_SECS))
    }

    /// Create a broker with a custom refresh safety margin.
    pub fn with_safety_margin(upstream: Arc<dyn UpstreamClient>, safety_margin: Duration) -> Self {
        Self {
            upstream,
            safety_margin,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn entry(&self, usuario: &str) -> Arc<Mutex<Option<Session>>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(usuario.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Get a valid access token for the given credentials.
    ///
    /// Returns the cached token when fresh; otherwise performs one login via
    /// the upstream client. Rejected credentials surface as
    /// [`UpstreamError::Auth`] and are never retried here.
    pub async fn token(&self, usuario: &str, senha: &str) -> Result<String, UpstreamError> {
        let entry = self.entry(usuario).await;

        // The per-username lock is held across the refresh, so concurrent
        // callers queue here and find the fresh session on wake-up.
        let mut session = entry.lock().await;

        if let Some(ref existing) = *session {
            if existing.is_fresh(self.safety_margin) {
                debug!("Using cached portal token for {}", usuario);
                return Ok(existing.access_token.clone());
            }
        }

        info!("Refreshing portal token for {}", usuario);
        let response = self.upstream.login(usuario, senha).await?;

        let fresh = Session {
            access_token: response.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(response.expires_in as i64),
            username: usuario.to_string(),
        };
        *session = Some(fresh);

        Ok(response.access_token)
    }

    /// Drop the cached session for a username (used after a 401 on a call).
    pub async fn invalidate(&self, usuario: &str) {
        let entry = self.entry(usuario).await;
        let mut session = entry.lock().await;
        if session.take().is_some() {
            debug!("Invalidated cached portal token for {}", usuario);
        }
    }
}

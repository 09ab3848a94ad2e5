use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Task store backend selection
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    Sqlite,
    /// Non-durable, for local experiments and tests.
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: DatabaseBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

fn default_backend() -> DatabaseBackend {
    DatabaseBackend::Sqlite
}

fn default_db_path() -> PathBuf {
    PathBuf::from("botica.db")
}

/// Supplier portal configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Portal base URL (e.g., "https://desafio.cotefacil.net")
    pub base_url: String,
    /// OAuth2 token endpoint path (default: "/token")
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    /// Product listing endpoint path (default: "/produto")
    #[serde(default = "default_products_endpoint")]
    pub products_endpoint: String,
    /// Order submission endpoint path (default: "/pedido")
    #[serde(default = "default_orders_endpoint")]
    pub orders_endpoint: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_token_endpoint() -> String {
    "/token".to_string()
}

fn default_products_endpoint() -> String {
    "/produto".to_string()
}

fn default_orders_endpoint() -> String {
    "/pedido".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum execution attempts per task (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base retry delay in milliseconds (default: 1000)
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,
    /// Cap on the retry delay in milliseconds (default: 60000)
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Maximum uniform jitter added to each retry delay (default: 250)
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base(),
            retry_max_delay_ms: default_retry_max_delay(),
            retry_jitter_ms: default_retry_jitter(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    60_000
}

fn default_retry_jitter() -> u64 {
    250
}

/// Callback delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    /// Maximum delivery attempts (default: 5)
    #[serde(default = "default_callback_attempts")]
    pub max_attempts: u32,
    /// Base delivery retry delay in milliseconds (default: 1000)
    #[serde(default = "default_callback_base_delay")]
    pub base_delay_ms: u64,
    /// Cap on the delivery retry delay in milliseconds (default: 30000)
    #[serde(default = "default_callback_max_delay")]
    pub max_delay_ms: u64,
    /// Delivery request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_callback_attempts(),
            base_delay_ms: default_callback_base_delay(),
            max_delay_ms: default_callback_max_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_callback_attempts() -> u32 {
    5
}

fn default_callback_base_delay() -> u64 {
    1000
}

fn default_callback_max_delay() -> u64 {
    30_000
}

/// Sanitized config for API responses (portal URL only, no tunables hidden
/// today, but kept as a type so secrets never leak by accident)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub upstream_base_url: String,
    pub worker: WorkerConfig,
    pub callback: CallbackConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            upstream_base_url: config.upstream.base_url.clone(),
            worker: config.worker.clone(),
            callback: config.callback.clone(),
        }
    }
}

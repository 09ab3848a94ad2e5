use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botica_core::{
    load_config, resume_interrupted_tasks, validate_config, CredentialBroker, DatabaseBackend,
    HttpNotifier, MemoryTaskQueue, MemoryTaskStore, Notifier, PortalClient, SqliteTaskStore,
    TaskQueue, TaskStore, UpstreamClient, WorkerPool,
};

use botica_server::api::create_router;
use botica_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("BOTICA_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully (botica v{})", VERSION);
    info!("Upstream portal: {}", config.upstream.base_url);

    // Config hash for correlating logs across restarts
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Create task store
    let store: Arc<dyn TaskStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Task store: sqlite at {:?}", config.database.path);
            Arc::new(
                SqliteTaskStore::new(&config.database.path)
                    .context("Failed to create task store")?,
            )
        }
        DatabaseBackend::Memory => {
            warn!("Task store: in-memory (tasks are lost on restart)");
            Arc::new(MemoryTaskStore::new())
        }
    };

    // Create task queue
    let queue: Arc<dyn TaskQueue> = Arc::new(MemoryTaskQueue::new());

    // Create portal client and credential broker
    let portal: Arc<dyn UpstreamClient> = Arc::new(
        PortalClient::new(config.upstream.clone()).context("Failed to create portal client")?,
    );
    let broker = Arc::new(CredentialBroker::new(Arc::clone(&portal)));

    // Create callback notifier
    let notifier: Arc<dyn Notifier> = Arc::new(
        HttpNotifier::new(config.callback.clone()).context("Failed to create notifier")?,
    );

    // Re-schedule tasks interrupted by a previous shutdown; anything already
    // at the attempt ceiling is failed rather than re-queued.
    let resumed = resume_interrupted_tasks(
        store.as_ref(),
        queue.as_ref(),
        notifier.as_ref(),
        &config.worker,
    )
    .await
    .context("Failed to resume interrupted tasks")?;
    if resumed > 0 {
        info!("Re-scheduled {} interrupted task(s)", resumed);
    }

    // Create and start the worker pool
    let pool = Arc::new(WorkerPool::new(
        config.worker.clone(),
        Arc::clone(&store),
        Arc::clone(&queue),
        broker,
        portal,
        notifier,
    ));
    pool.start();
    info!("Worker pool started");

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), store, Arc::clone(&queue)));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop workers; the queue is closed inside stop() and remaining
    // deliveries are re-derived from the store on the next start.
    info!("Server shutting down...");
    pool.stop().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

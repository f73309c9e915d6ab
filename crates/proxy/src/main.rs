//! ragrelay Proxy
//!
//! Transparent OpenAI-compatible augmentation proxy:
//! - Retrieves context for each query and weaves it into the request
//! - Forwards to the backend, preserving streaming and passthrough fields
//! - Serves descriptor, health, and stats endpoints

mod augment;
mod backend;
mod handlers;
mod history;
mod state;

use axum::routing::{get, post};
use axum::Router;
use backend::BackendClient;
use history::QueryHistory;
use ragrelay_common::embeddings::create_embedder;
use ragrelay_common::store::ChromaStore;
use ragrelay_common::{config::AppConfig, metrics, ContextComposer, Retriever, VERSION};
use state::AppState;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting ragrelay proxy v{}", VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    // Open the collection; a missing collection or an embedding-model
    // mismatch is fatal at startup, not discovered on the first query
    let embedder = create_embedder(&config.embedding)?;
    let store = Arc::new(ChromaStore::new(&config.store)?);
    let retriever = Arc::new(Retriever::open(embedder, store, &config.store.collection).await?);
    info!(
        collection = %retriever.collection_name(),
        chunks = retriever.chunk_count().await?,
        model = %retriever.embedding_model(),
        "Collection opened"
    );

    // Probe the backend before accepting traffic
    let backend = Arc::new(BackendClient::new(&config.backend)?);
    let models = backend.list_models().await?;
    info!(
        backend = %config.backend.base_url,
        models = models.len(),
        "Backend reachable"
    );

    let state = AppState {
        config: config.clone(),
        retriever,
        composer: ContextComposer::new(config.retrieval.max_context_chars),
        backend,
        history: Arc::new(QueryHistory::new()),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        .route("/", get(handlers::service::root))
        .route("/health", get(handlers::service::health))
        .route("/stats", get(handlers::service::stats))
        .route("/v1/chat/completions", post(handlers::chat::chat_completions))
        .route("/v1/completions", post(handlers::completions::completions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

//! Service endpoints: descriptor, health, stats

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use ragrelay_common::VERSION;
use serde_json::{json, Value};

/// GET / - service descriptor
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let chunks = state.retriever.chunk_count().await.unwrap_or(0);

    Json(json!({
        "service": "ragrelay",
        "version": VERSION,
        "status": "running",
        "backend": state.config.backend.base_url,
        "collection": state.retriever.collection_name(),
        "chunks": chunks,
        "embedding_model": state.retriever.embedding_model(),
    }))
}

/// GET /health - component health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let store_ok = state.retriever.chunk_count().await.is_ok();
    let backend_ok = state.backend.list_models().await.is_ok();

    let status = if store_ok && backend_ok {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "components": {
            "vector_store": if store_ok { "up" } else { "down" },
            "backend": if backend_ok { "up" } else { "down" },
        },
    }))
}

/// GET /stats - query statistics
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let chunks = state.retriever.chunk_count().await.unwrap_or(0);

    Json(json!({
        "total_queries": state.history.total(),
        "recent_queries": state.history.recent(5),
        "chunks_available": chunks,
        "embedding_model": state.retriever.embedding_model(),
    }))
}

//! Chat completions endpoint
//!
//! The core augmentation path: retrieve context for the latest user message,
//! weave it into the conversation as a system message, and forward the
//! request to the backend with the caller's streaming preference preserved.

use crate::augment;
use crate::backend::relay_payloads;
use crate::handlers::types::ChatCompletionRequest;
use crate::handlers::validate_body;
use crate::history::HistoryEntry;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use ragrelay_common::errors::AppError;
use ragrelay_common::metrics;
use std::convert::Infallible;
use tracing::info;

pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(mut request) = payload.map_err(|e| AppError::MalformedRequest {
        message: e.body_text(),
    })?;
    validate_body(&request)?;

    // Reject before any retrieval or backend call
    let query = augment::extract_query(&request.messages)?.to_string();

    let top_k = request.top_k.unwrap_or(state.config.retrieval.top_k);
    let results = state.retriever.retrieve(&query, top_k).await?;
    let context = state.composer.compose(&results);

    info!(
        model = %request.model,
        stream = request.stream,
        retrieved = results.len(),
        context_chars = context.chars().count(),
        "Augmenting chat completion"
    );

    state.history.record(HistoryEntry::new(
        &query,
        context.chars().count(),
        &request.model,
    ));

    if !context.is_empty() {
        augment::insert_context_message(
            &mut request.messages,
            augment::rag_system_content(&context, top_k),
        );
    }

    let stream = request.stream;
    let body = serde_json::to_value(&request)?;

    if stream {
        let rx = state.backend.forward_stream("chat/completions", &body).await?;
        let events = relay_payloads(rx)
            .map(|payload| Ok::<_, Infallible>(Event::default().data(payload)));
        metrics::record_request("/v1/chat/completions", 200);
        Ok(Sse::new(events).into_response())
    } else {
        let response = state.backend.forward("chat/completions", &body).await?;
        metrics::record_request("/v1/chat/completions", 200);
        Ok(Json(response).into_response())
    }
}

//! Plain completions endpoint
//!
//! Same retrieval path as chat, but the context is prepended to the prompt
//! instead of carried in a system message.

use crate::augment;
use crate::backend::relay_payloads;
use crate::handlers::types::CompletionRequest;
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

pub async fn completions(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(mut request) = payload.map_err(|e| AppError::MalformedRequest {
        message: e.body_text(),
    })?;
    validate_body(&request)?;

    let query = request.prompt.clone();
    let top_k = request.top_k.unwrap_or(state.config.retrieval.top_k);
    let results = state.retriever.retrieve(&query, top_k).await?;
    let context = state.composer.compose(&results);

    info!(
        model = %request.model,
        stream = request.stream,
        retrieved = results.len(),
        context_chars = context.chars().count(),
        "Augmenting completion"
    );

    state.history.record(HistoryEntry::new(
        &query,
        context.chars().count(),
        &request.model,
    ));

    if !context.is_empty() {
        request.prompt = augment::augment_prompt(&request.prompt, &context);
    }

    let stream = request.stream;
    let body = serde_json::to_value(&request)?;

    if stream {
        let rx = state.backend.forward_stream("completions", &body).await?;
        let events = relay_payloads(rx)
            .map(|payload| Ok::<_, Infallible>(Event::default().data(payload)));
        metrics::record_request("/v1/completions", 200);
        Ok(Sse::new(events).into_response())
    } else {
        let response = state.backend.forward("completions", &body).await?;
        metrics::record_request("/v1/completions", 200);
        Ok(Json(response).into_response())
    }
}

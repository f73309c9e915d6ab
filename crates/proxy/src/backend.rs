//! Backend LLM client
//!
//! Forwards OpenAI-compatible requests to the configured backend and relays
//! streamed responses. The proxy never buffers a full streamed completion;
//! upstream SSE data frames are re-emitted as they arrive.

use futures::StreamExt;
use ragrelay_common::config::BackendConfig;
use ragrelay_common::errors::{AppError, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, error, warn};

/// Buffered frames between the upstream reader and the client writer
const RELAY_CHANNEL_CAPACITY: usize = 32;

/// End-of-stream marker required by the OpenAI streaming contract
pub const DONE_MARKER: &str = "[DONE]";

/// Connect timeout; total timeouts are per-request so streams stay open
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build backend HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Probe the backend's model list. Used at startup to fail fast when the
    /// backend is unreachable.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                message: format!("backend unreachable at {}: {}", self.base_url, e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::BackendUnavailable {
                message: format!("backend model list failed with {}", status),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                message: format!("failed to parse backend model list: {}", e),
            })?;

        let models = body["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    /// Forward a non-streaming request and return the backend's JSON body
    /// verbatim.
    pub async fn forward(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                message: format!("backend request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                message: format!("backend returned {}: {}", status, text),
            });
        }

        response.json().await.map_err(|e| AppError::Upstream {
            message: format!("failed to parse backend response: {}", e),
        })
    }

    /// Forward a streaming request. Returns a channel of SSE data payloads;
    /// the upstream end-of-stream marker is stripped (the handler appends
    /// exactly one). Dropping the receiver cancels the relay.
    pub async fn forward_stream(&self, path: &str, body: &Value) -> Result<mpsc::Receiver<String>> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                message: format!("backend request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                message: format!("backend returned {}: {}", status, text),
            });
        }

        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut upstream = response.bytes_stream();
            // Raw bytes: network chunks can split frames (and UTF-8 code
            // points) anywhere, so decoding waits for a complete frame
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = upstream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        error!(error = %e, "Upstream stream failed mid-response");
                        // Truncation must be visible to the client, not
                        // dressed up as a completed stream
                        let _ = tx.send(error_frame(&e.to_string())).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                for payload in drain_data_frames(&mut buffer) {
                    if payload == DONE_MARKER {
                        continue;
                    }
                    if tx.send(payload).await.is_err() {
                        // Client disconnected; stop reading upstream
                        debug!("Client gone, cancelling relay");
                        return;
                    }
                }
            }

            if !buffer.is_empty() {
                warn!(remainder = buffer.len(), "Upstream closed with partial frame");
            }
        });

        Ok(rx)
    }
}

/// OpenAI-style error payload emitted when the upstream stream fails
/// mid-response, so a truncated generation is distinguishable from a
/// completed one.
fn error_frame(message: &str) -> String {
    serde_json::json!({
        "error": {
            "message": format!("upstream stream failed: {}", message),
            "type": "upstream_error",
        }
    })
    .to_string()
}

/// Relay payloads to the client, then exactly one end-of-stream marker.
/// The marker is emitted even when the upstream produced zero frames.
pub fn relay_payloads(rx: mpsc::Receiver<String>) -> impl Stream<Item = String> {
    ReceiverStream::new(rx).chain(tokio_stream::once(DONE_MARKER.to_string()))
}

/// Pop every complete SSE frame off the front of `buffer` and return the
/// `data:` payloads. An incomplete trailing frame stays in the buffer as
/// raw bytes; only whole frames are decoded, so a code point split across
/// network chunks is never mangled.
fn drain_data_frames(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
        let frame: Vec<u8> = buffer.drain(..pos + 2).collect();
        let frame = String::from_utf8_lossy(&frame);
        for line in frame.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
    }

    payloads
}

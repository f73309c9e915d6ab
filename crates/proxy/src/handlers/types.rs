//! Request body types
//!
//! Typed request bodies for the OpenAI-compatible surface. Fields the proxy
//! acts on are named; everything else is captured in `extra` and forwarded
//! verbatim. `top_k` is a proxy-only knob and is never serialized toward the
//! backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatCompletionRequest {
    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,

    #[validate(length(min = 1, message = "messages must not be empty"))]
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub stream: bool,

    /// Number of chunks to retrieve; proxy-only, stripped before forwarding
    #[serde(default, skip_serializing)]
    #[validate(range(min = 1, message = "top_k must be at least 1"))]
    pub top_k: Option<usize>,

    /// Passthrough fields (temperature, max_tokens, top_p, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompletionRequest {
    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,

    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub stream: bool,

    /// Number of chunks to retrieve; proxy-only, stripped before forwarding
    #[serde(default, skip_serializing)]
    #[validate(range(min = 1, message = "top_k must be at least 1"))]
    pub top_k: Option<usize>,

    /// Passthrough fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_round_trip() {
        let body = serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 128,
            "top_p": 0.9,
            "frequency_penalty": 0.5
        });

        let request: ChatCompletionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.max_tokens, Some(128));
        assert_eq!(request.extra["top_p"], 0.9);

        let forwarded = serde_json::to_value(&request).unwrap();
        assert_eq!(forwarded["max_tokens"], 128);
        assert_eq!(forwarded["top_p"], 0.9);
        assert_eq!(forwarded["frequency_penalty"], 0.5);
    }

    #[test]
    fn test_out_of_range_temperature_fails_validation() {
        let body = serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 3.5
        });
        let request: ChatCompletionRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_top_k_is_never_forwarded() {
        let body = serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "top_k": 3
        });

        let request: ChatCompletionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.top_k, Some(3));

        let forwarded = serde_json::to_value(&request).unwrap();
        assert!(forwarded.get("top_k").is_none());
    }

    #[test]
    fn test_empty_messages_fail_validation() {
        let body = serde_json::json!({"model": "m", "messages": []});
        let request: ChatCompletionRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_stream_defaults_to_false() {
        let body = serde_json::json!({"model": "m", "prompt": "hi"});
        let request: CompletionRequest = serde_json::from_value(body).unwrap();
        assert!(!request.stream);
    }
}

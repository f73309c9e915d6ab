//! Prompt augmentation
//!
//! Weaves retrieved context into outgoing requests. Chat requests get one
//! system message carrying the context; plain completion requests get the
//! context prepended to the prompt. When retrieval produced nothing the
//! request is forwarded untouched.

use crate::handlers::types::{ChatMessage, Role};
use ragrelay_common::errors::AppError;

/// Build the context-bearing system message content
pub fn rag_system_content(context: &str, top_k: usize) -> String {
    format!(
        "You are a helpful assistant with access to a document knowledge base. \
         Use the retrieved context below to answer when it is relevant; \
         otherwise answer from general knowledge.\n\n\
         Retrieved Context (from top {} relevant chunks):\n\n{}",
        top_k, context
    )
}

/// The content of the last user message, if any
pub fn last_user_message(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

/// The retrieval query for a conversation: the most recent user message.
/// A conversation without one is rejected here, before any retrieval or
/// backend I/O happens.
pub fn extract_query(messages: &[ChatMessage]) -> Result<&str, AppError> {
    last_user_message(messages).ok_or_else(|| AppError::MalformedRequest {
        message: "request contains no user message".to_string(),
    })
}

/// Insert exactly one context message: directly after the first existing
/// system message so caller instructions keep precedence, or at the front
/// when the conversation has none.
pub fn insert_context_message(messages: &mut Vec<ChatMessage>, content: String) {
    let position = messages
        .iter()
        .position(|m| m.role == Role::System)
        .map(|i| i + 1)
        .unwrap_or(0);

    messages.insert(
        position,
        ChatMessage {
            role: Role::System,
            content,
        },
    );
}

/// Prepend retrieved context to a plain completion prompt
pub fn augment_prompt(prompt: &str, context: &str) -> String {
    format!(
        "Retrieved Context:\n{}\n\nUser Query:\n{}\n\nResponse:",
        context, prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_last_user_message_scans_from_the_end() {
        let messages = vec![
            msg(Role::User, "first question"),
            msg(Role::Assistant, "answer"),
            msg(Role::User, "second question"),
        ];
        assert_eq!(last_user_message(&messages), Some("second question"));
    }

    #[test]
    fn test_no_user_message_is_none() {
        let messages = vec![msg(Role::System, "be terse")];
        assert_eq!(last_user_message(&messages), None);
    }

    #[test]
    fn test_conversation_without_user_message_is_malformed() {
        let messages = vec![
            msg(Role::System, "be terse"),
            msg(Role::Assistant, "hello"),
        ];
        let err = extract_query(&messages).unwrap_err();
        assert!(matches!(err, AppError::MalformedRequest { .. }));
    }

    #[test]
    fn test_extract_query_returns_latest_user_content() {
        let messages = vec![
            msg(Role::User, "old"),
            msg(Role::Assistant, "reply"),
            msg(Role::User, "new"),
        ];
        assert_eq!(extract_query(&messages).unwrap(), "new");
    }

    #[test]
    fn test_context_goes_after_existing_system_message() {
        let mut messages = vec![msg(Role::System, "be terse"), msg(Role::User, "question")];
        insert_context_message(&mut messages, "context here".into());

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "be terse");
        assert_eq!(messages[1].role, Role::System);
        assert_eq!(messages[1].content, "context here");
        assert_eq!(messages[2].role, Role::User);
    }

    #[test]
    fn test_context_goes_first_when_no_system_message() {
        let mut messages = vec![msg(Role::User, "question")];
        insert_context_message(&mut messages, "context here".into());

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "context here");
    }

    #[test]
    fn test_exactly_one_system_message_is_added() {
        let mut messages = vec![
            msg(Role::System, "a"),
            msg(Role::System, "b"),
            msg(Role::User, "question"),
        ];
        insert_context_message(&mut messages, "context".into());

        let system_count = messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_count, 3);
        // Inserted after the FIRST system message, not the last
        assert_eq!(messages[1].content, "context");
    }

    #[test]
    fn test_prompt_augmentation_format() {
        let augmented = augment_prompt("what is X?", "X is a thing.");
        assert_eq!(
            augmented,
            "Retrieved Context:\nX is a thing.\n\nUser Query:\nwhat is X?\n\nResponse:"
        );
    }
}

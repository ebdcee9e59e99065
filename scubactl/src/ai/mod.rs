//! Chat completion providers.
//!
//! The [`ChatProvider`] trait abstracts over the upstream LLM API so handlers
//! and tests don't depend on a live service. The production implementation is
//! [`groq::GroqProvider`], which speaks the OpenAI-compatible completions API.

pub mod groq;

use crate::db::models::messages::{MessageDBResponse, MessageRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// System prompt used when the user has no default custom instruction.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ScubaAI, a helpful and knowledgeable assistant. \
     Provide accurate, helpful, and engaging responses to user queries.";

/// A single message in the wire format of the completions API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Token accounting reported by the upstream API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The assistant's reply to a completion request.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

/// A model advertised by the upstream API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: String,
    #[serde(default)]
    pub context_window: Option<u32>,
}

/// A trait for requesting chat completions in OpenAI-compatible format.
///
/// In practice this makes HTTP calls to Groq via `reqwest`; tests swap in a
/// canned implementation.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Request a completion for the given message context.
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatCompletion>;

    /// List the models the upstream currently serves.
    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>>;
}

/// Build the message context for a new chat turn: system prompt first (the
/// user's default custom instruction, falling back to
/// [`DEFAULT_SYSTEM_PROMPT`]), then the stored history, then the new user
/// message.
pub fn prepare_messages(
    history: &[MessageDBResponse],
    user_content: &str,
    system_prompt: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(
        MessageRole::System,
        system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
    ));
    for message in history {
        messages.push(ChatMessage::new(message.role, message.content.clone()));
    }
    messages.push(ChatMessage::new(MessageRole::User, user_content));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn stored(role: MessageRole, content: &str) -> MessageDBResponse {
        MessageDBResponse {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_gets_default_system_prompt() {
        let messages = prepare_messages(&[], "hello", None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1], ChatMessage::new(MessageRole::User, "hello"));
    }

    #[test]
    fn custom_instruction_replaces_default_prompt() {
        let messages = prepare_messages(&[], "hello", Some("Answer only in haiku."));
        assert_eq!(messages[0].content, "Answer only in haiku.");
    }

    #[test]
    fn history_is_preserved_in_order() {
        let history = vec![
            stored(MessageRole::User, "first"),
            stored(MessageRole::Assistant, "second"),
        ];
        let messages = prepare_messages(&history, "third", None);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[3].content, "third");
    }
}

//! Shared data structures for the provider-neutral conversation model.
//!
//! Every provider adapter consumes the same canonical [`Message`] list and
//! produces a [`ChatResponse`]; provider-specific wire shapes never leak past
//! the `provider` module.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a canonical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical chat message shared across providers.
///
/// Within a conversation messages are chronological; a [`Role::System`] message
/// appears at most once and, when present, comes first.
///
/// # Examples
///
/// ```
/// # use parley_llm::types::{Message, Role};
/// let msg = Message::user("What is the capital of France?");
/// assert_eq!(msg.role, Role::User);
/// assert_eq!(msg.content, "What is the capital of France?");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role associated with this message.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Request handed to a provider adapter.
///
/// `messages` is the complete canonical payload produced by the payload
/// builder: an optional leading system message, any prior turns, and the new
/// user turn as the last element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Provider-side model name, e.g. `gpt-4.1-mini` or `gemini-2.0-flash`.
    pub model: String,
    /// Ordered canonical messages.
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// Normalized reply returned by a provider adapter.
///
/// # Examples
///
/// ```
/// # use parley_llm::types::{ChatResponse, ProviderMetadata};
/// let response = ChatResponse {
///     text: "Paris".into(),
///     usage: None,
///     finish_reason: None,
///     model: Some("gpt-4.1-mini".into()),
///     provider: ProviderMetadata { provider: "openai_chat".into(), ..Default::default() },
/// };
/// assert_eq!(response.text, "Paris");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Textual reply extracted from the first choice / candidate.
    pub text: String,
    /// Token usage accounting.
    pub usage: Option<TokenUsage>,
    /// Reason the provider stopped generating.
    pub finish_reason: Option<FinishReason>,
    /// Model reported by the provider.
    pub model: Option<String>,
    /// Provider metadata for debugging.
    pub provider: ProviderMetadata,
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    /// prompt tokens
    pub prompt_tokens: Option<u64>,
    /// completion tokens
    pub completion_tokens: Option<u64>,
    /// reasoning tokens
    pub reasoning_tokens: Option<u64>,
    /// Total tokens across prompt, completion, and reasoning.
    pub total_tokens: Option<u64>,
    /// Provider-specific accounting details.
    pub details: Option<HashMap<String, Value>>,
}

/// Why a chat response stopped generating content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
    Other(String),
}

/// Provider metadata returned with each response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Provider identifier such as `openai_chat`.
    pub provider: String,
    /// Upstream request identifier.
    pub request_id: Option<String>,
    /// Endpoint description or URL.
    pub endpoint: Option<String>,
    /// Raw response excerpt for debugging.
    pub raw: Option<Value>,
}

/// Capability descriptor attached to every provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityDescriptor {
    /// Whether the provider keeps history in a format other than the canonical
    /// message list, so the adapter must translate it on every call.
    pub supports_native_history: bool,
}

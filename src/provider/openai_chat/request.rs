use crate::error::LLMError;
use crate::types::{ChatRequest, Message};

use super::types::{OpenAiChatRequestBody, OpenAiRequestMessage};

/// 构建 Chat Completions 请求体
///
/// 规范化消息的角色与 OpenAI 完全一致，因此按原顺序逐条透传。
pub(crate) fn build_openai_body(request: &ChatRequest) -> Result<OpenAiChatRequestBody<'_>, LLMError> {
    if request.model.trim().is_empty() {
        return Err(LLMError::Validation {
            message: "model is required for OpenAI Chat".to_string(),
        });
    }
    if request.messages.is_empty() {
        return Err(LLMError::Validation {
            message: "OpenAI Chat request requires at least one message".to_string(),
        });
    }
    Ok(OpenAiChatRequestBody {
        model: &request.model,
        messages: request.messages.iter().map(convert_message).collect(),
    })
}

fn convert_message(message: &Message) -> OpenAiRequestMessage<'_> {
    OpenAiRequestMessage {
        role: message.role,
        content: &message.content,
    }
}

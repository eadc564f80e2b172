use crate::error::LLMError;
use crate::types::{ChatResponse, FinishReason, ProviderMetadata, TokenUsage};

use super::types::{OpenAiChatResponse, OpenAiMessageContent, OpenAiUsage};

/// 将 Chat Completions 响应映射为统一的 ChatResponse
///
/// 只取第一个 choice 的文本内容。
pub(crate) fn map_response(
    resp: OpenAiChatResponse,
    provider: &'static str,
    endpoint: String,
) -> Result<ChatResponse, LLMError> {
    let raw = serde_json::to_value(&resp).ok();
    let choice = resp
        .choices
        .first()
        .ok_or_else(|| LLMError::provider(provider, "response contained no choices"))?;
    let message = choice
        .message
        .as_ref()
        .ok_or_else(|| LLMError::provider(provider, "first choice carried no message"))?;

    let text = match &message.content {
        Some(OpenAiMessageContent::Text(text)) => text.clone(),
        Some(OpenAiMessageContent::Parts(parts)) => parts
            .iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text.as_deref())
            .collect::<String>(),
        None => {
            let reason = message
                .refusal
                .as_deref()
                .map(|refusal| format!("model refused: {refusal}"))
                .unwrap_or_else(|| "first choice carried no content".to_string());
            return Err(LLMError::provider(provider, reason));
        }
    };

    Ok(ChatResponse {
        text,
        usage: resp.usage.clone().map(convert_usage),
        finish_reason: choice.finish_reason.as_deref().map(convert_finish_reason),
        model: resp.model.clone(),
        provider: ProviderMetadata {
            provider: provider.to_string(),
            request_id: resp.id.clone(),
            endpoint: Some(endpoint),
            raw,
        },
    })
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        "function_call" => FinishReason::FunctionCall,
        other => FinishReason::Other(other.to_string()),
    }
}

pub(crate) fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        reasoning_tokens: usage.reasoning_tokens,
        total_tokens: usage.total_tokens,
        details: None,
    }
}

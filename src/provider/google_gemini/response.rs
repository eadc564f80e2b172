use crate::error::LLMError;
use crate::types::{ChatResponse, FinishReason, ProviderMetadata, TokenUsage};

use super::types::{GeminiGenerateContentResponse, GeminiUsageMetadata};

/// 将 Gemini GenerateContentResponse 映射为统一的 ChatResponse
///
/// 回复文本取第一个候选中所有非 thought 文本 part 的拼接。
pub(crate) fn map_response(
    resp: GeminiGenerateContentResponse,
    provider: &'static str,
    endpoint: String,
) -> Result<ChatResponse, LLMError> {
    let raw = serde_json::to_value(&resp).ok();

    let Some(candidate) = resp.candidates.first() else {
        // 没有候选通常意味着 prompt 被拦截
        let reason = resp
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(|reason| reason.as_str())
            .map(|reason| format!("prompt blocked: {reason}"))
            .unwrap_or_else(|| "response contained no candidates".to_string());
        return Err(LLMError::provider(provider, reason));
    };

    let text: Option<String> = candidate.content.as_ref().and_then(|content| {
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter(|part| !part.thought.unwrap_or(false))
            .filter_map(|part| part.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    });
    let finish_reason = candidate.finish_reason.as_deref().map(convert_finish_reason);

    let Some(text) = text else {
        let reason = candidate
            .finish_reason
            .as_deref()
            .map(|reason| format!("candidate carried no text (finish reason {reason})"))
            .unwrap_or_else(|| "candidate carried no text".to_string());
        return Err(LLMError::provider(provider, reason));
    };

    Ok(ChatResponse {
        text,
        usage: resp.usage_metadata.as_ref().map(convert_usage),
        finish_reason,
        model: resp.model_version.clone(),
        provider: ProviderMetadata {
            provider: provider.to_string(),
            request_id: resp.response_id.clone(),
            endpoint: Some(endpoint),
            raw,
        },
    })
}

/// FinishReason 文本 -> 通用 FinishReason
pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "MALFORMED_FUNCTION_CALL" => FinishReason::FunctionCall,
        // SAFETY / BLOCKLIST / PROHIBITED_CONTENT / SPII 等都视为内容过滤
        "SAFETY" | "RECITATION" | "LANGUAGE" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
        | "IMAGE_SAFETY" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}

/// UsageMetadata -> TokenUsage
pub(crate) fn convert_usage(usage: &GeminiUsageMetadata) -> TokenUsage {
    let details = usage.cached_content_token_count.map(|cached| {
        [(
            "cached_content_token_count".to_string(),
            serde_json::Value::from(cached),
        )]
        .into_iter()
        .collect()
    });

    TokenUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        reasoning_tokens: usage.thoughts_token_count,
        total_tokens: usage.total_token_count,
        details,
    }
}

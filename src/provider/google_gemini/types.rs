use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gemini 的对话角色 助手一方称为 model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeminiRole {
    User,
    Model,
}

/// 原生历史中的一轮 (Content)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeminiTurn {
    pub role: GeminiRole,
    pub parts: Vec<GeminiTextPart>,
}

impl GeminiTurn {
    pub fn new(role: GeminiRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![GeminiTextPart { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(GeminiRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(GeminiRole::Model, text)
    }

    /// 所有文本 part 拼接后的内容
    pub fn text(&self) -> String {
        self.parts.iter().map(|part| part.text.as_str()).collect()
    }
}

/// 纯文本 Part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeminiTextPart {
    pub text: String,
}

/// GenerateContent 请求体
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiGenerateContentRequest<'a> {
    pub(crate) contents: &'a [GeminiTurn],
    #[serde(rename = "system_instruction", skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<GeminiSystemInstruction<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiSystemInstruction<'a> {
    pub(crate) parts: [GeminiSystemPart<'a>; 1],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiSystemPart<'a> {
    pub(crate) text: &'a str,
}

/// GenerateContentResponse 顶层结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiGenerateContentResponse {
    /// 候选回答列表
    #[serde(default)]
    pub(crate) candidates: Vec<GeminiCandidate>,
    /// 与内容过滤相关的提示反馈
    #[serde(default, rename = "promptFeedback")]
    pub(crate) prompt_feedback: Option<Value>,
    #[serde(default, rename = "usageMetadata")]
    pub(crate) usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default, rename = "modelVersion")]
    pub(crate) model_version: Option<String>,
    #[serde(default, rename = "responseId")]
    pub(crate) response_id: Option<String>,
}

/// 单个候选回答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiCandidate {
    #[serde(default)]
    pub(crate) content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    pub(crate) finish_reason: Option<String>,
    #[serde(default)]
    pub(crate) index: Option<usize>,
}

/// 候选内容 part 可能是文本以外的类型 因此 text 可缺省
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default)]
    pub(crate) parts: Vec<GeminiPart>,
    #[serde(default)]
    pub(crate) role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiPart {
    #[serde(default)]
    pub(crate) text: Option<String>,
    /// 思考摘要 不计入回复文本
    #[serde(default)]
    pub(crate) thought: Option<bool>,
    #[serde(flatten)]
    pub(crate) extra: HashMap<String, Value>,
}

/// UsageMetadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub(crate) prompt_token_count: Option<u64>,
    #[serde(rename = "cachedContentTokenCount", default)]
    pub(crate) cached_content_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount", default)]
    pub(crate) candidates_token_count: Option<u64>,
    #[serde(rename = "totalTokenCount", default)]
    pub(crate) total_token_count: Option<u64>,
    #[serde(rename = "thoughtsTokenCount", default)]
    pub(crate) thoughts_token_count: Option<u64>,
}

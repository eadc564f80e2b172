use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LLMError;
use crate::types::{CapabilityDescriptor, ChatRequest, ChatResponse};

pub mod google_gemini;
pub mod openai_chat;
pub(crate) mod retry;

/// 统一的 Provider Trait 每个供应商家族实现一次
///
/// 调用方只传入规范化的消息序列 历史格式的转换由各实现内部完成
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// 提交完整请求并等待回复
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError>;

    /// 描述支持的能力范围
    fn capabilities(&self) -> CapabilityDescriptor;

    /// 供应商名称
    fn name(&self) -> &'static str;
}

/// 线程安全 Provider
pub type DynProvider = Arc<dyn LLMProvider>;

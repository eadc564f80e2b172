use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::{
    Credentials, ModelDescriptor, ModelRegistry, PromptTable, StorePolicy, build_provider,
};
use crate::conversation::ConversationStore;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::payload::build_payload;
use crate::provider::DynProvider;
use crate::types::{ChatRequest, ChatResponse, Message};
use crate::validate::{ResponseSchema, validate_response};

/// LLM 调用入口 持有配置、Provider 缓存与会话存储
///
/// 每个实例的状态彼此独立，测试中可以同时构建多个客户端。
pub struct LLMClient {
    models: ModelRegistry,
    prompts: PromptTable,
    credentials: Credentials,
    transport: DynHttpTransport,
    providers: Mutex<HashMap<String, DynProvider>>,
    conversations: ConversationStore,
}

impl LLMClient {
    /// 创建 Builder
    pub fn builder() -> LLMClientBuilder {
        LLMClientBuilder::default()
    }

    /// 一次性调用 不写入会话存储
    pub async fn one_shot(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
        data_suffix: &str,
    ) -> Result<String, LLMError> {
        let payload = build_payload(
            &self.prompts,
            &self.conversations,
            system_prompt,
            user_prompt,
            "",
            data_suffix,
        );
        let response = self.chat(model, payload).await?;
        Ok(response.text)
    }

    /// 在 `conversation_id` 下继续（或开始）一段会话
    ///
    /// 同一 id 的轮次串行执行；调用失败时存储保持不变。
    /// 轮次进行中调用 [`LLMClient::clear_conversations`] 时，回复照常返回但不再写回历史。
    /// `conversation_id` 为空时等价于 [`LLMClient::one_shot`]。
    pub async fn conversation(
        &self,
        conversation_id: &str,
        user_prompt: &str,
        model: &str,
        system_prompt: &str,
        data_suffix: &str,
    ) -> Result<String, LLMError> {
        if conversation_id.is_empty() {
            return self
                .one_shot(system_prompt, user_prompt, model, data_suffix)
                .await;
        }

        let turn = self.conversations.lock_turn(conversation_id).await;
        let mut history = build_payload(
            &self.prompts,
            &self.conversations,
            system_prompt,
            user_prompt,
            conversation_id,
            data_suffix,
        );
        let response = self.chat(model, history.clone()).await?;
        history.push(Message::assistant(response.text.clone()));
        self.conversations.commit(&turn, history);
        Ok(response.text)
    }

    /// 将规范消息序列发送给昵称对应的 Provider
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<Message>,
    ) -> Result<ChatResponse, LLMError> {
        let descriptor = self.models.get(model)?;
        let provider = self.provider_for(descriptor)?;
        debug!(
            model,
            provider = provider.name(),
            native_history = provider.capabilities().supports_native_history,
            messages = messages.len(),
            "dispatching chat"
        );
        let request = ChatRequest::new(descriptor.provider_model.clone(), messages);
        provider.chat(request).await.inspect_err(|err| {
            warn!(model, provider = provider.name(), error = %err, "chat request failed");
        })
    }

    /// 返回会话历史 未知 id 返回 `None`
    pub fn get_conversation(&self, conversation_id: &str) -> Option<Vec<Message>> {
        self.conversations.get(conversation_id)
    }

    /// 清空所有会话
    pub fn clear_conversations(&self) {
        self.conversations.clear();
    }

    /// 按 `T` 解析模型回复 失败时返回 `T::default()`
    pub fn validate_response<T: ResponseSchema>(&self, raw: &str) -> T {
        validate_response(raw)
    }

    /// 丢弃所有缓存的 Provider 下次使用时重新构建
    pub fn reset_clients(&self) {
        self.cache().clear();
    }

    /// 返回已缓存 Provider 的 provider id
    pub fn cached_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cache().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn prompts(&self) -> &PromptTable {
        &self.prompts
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// 获取（必要时构建）该描述所属 provider id 的 Provider
    fn provider_for(&self, descriptor: &ModelDescriptor) -> Result<DynProvider, LLMError> {
        let mut cache = self.cache();
        if let Some(provider) = cache.get(&descriptor.provider_id) {
            return Ok(provider.clone());
        }
        let provider = build_provider(
            &descriptor.provider_id,
            descriptor,
            &self.credentials,
            self.transport.clone(),
        )?;
        info!(
            provider_id = %descriptor.provider_id,
            provider = provider.name(),
            base_url = %descriptor.base_url,
            "created provider client"
        );
        cache.insert(descriptor.provider_id.clone(), provider.clone());
        Ok(provider)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, DynProvider>> {
        self.providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// 负责组装 LLMClient 的 Builder
#[derive(Default)]
pub struct LLMClientBuilder {
    models: ModelRegistry,
    prompts: PromptTable,
    credentials: Credentials,
    transport: Option<DynHttpTransport>,
    policy: StorePolicy,
    providers: HashMap<String, DynProvider>,
}

impl LLMClientBuilder {
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptTable) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// 指定 HTTP 传输层 默认使用 reqwest
    pub fn with_transport(mut self, transport: DynHttpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_store_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 为 provider id 预先注册一个 Provider 跳过按需构建
    pub fn register_provider<S: Into<String>>(mut self, provider_id: S, provider: DynProvider) -> Self {
        self.providers.insert(provider_id.into(), provider);
        self
    }

    /// 构建最终的 LLMClient
    pub fn build(self) -> Result<LLMClient, LLMError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_dyn_transport()?,
        };
        Ok(LLMClient {
            models: self.models,
            prompts: self.prompts,
            credentials: self.credentials,
            transport,
            providers: Mutex::new(self.providers),
            conversations: ConversationStore::with_policy(self.policy),
        })
    }
}

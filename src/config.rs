use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::provider::DynProvider;
use crate::provider::google_gemini::GoogleGeminiProvider;
use crate::provider::openai_chat::OpenAiChatProvider;

/// Google 家族的 provider id
pub const GOOGLE_PROVIDER_ID: &str = "google";
/// 空 base_url 时使用其密钥的 provider id
pub const OPENAI_PROVIDER_ID: &str = "openAI";

/// provider id 与环境变量的对应关系
pub const PROVIDER_ENV_VARS: [(&str, &str); 6] = [
    ("pplx", "PPLX_API_KEY"),
    (OPENAI_PROVIDER_ID, "OPENAI_API_KEY"),
    ("nvidia", "NVIDIA_API_KEY"),
    (GOOGLE_PROVIDER_ID, "GOOGLE_API_KEY"),
    ("groq", "GROQ_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
];

/// 模型描述 对应注册表中的一个昵称
///
/// 在 JSON 中写作三元组 `["gpt-4.1-mini", "openAI", ""]`，
/// base_url 为空表示使用该家族的默认端点。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct ModelDescriptor {
    pub provider_model: String,
    pub provider_id: String,
    pub base_url: String,
}

impl ModelDescriptor {
    pub fn new(
        provider_model: impl Into<String>,
        provider_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider_model: provider_model.into(),
            provider_id: provider_id.into(),
            base_url: base_url.into(),
        }
    }

    pub fn family(&self) -> ProviderFamily {
        ProviderFamily::for_provider_id(&self.provider_id)
    }
}

impl From<(String, String, String)> for ModelDescriptor {
    fn from((provider_model, provider_id, base_url): (String, String, String)) -> Self {
        Self {
            provider_model,
            provider_id,
            base_url,
        }
    }
}

impl From<ModelDescriptor> for (String, String, String) {
    fn from(descriptor: ModelDescriptor) -> Self {
        (
            descriptor.provider_model,
            descriptor.provider_id,
            descriptor.base_url,
        )
    }
}

/// 供应商家族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    OpenAiCompatible,
    GoogleGemini,
}

impl ProviderFamily {
    pub fn for_provider_id(provider_id: &str) -> Self {
        if provider_id == GOOGLE_PROVIDER_ID {
            ProviderFamily::GoogleGemini
        } else {
            ProviderFamily::OpenAiCompatible
        }
    }
}

/// 模型注册表 昵称 -> ModelDescriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 文本解析
    pub fn from_json_str(text: &str) -> Result<Self, LLMError> {
        parse_json_document("model registry", text)
    }

    /// 从 JSON 文件读取
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LLMError> {
        read_json_document("model registry", path.as_ref())
    }

    pub fn insert(&mut self, nickname: impl Into<String>, descriptor: ModelDescriptor) {
        self.models.insert(nickname.into(), descriptor);
    }

    pub fn with_model(mut self, nickname: impl Into<String>, descriptor: ModelDescriptor) -> Self {
        self.insert(nickname, descriptor);
        self
    }

    /// 查找昵称 未注册时返回 [`LLMError::UnknownModel`]
    pub fn get(&self, nickname: &str) -> Result<&ModelDescriptor, LLMError> {
        self.models
            .get(nickname)
            .ok_or_else(|| LLMError::UnknownModel {
                nickname: nickname.to_string(),
            })
    }

    pub fn nicknames(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Prompt 表 符号键 -> prompt 文本
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTable {
    prompts: HashMap<String, String>,
}

impl PromptTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self, LLMError> {
        parse_json_document("prompt table", text)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LLMError> {
        read_json_document("prompt table", path.as_ref())
    }

    pub fn insert(&mut self, key: impl Into<String>, prompt: impl Into<String>) {
        self.prompts.insert(key.into(), prompt.into());
    }

    pub fn with_prompt(mut self, key: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.insert(key, prompt);
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.prompts.get(key).map(String::as_str)
    }

    /// 已注册的键返回表中文本 否则把输入本身当作字面 prompt
    ///
    /// # Examples
    ///
    /// ```
    /// # use parley_llm::config::PromptTable;
    /// let table = PromptTable::new().with_prompt("sysPrompt2", "You are a geography tutor.");
    /// assert_eq!(table.resolve("sysPrompt2"), "You are a geography tutor.");
    /// assert_eq!(table.resolve("what is the capital of "), "what is the capital of ");
    /// ```
    pub fn resolve<'a>(&'a self, key_or_text: &'a str) -> &'a str {
        match self.lookup(key_or_text) {
            Some(prompt) => prompt,
            None => key_or_text,
        }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

/// 鉴权信息 provider id -> API Key
///
/// `Debug` 输出只包含 provider id，不会泄露密钥。
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取 `<PROVIDER>_API_KEY` 环境变量 空值视为缺失
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 先加载 `.env` 文件（不存在时忽略），再读取环境变量
    pub fn from_dotenv() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_env()
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut credentials = Self::new();
        for (provider_id, var) in PROVIDER_ENV_VARS {
            if let Some(key) = lookup(var).filter(|value| !value.trim().is_empty()) {
                credentials.insert(provider_id, key);
            }
        }
        info!(
            providers = ?credentials.provider_ids(),
            "loaded provider credentials"
        );
        credentials
    }

    pub fn insert(&mut self, provider_id: impl Into<String>, key: impl Into<String>) {
        self.keys.insert(provider_id.into(), key.into());
    }

    pub fn with_key(mut self, provider_id: impl Into<String>, key: impl Into<String>) -> Self {
        self.insert(provider_id, key);
        self
    }

    /// 查找密钥 缺失时返回 [`LLMError::Auth`]
    pub fn get(&self, provider_id: &str) -> Result<&str, LLMError> {
        self.keys
            .get(provider_id)
            .map(String::as_str)
            .ok_or_else(|| LLMError::Auth {
                message: format!("no API key configured for provider {provider_id}"),
            })
    }

    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("providers", &self.provider_ids())
            .finish()
    }
}

/// 会话存储的容量策略 默认不设上限
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePolicy {
    /// 最多保留的会话数 超出时淘汰最久未使用的会话
    #[serde(default)]
    pub max_conversations: Option<NonZeroUsize>,
    /// 每个会话最多保留的 user/assistant 轮数 超出时丢弃最早的轮次
    #[serde(default)]
    pub max_turns: Option<NonZeroUsize>,
}

impl StorePolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// 根据 provider id 与模型描述构建 Provider
///
/// - google: 使用 google 密钥，模型名随每次请求传入
/// - base_url 为空: OpenAI 默认端点，使用 openAI 密钥
/// - 其它: 指向该 base_url 的 OpenAI 兼容端点，使用该 provider 自己的密钥
pub fn build_provider(
    provider_id: &str,
    descriptor: &ModelDescriptor,
    credentials: &Credentials,
    transport: DynHttpTransport,
) -> Result<DynProvider, LLMError> {
    let provider: DynProvider = match ProviderFamily::for_provider_id(provider_id) {
        ProviderFamily::GoogleGemini => {
            let api_key = credentials.get(GOOGLE_PROVIDER_ID)?;
            let mut provider = GoogleGeminiProvider::new(transport, api_key);
            if !descriptor.base_url.is_empty() {
                provider = provider.with_base_url(descriptor.base_url.clone());
            }
            Arc::new(provider)
        }
        ProviderFamily::OpenAiCompatible if descriptor.base_url.is_empty() => {
            let api_key = credentials.get(OPENAI_PROVIDER_ID)?;
            Arc::new(OpenAiChatProvider::new(transport, api_key))
        }
        ProviderFamily::OpenAiCompatible => {
            let api_key = credentials.get(provider_id)?;
            Arc::new(
                OpenAiChatProvider::new(transport, api_key)
                    .with_base_url(descriptor.base_url.clone()),
            )
        }
    };
    Ok(provider)
}

fn parse_json_document<T: DeserializeOwned>(field: &str, text: &str) -> Result<T, LLMError> {
    serde_json::from_str(text)
        .map_err(|err| LLMError::invalid_config(field, format!("malformed JSON: {err}")))
}

fn read_json_document<T: DeserializeOwned>(field: &str, path: &Path) -> Result<T, LLMError> {
    let text = fs::read_to_string(path).map_err(|err| {
        LLMError::invalid_config(field, format!("cannot read {}: {err}", path.display()))
    })?;
    parse_json_document(field, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::reqwest::default_dyn_transport;
    use std::io::Write;

    const MODELS: &str = r#"{
        "gpt-4.1-nano": ["gpt-4.1-nano", "openAI", ""],
        "sonar": ["sonar", "pplx", "https://api.perplexity.ai"],
        "gemini-1.5-flash": ["gemini-1.5-flash", "google", ""]
    }"#;

    #[test]
    fn registry_parses_tuple_entries() {
        let registry = ModelRegistry::from_json_str(MODELS).expect("registry");
        assert_eq!(registry.len(), 3);

        let sonar = registry.get("sonar").expect("sonar");
        assert_eq!(
            sonar,
            &ModelDescriptor::new("sonar", "pplx", "https://api.perplexity.ai")
        );
        assert_eq!(sonar.family(), ProviderFamily::OpenAiCompatible);
        assert_eq!(
            registry.get("gemini-1.5-flash").expect("gemini").family(),
            ProviderFamily::GoogleGemini
        );
    }

    #[test]
    fn registry_unknown_nickname_is_config_error() {
        let registry = ModelRegistry::new();
        match registry.get("missing") {
            Err(LLMError::UnknownModel { nickname }) => assert_eq!(nickname, "missing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn registry_rejects_malformed_documents() {
        let err = ModelRegistry::from_json_str(r#"{"bad": ["only-two", "fields"]}"#)
            .expect_err("should fail");
        match err {
            LLMError::InvalidConfig { field, .. } => assert_eq!(field, "model registry"),
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn registry_and_prompts_load_from_files() {
        let mut models = tempfile::NamedTempFile::new().expect("temp file");
        models.write_all(MODELS.as_bytes()).expect("write");
        let registry = ModelRegistry::from_path(models.path()).expect("registry");
        assert!(registry.get("gpt-4.1-nano").is_ok());

        let mut prompts = tempfile::NamedTempFile::new().expect("temp file");
        prompts
            .write_all(br#"{"sysPrompt2": "You answer in one word."}"#)
            .expect("write");
        let table = PromptTable::from_path(prompts.path()).expect("prompts");
        assert_eq!(table.resolve("sysPrompt2"), "You answer in one word.");

        let missing = PromptTable::from_path("/definitely/not/here.json").expect_err("missing");
        assert!(matches!(missing, LLMError::InvalidConfig { .. }));
    }

    #[test]
    fn prompt_resolution_falls_back_to_literal() {
        let table = PromptTable::from_json_str(r#"{"greet": "Say hello."}"#).expect("prompts");
        assert_eq!(table.lookup("greet"), Some("Say hello."));
        assert_eq!(table.resolve("greet"), "Say hello.");
        assert_eq!(table.lookup("Say goodbye."), None);
        assert_eq!(table.resolve("Say goodbye."), "Say goodbye.");
        assert_eq!(table.resolve(""), "");
    }

    #[test]
    fn credentials_read_known_env_vars_and_skip_blank() {
        let env = HashMap::from([
            ("OPENAI_API_KEY", "sk-openai"),
            ("GOOGLE_API_KEY", "g-key"),
            ("GROQ_API_KEY", "   "),
            ("UNRELATED_API_KEY", "x"),
        ]);
        let credentials = Credentials::from_lookup(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(credentials.get("openAI").expect("openai"), "sk-openai");
        assert_eq!(credentials.get("google").expect("google"), "g-key");
        assert!(matches!(
            credentials.get("groq"),
            Err(LLMError::Auth { .. })
        ));
        assert_eq!(
            credentials.provider_ids(),
            vec!["google".to_string(), "openAI".to_string()]
        );
    }

    #[test]
    fn credentials_debug_hides_keys() {
        let credentials = Credentials::new().with_key("openAI", "sk-secret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("openAI"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn build_provider_selects_family_and_key() {
        let transport = default_dyn_transport().expect("transport");
        let credentials = Credentials::new()
            .with_key("openAI", "sk-openai")
            .with_key("pplx", "pplx-key")
            .with_key("google", "g-key");

        let openai = build_provider(
            "openAI",
            &ModelDescriptor::new("gpt-4.1-nano", "openAI", ""),
            &credentials,
            transport.clone(),
        )
        .expect("openai");
        assert_eq!(openai.name(), "openai_chat");

        let pplx = build_provider(
            "pplx",
            &ModelDescriptor::new("sonar", "pplx", "https://api.perplexity.ai"),
            &credentials,
            transport.clone(),
        )
        .expect("pplx");
        assert_eq!(pplx.name(), "openai_chat");

        let gemini = build_provider(
            "google",
            &ModelDescriptor::new("gemini-1.5-flash", "google", ""),
            &credentials,
            transport,
        )
        .expect("gemini");
        assert_eq!(gemini.name(), "google_gemini");
        assert!(gemini.capabilities().supports_native_history);
    }

    #[test]
    fn build_provider_requires_credential() {
        let transport = default_dyn_transport().expect("transport");
        let credentials = Credentials::new().with_key("openAI", "sk-openai");

        let result = build_provider(
            "groq",
            &ModelDescriptor::new("llama-3.1-8b", "groq", "https://api.groq.com/openai/v1"),
            &credentials,
            transport,
        );
        match result {
            Err(LLMError::Auth { message }) => assert!(message.contains("groq"), "{message}"),
            Err(other) => panic!("unexpected error type: {other:?}"),
            Ok(_) => panic!("expected auth error"),
        }
    }

    #[test]
    fn store_policy_defaults_to_unbounded() {
        let policy: StorePolicy = serde_json::from_str("{}").expect("policy");
        assert_eq!(policy, StorePolicy::unbounded());
        let policy: StorePolicy =
            serde_json::from_str(r#"{"max_conversations": 10}"#).expect("policy");
        assert_eq!(policy.max_conversations, NonZeroUsize::new(10));
        assert_eq!(policy.max_turns, None);
    }

    /// 零值的上限没有意义，解析时直接拒绝
    #[test]
    fn store_policy_rejects_zero_limits() {
        assert!(serde_json::from_str::<StorePolicy>(r#"{"max_turns": 0}"#).is_err());
        assert!(serde_json::from_str::<StorePolicy>(r#"{"max_conversations": 0}"#).is_err());
        let policy: StorePolicy = serde_json::from_str(r#"{"max_turns": 1}"#).expect("policy");
        assert_eq!(policy.max_turns, Some(NonZeroUsize::MIN));
    }
}

use crate::error::LLMError;
use crate::types::{ChatResponse, Message, Role};

use super::provider::GoogleGeminiProvider;
use super::types::{GeminiRole, GeminiTurn};

/// Splits canonical history into a Gemini system instruction and native turns.
///
/// `user` messages become `user` turns, `assistant` messages become `model`
/// turns, and the system message is pulled out so it can travel as a
/// standalone instruction. When several system messages are present the
/// first one wins.
///
/// # Examples
///
/// ```
/// # use parley_llm::types::Message;
/// # use parley_llm::provider::google_gemini::{to_native_history, GeminiTurn};
/// let (system, turns) = to_native_history(&[
///     Message::system("be brief"),
///     Message::user("hi"),
///     Message::assistant("hello"),
/// ]);
/// assert_eq!(system.as_deref(), Some("be brief"));
/// assert_eq!(turns, vec![GeminiTurn::user("hi"), GeminiTurn::model("hello")]);
/// ```
pub fn to_native_history(messages: &[Message]) -> (Option<String>, Vec<GeminiTurn>) {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => {
                if system.is_none() {
                    system = Some(message.content.clone());
                }
            }
            Role::User => turns.push(GeminiTurn::user(message.content.clone())),
            Role::Assistant => turns.push(GeminiTurn::model(message.content.clone())),
        }
    }
    (system, turns)
}

/// Rebuilds canonical history from a system instruction and native turns.
///
/// Inverse of [`to_native_history`]: `to_canonical(to_native_history(m))`
/// reproduces `m` whenever `m` holds at most one, leading, system message.
pub fn to_canonical(system: Option<&str>, turns: &[GeminiTurn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.extend(turns.iter().map(|turn| match turn.role {
        GeminiRole::User => Message::user(turn.text()),
        GeminiRole::Model => Message::assistant(turn.text()),
    }));
    messages
}

/// 对话会话 对应 SDK 中的 `chats.create`
///
/// 会话持有模型名、可选的 system instruction 与原生历史；每次
/// [`GeminiChat::send_message`] 成功后把用户轮次与模型回复追加到历史末尾。
pub struct GeminiChat<'a> {
    provider: &'a GoogleGeminiProvider,
    model: String,
    system_instruction: Option<String>,
    history: Vec<GeminiTurn>,
}

impl<'a> GeminiChat<'a> {
    pub(crate) fn new(
        provider: &'a GoogleGeminiProvider,
        model: impl Into<String>,
        system_instruction: Option<String>,
        history: Vec<GeminiTurn>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_instruction: system_instruction.filter(|text| !text.is_empty()),
            history,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn history(&self) -> &[GeminiTurn] {
        &self.history
    }

    /// 发送新的用户轮次 失败时历史保持不变
    pub async fn send_message(&mut self, text: impl Into<String>) -> Result<ChatResponse, LLMError> {
        let mut contents = self.history.clone();
        contents.push(GeminiTurn::user(text));
        let response = self
            .provider
            .generate_content(&self.model, &contents, self.system_instruction.as_deref())
            .await?;
        contents.push(GeminiTurn::model(response.text.clone()));
        self.history = contents;
        Ok(response)
    }
}

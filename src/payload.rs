use tracing::debug;

use crate::config::PromptTable;
use crate::conversation::ConversationStore;
use crate::types::Message;

/// 构建一次请求的规范消息序列
///
/// - `system_prompt` 与 `user_prompt` 先经过 [`PromptTable::resolve`]
/// - `conversation_id` 非空且存储中已有历史：在历史末尾追加
///   `user_prompt + data_suffix`，原有的 system 消息保持不变，本次的 system prompt 被忽略
/// - 其它情况（一次性调用、未知 id）：返回 `[system, user + data_suffix]`
///
/// # Examples
///
/// ```
/// # use parley_llm::config::PromptTable;
/// # use parley_llm::conversation::ConversationStore;
/// # use parley_llm::payload::build_payload;
/// # use parley_llm::types::Message;
/// let prompts = PromptTable::new().with_prompt("tutor", "You are a geography tutor.");
/// let store = ConversationStore::new();
/// let payload = build_payload(&prompts, &store, "tutor", "capital of ", "", "France");
/// assert_eq!(
///     payload,
///     vec![
///         Message::system("You are a geography tutor."),
///         Message::user("capital of France"),
///     ]
/// );
/// ```
pub fn build_payload(
    prompts: &PromptTable,
    store: &ConversationStore,
    system_prompt: &str,
    user_prompt: &str,
    conversation_id: &str,
    data_suffix: &str,
) -> Vec<Message> {
    let user = Message::user(format!("{}{data_suffix}", prompts.resolve(user_prompt)));

    let history = if conversation_id.is_empty() {
        None
    } else {
        store.get(conversation_id)
    };

    let payload = match history {
        Some(mut history) => {
            history.push(user);
            history
        }
        None => vec![Message::system(prompts.resolve(system_prompt)), user],
    };
    debug!(
        conversation = conversation_id,
        messages = payload.len(),
        "built payload"
    );
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts() -> PromptTable {
        PromptTable::new()
            .with_prompt("sysPrompt", "You are terse.")
            .with_prompt("askCapital", "What is the capital of ")
    }

    /// 一次性调用始终返回两条消息，与存储内容无关
    #[test]
    fn one_shot_payload_has_two_messages() {
        let store = ConversationStore::new();
        store.replace(
            "",
            vec![Message::system("stale"), Message::user("stale")],
        );

        let payload = build_payload(&prompts(), &store, "sysPrompt", "askCapital", "", "France?");
        assert_eq!(
            payload,
            vec![
                Message::system("You are terse."),
                Message::user("What is the capital of France?"),
            ]
        );
    }

    #[test]
    fn literal_prompts_pass_through() {
        let store = ConversationStore::new();
        let payload = build_payload(&prompts(), &store, "Be kind.", "Hello", "", "");
        assert_eq!(
            payload,
            vec![Message::system("Be kind."), Message::user("Hello")]
        );
    }

    /// 已有会话时保留原有 system 消息并追加新的用户轮次
    #[test]
    fn continuation_extends_stored_history() {
        let store = ConversationStore::new();
        store.replace(
            "geo",
            vec![
                Message::system("S"),
                Message::user("U1"),
                Message::assistant("A1"),
            ],
        );

        let payload = build_payload(&prompts(), &store, "S2", "up2", "geo", "data2");
        assert_eq!(
            payload,
            vec![
                Message::system("S"),
                Message::user("U1"),
                Message::assistant("A1"),
                Message::user("up2data2"),
            ]
        );
        // 构建 payload 不修改存储
        assert_eq!(store.get("geo").map(|h| h.len()), Some(3));
    }

    #[test]
    fn unknown_conversation_starts_fresh() {
        let store = ConversationStore::new();
        let payload = build_payload(&prompts(), &store, "sysPrompt", "hi", "new-id", "");
        assert_eq!(
            payload,
            vec![Message::system("You are terse."), Message::user("hi")]
        );
    }
}

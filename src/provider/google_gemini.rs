//! Google Gemini GenerateContent 及会话历史转换

mod chat;
mod error;
mod provider;
mod request;
mod response;
mod types;

pub use chat::{GeminiChat, to_canonical, to_native_history};
pub use provider::{DEFAULT_BASE_URL, GoogleGeminiProvider};
pub use types::{GeminiRole, GeminiTextPart, GeminiTurn};

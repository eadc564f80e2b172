//! OpenAI Chat Completions 及其兼容接口 (Perplexity / NVIDIA / Groq 等)

mod error;
mod provider;
mod request;
mod response;
mod types;

pub use provider::{DEFAULT_BASE_URL, OpenAiChatProvider};

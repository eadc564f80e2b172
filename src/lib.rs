//! 多供应商 LLM 对话客户端 统一 payload 构建与会话历史

pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod payload;
pub mod provider;
pub mod types;
pub mod validate;

pub use client::LLMClient;
pub use error::LLMError;
pub use provider::LLMProvider;
pub use types::*;
pub use validate::{ResponseSchema, validate_response};

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

pub(crate) fn parse_openai_error(status: u16, body: &str, retry_after: Option<Duration>) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        #[allow(dead_code)]
        r#type: Option<String>,
        code: Option<Value>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let code = error.code.as_ref().map(|code| match code {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
        if let Some(code) = &code {
            message = format!("{message} ({code})");
        }

        if looks_like_token_limit_error(code.as_deref(), &message) {
            return LLMError::TokenLimitExceeded { message };
        }

        return match status {
            401 | 403 => LLMError::Auth { message },
            429 => LLMError::RateLimit {
                message,
                retry_after,
            },
            400 => LLMError::Validation { message },
            404 => LLMError::ModelNotFound {
                model: extract_model_identifier(&message),
                message,
            },
            _ => LLMError::Provider {
                provider: "openai_chat",
                message,
            },
        };
    }

    LLMError::Provider {
        provider: "openai_chat",
        message: format!("status {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_status() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        match parse_openai_error(401, body, None) {
            LLMError::Auth { message } => {
                assert!(message.contains("Incorrect API key"));
                assert!(message.contains("invalid_api_key"));
            }
            other => panic!("expected Auth error, got {other:?}"),
        }

        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        match parse_openai_error(429, body, Some(Duration::from_secs(3))) {
            LLMError::RateLimit {
                retry_after,
                message,
            } => {
                assert!(message.contains("Rate limit reached"));
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
            }
            other => panic!("expected RateLimit error, got {other:?}"),
        }

        let body = r#"{"error":{"message":"The model `gpt-9` does not exist","code":"model_not_found"}}"#;
        match parse_openai_error(404, body, None) {
            LLMError::ModelNotFound { model, .. } => assert_eq!(model.as_deref(), Some("gpt-9")),
            other => panic!("expected ModelNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn detects_context_length_errors() {
        let body = r#"{"error":{"message":"maximum context length is 8192 tokens","code":"context_length_exceeded"}}"#;
        assert!(matches!(
            parse_openai_error(400, body, None),
            LLMError::TokenLimitExceeded { .. }
        ));
    }

    #[test]
    fn falls_back_to_raw_body() {
        match parse_openai_error(502, "<html>bad gateway</html>", None) {
            LLMError::Provider { provider, message } => {
                assert_eq!(provider, "openai_chat");
                assert!(message.contains("status 502"));
                assert!(message.contains("bad gateway"));
            }
            other => panic!("expected Provider fallback error, got {other:?}"),
        }
    }
}

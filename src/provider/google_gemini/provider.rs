use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpResponse, post_json_with_headers};
use crate::provider::{LLMProvider, retry::retry_after_from_headers};
use crate::types::{CapabilityDescriptor, ChatRequest, ChatResponse, Role};

use super::chat::{GeminiChat, to_native_history};
use super::error::parse_gemini_error;
use super::request::build_gemini_body;
use super::response::map_response;
use super::types::{GeminiGenerateContentResponse, GeminiTurn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini GenerateContent provider implementation.
///
/// One provider serves every Gemini model: the model name travels with each
/// request rather than being fixed at construction.
pub struct GoogleGeminiProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl GoogleGeminiProvider {
    /// Creates a provider that targets the default Google Generative Language endpoint.
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Overrides the base URL, making it easier to point at proxies or compatibility layers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds the endpoint URL for GenerateContent.
    pub fn endpoint(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model_path = normalize_model(model);
        if base.ends_with("/v1beta") {
            format!("{base}/{model_path}:generateContent")
        } else {
            format!("{base}/v1beta/{model_path}:generateContent")
        }
    }

    /// Opens a chat session seeded with native history.
    pub fn start_chat(
        &self,
        model: impl Into<String>,
        system_instruction: Option<String>,
        history: Vec<GeminiTurn>,
    ) -> GeminiChat<'_> {
        GeminiChat::new(self, model, system_instruction, history)
    }

    /// Issues one GenerateContent call over the given native contents.
    pub(crate) async fn generate_content(
        &self,
        model: &str,
        contents: &[GeminiTurn],
        system_instruction: Option<&str>,
    ) -> Result<ChatResponse, LLMError> {
        if model.trim().is_empty() {
            return Err(LLMError::Validation {
                message: "model is required for Google Gemini".to_string(),
            });
        }
        let endpoint = self.endpoint(model);
        let body = build_gemini_body(contents, system_instruction);
        debug!(
            model,
            turns = contents.len(),
            has_system_instruction = body.system_instruction.is_some(),
            "sending generateContent"
        );
        let response = post_json_with_headers(
            self.transport.as_ref(),
            endpoint.clone(),
            self.build_headers(),
            &body,
        )
        .await?;
        let text = self.ensure_success(response)?;
        let parsed: GeminiGenerateContentResponse = self.try_parse(&text)?;
        map_response(parsed, self.name(), endpoint)
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-goog-api-key".to_string(), self.api_key.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, LLMError> {
        let HttpResponse {
            status,
            headers,
            body,
        } = response;
        let text = String::from_utf8(body).map_err(|err| LLMError::transport(err.to_string()))?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(parse_gemini_error(
                status,
                &text,
                retry_after_from_headers(&headers),
            ))
        }
    }

    fn try_parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, LLMError> {
        serde_json::from_str(text).map_err(|err| LLMError::Provider {
            provider: self.name(),
            message: format!("failed to parse Gemini response: {err}"),
        })
    }

    async fn send_turn(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        let ChatRequest { model, mut messages } = request;
        let user_turn = match messages.pop() {
            Some(message) if message.role == Role::User => message.content,
            _ => {
                return Err(LLMError::Validation {
                    message: "Gemini chat requires the last message to be a user turn".to_string(),
                });
            }
        };
        let (system_instruction, history) = to_native_history(&messages);
        let mut chat = self.start_chat(model, system_instruction, history);
        chat.send_message(user_turn).await
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[async_trait]
impl LLMProvider for GoogleGeminiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        let model = request.model.clone();
        self.send_turn(request).await.inspect_err(|err| {
            error!(model = %model, error = %err, "error in Google chat");
        })
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_native_history: true,
        }
    }

    fn name(&self) -> &'static str {
        "google_gemini"
    }
}

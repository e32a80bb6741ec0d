use std::time::Duration;

use super::ollama_types::*;
use super::{VisionClient, VisionError};

/// Ollama HTTP client for local vision inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a new client for the Ollama instance at `base_url`.
    ///
    /// Fails on a malformed URL or when the HTTP client cannot be built;
    /// both are fatal for the session.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, VisionError> {
        validate_base_url(base_url)?;
        if !is_local_endpoint(base_url) {
            tracing::warn!(
                base_url,
                "Ollama endpoint is not local; label images will leave this machine"
            );
        }

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VisionError::ClientInit(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> VisionError {
        if e.is_connect() {
            VisionError::NotReachable(self.base_url.clone())
        } else if e.is_timeout() {
            VisionError::Timeout(self.timeout_secs)
        } else {
            VisionError::Network(e.to_string())
        }
    }
}

/// Build the `/api/chat` body: optional system turn, then the user turn with images.
pub(crate) fn build_chat_request(
    model: &str,
    prompt: &str,
    images: &[String],
    system: Option<&str>,
) -> VisionChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(VisionChatMessage {
            role: "system".into(),
            content: system.to_string(),
            images: None,
        });
    }
    messages.push(VisionChatMessage {
        role: "user".into(),
        content: prompt.to_string(),
        images: (!images.is_empty()).then(|| images.to_vec()),
    });

    VisionChatRequest {
        model: model.to_string(),
        messages,
        stream: false,
        options: Some(VisionGenerationOptions::default()),
    }
}

impl VisionClient for OllamaClient {
    fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, VisionError> {
        validate_model_name(model)?;

        let url = format!("{}/api/chat", self.base_url);
        let body = build_chat_request(model, prompt, images, system);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(VisionError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| VisionError::ResponseParsing(e.to_string()))?;

        if parsed.message.content.trim().is_empty() {
            return Err(VisionError::EmptyResponse);
        }
        Ok(parsed.message.content)
    }

    fn backend_name(&self) -> &'static str {
        "ollama"
    }
}

use serde::{Deserialize, Serialize};

use super::VisionError;

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama vision model for label reading.
pub const DEFAULT_OLLAMA_MODEL: &str = "llava:13b";

// ──────────────────────────────────────────────
// Request / response bodies
// ──────────────────────────────────────────────

/// Chat-based vision request for `/api/chat`.
///
/// Chat-template vision models (LLaVA, Gemma, Qwen-VL) expect the
/// messages-based format with images attached to the user message.
#[derive(Debug, Clone, Serialize)]
pub struct VisionChatRequest {
    pub model: String,
    pub messages: Vec<VisionChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<VisionGenerationOptions>,
}

/// A single message in a vision chat request.
#[derive(Debug, Clone, Serialize)]
pub struct VisionChatMessage {
    pub role: String,
    pub content: String,
    /// Base64-encoded images (only for user messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Generation options tuned for deterministic field extraction.
#[derive(Debug, Clone, Serialize)]
pub struct VisionGenerationOptions {
    pub temperature: f32,
    pub num_predict: i32,
}

impl Default for VisionGenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            num_predict: 256,
        }
    }
}

/// Non-streaming `/api/chat` response.
#[derive(Debug, Deserialize)]
pub(crate) struct OllamaChatResponse {
    pub message: OllamaChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaChatResponseMessage {
    #[serde(default)]
    pub content: String,
}

// ──────────────────────────────────────────────
// Validators
// ──────────────────────────────────────────────

/// Validate an Ollama base URL: http(s) scheme and a non-empty host.
pub fn validate_base_url(url: &str) -> Result<(), VisionError> {
    let after_scheme = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| VisionError::InvalidUrl(url.to_string()))?;

    if extract_host(after_scheme).is_empty() {
        return Err(VisionError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// True when the URL targets this machine (localhost, 127.0.0.1, [::1]).
///
/// Label photos carry recipient addresses, so remote endpoints are logged.
pub fn is_local_endpoint(url: &str) -> bool {
    let after_scheme = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    matches!(
        extract_host(after_scheme),
        "localhost" | "127.0.0.1" | "::1"
    )
}

fn extract_host(after_scheme: &str) -> &str {
    // IPv6 bracket notation: [::1]:11434
    if let Some(rest) = after_scheme.strip_prefix('[') {
        return rest.split(']').next().unwrap_or("");
    }
    after_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or("")
}

/// Validate a model name against the Ollama naming convention
/// (`[namespace/]model[:tag]`, one namespace at most).
pub fn validate_model_name(name: &str) -> Result<(), VisionError> {
    let valid = regex::Regex::new(
        r"^[a-zA-Z0-9][a-zA-Z0-9._-]*(/[a-zA-Z0-9][a-zA-Z0-9._-]*)?(:[a-zA-Z0-9._-]+)?$",
    )
    .map_err(|e| VisionError::InvalidModelName(format!("{name}: {e}")))?;

    if !valid.is_match(name) {
        return Err(VisionError::InvalidModelName(name.to_string()));
    }
    Ok(())
}

//! Vision model access, the extraction service collaborator.
//!
//! The analyzer only sees `VisionClient`: one blocking call that takes an
//! instruction prompt plus base64-encoded images and returns the model's raw
//! text. Two production backends are provided:
//! - **Ollama** (`/api/chat`), for local vision models
//! - **Gemini** (`generateContent`), the hosted service labels were first read with
//!
//! Every backend error is recoverable from the analyzer's point of view: it is
//! recorded as an attempt failure and retried.

pub mod gemini;
pub mod ollama;
pub mod ollama_types;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use ollama_types::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;

/// Errors raised by a vision backend.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Vision service is not reachable at {0}")]
    NotReachable(String),

    #[error("Vision service returned an error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Vision service returned no text")]
    EmptyResponse,

    #[error("Invalid URL format: '{0}'")]
    InvalidUrl(String),

    #[error("Invalid model name: '{0}'")]
    InvalidModelName(String),

    #[error("No API key configured for the Gemini backend")]
    MissingApiKey,

    #[error("HTTP client could not be created: {0}")]
    ClientInit(String),
}

/// Blocking vision model client (allows mocking).
///
/// Implementations must be callable from many worker threads at once.
pub trait VisionClient: Send + Sync {
    /// Send one instruction prompt with images and return the raw reply text.
    ///
    /// `images` are base64-encoded PNG/JPEG payloads.
    fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, VisionError>;

    /// Short backend label for logs ("ollama", "gemini", ...).
    fn backend_name(&self) -> &'static str;
}

// ──────────────────────────────────────────────
// MockVisionClient (testing)
// ──────────────────────────────────────────────

type Responder = dyn Fn(&[String]) -> Result<String, VisionError> + Send + Sync;

/// Mock vision client for testing.
///
/// Replies through a closure that sees the encoded images, so tests can route
/// responses per input. Records how often and when it was invoked.
pub struct MockVisionClient {
    responder: Box<Responder>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl MockVisionClient {
    /// Always reply with the same text.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// Always fail with a network error carrying `message`.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_| Err(VisionError::Network(message.clone())))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&[String]) -> Result<String, VisionError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// Number of `chat_with_images` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invocation instants, in call order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times
            .lock()
            .map(|times| times.clone())
            .unwrap_or_default()
    }
}

impl VisionClient for MockVisionClient {
    fn chat_with_images(
        &self,
        _model: &str,
        _prompt: &str,
        images: &[String],
        _system: Option<&str>,
    ) -> Result<String, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut times) = self.call_times.lock() {
            times.push(Instant::now());
        }
        (self.responder)(images)
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

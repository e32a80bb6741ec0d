//! Processor configuration.
//!
//! Session-wide knobs for the batch processor plus the vision backend choice.
//! Values are validated once, before any dispenser or worker is started.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::extraction::{RetryPolicy, DEFAULT_MAX_DIMENSION};
use crate::pipeline::vision::gemini::GeminiClient;
use crate::pipeline::vision::{
    validate_model_name, OllamaClient, VisionClient, VisionError, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OLLAMA_URL,
};

/// Request timeout for a single vision call.
pub const VISION_TIMEOUT_SECS: u64 = 120;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Vision backend unavailable: {0}")]
    Vision(#[from] VisionError),

    #[error("Failed to start token dispenser: {0}")]
    Dispenser(#[source] std::io::Error),
}

/// Batch processor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum vision requests per minute across all workers.
    pub rpm_limit: u32,
    pub num_workers: usize,
    /// Attempts per task, including the first.
    pub max_retries: u32,
    /// Longest image edge sent to the model, in pixels.
    pub max_image_dimension: u32,
    /// Backoff after attempt `n` is `backoff_unit * (n + 1)`.
    pub backoff_unit: Duration,
    /// How often the collector wakes while waiting for results.
    pub poll_interval: Duration,
    /// Cap on permits banked while idle. `None` = unbounded.
    pub max_banked_permits: Option<u32>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            rpm_limit: 10,
            num_workers: 5,
            max_retries: 2,
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            backoff_unit: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            max_banked_permits: None,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("rpm_limit", u64::from(self.rpm_limit))?;
        positive("num_workers", self.num_workers as u64)?;
        positive("max_retries", u64::from(self.max_retries))?;
        positive("max_image_dimension", u64::from(self.max_image_dimension))?;
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_banked_permits == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_banked_permits",
                reason: "a cap of 0 would never admit a request".into(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            backoff_unit: self.backoff_unit,
        }
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

/// Which vision model service answers extraction requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionBackend {
    Ollama { base_url: String, model: String },
    Gemini { api_key: String, model: String },
}

impl Default for VisionBackend {
    fn default() -> Self {
        Self::Ollama {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }
}

impl VisionBackend {
    pub fn model(&self) -> &str {
        match self {
            Self::Ollama { model, .. } | Self::Gemini { model, .. } => model,
        }
    }

    /// Construct the client. Failure here is fatal: no batch can run without it.
    pub fn build_client(&self) -> Result<Arc<dyn VisionClient>, ConfigError> {
        validate_model_name(self.model())?;
        let client: Arc<dyn VisionClient> = match self {
            Self::Ollama { base_url, .. } => {
                Arc::new(OllamaClient::new(base_url, VISION_TIMEOUT_SECS)?)
            }
            Self::Gemini { api_key, .. } => {
                Arc::new(GeminiClient::new(api_key, VISION_TIMEOUT_SECS)?)
            }
        };
        tracing::info!(
            backend = client.backend_name(),
            model = self.model(),
            "Vision client ready"
        );
        Ok(client)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

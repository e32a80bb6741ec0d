//! Label extraction: one task in, one `LabelResult` out.
//!
//! Pipeline per attempt:
//! ```text
//! rate permit → preprocess (decode, orient, downscale) → vision call → sanitize + parse
//! ```
//! Failures never leave this module as errors: the analyzer folds them into a
//! FAIL result after the retry budget is spent.

pub mod analyzer;
pub mod preprocess;
pub mod prompt;
pub mod sanitize;

pub use analyzer::*;
pub use preprocess::*;
pub use sanitize::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::vision::VisionError;

/// Image preparation failures.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

/// Why a single extraction attempt failed. Every variant is retryable.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Prepare(#[from] ExtractionError),

    #[error("Vision call failed: {0}")]
    Vision(#[from] VisionError),

    #[error("Response is not valid JSON: {0}")]
    JsonParsing(String),

    #[error("Malformed label payload: {0}")]
    MalformedPayload(String),
}

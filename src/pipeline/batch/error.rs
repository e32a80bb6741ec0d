//! Batch-level errors. Per-task failures never appear here: they are
//! FAIL results inside the batch.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No images were submitted")]
    EmptyBatch,

    #[error("A batch is already running; wait for it to finish")]
    AlreadyRunning,

    #[error("Failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Batch ended with {received} of {expected} results (all workers exited)")]
    Incomplete { received: usize, expected: usize },

    #[error("Result collector thread panicked")]
    CollectorPanicked,
}

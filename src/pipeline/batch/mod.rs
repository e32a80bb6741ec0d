//! Concurrent batch processing of label images.
//!
//! A batch is a set of image paths submitted together. A fixed pool of worker
//! threads drains a shared task queue; every extraction attempt first takes a
//! permit from the process-wide [`TokenDispenser`], which caps the vision call
//! rate regardless of worker count. A single collector thread gathers exactly
//! one [`LabelResult`](crate::models::LabelResult) per task and forwards each
//! to a [`ProgressSink`] as it arrives.

pub mod collector;
pub mod error;
pub mod queue;
pub mod rate_limit;
pub mod runner;
pub mod types;
pub mod worker;

pub use collector::{ProgressSink, ResultCollector, TracingProgressSink};
pub use error::BatchError;
pub use queue::TaskQueue;
pub use rate_limit::{interval_for_rpm, RateGate, TokenDispenser};
pub use runner::{BatchHandle, BatchProcessor};
pub use types::{new_batch_id, Batch, BatchSummary};
pub use worker::WorkerPool;

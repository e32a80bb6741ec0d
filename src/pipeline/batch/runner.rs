//! BatchProcessor: submits a batch and wires the collector and workers together.
//!
//! ```text
//! submit(paths) ─► TaskQueue ─► worker × N ─► analyzer ─► result channel ─► collector ─► Batch
//!                                   │
//!                          TokenDispenser (one permit per attempt)
//! ```
//! `submit` returns immediately; the caller decides when to `wait`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::collector::{ProgressSink, ResultCollector};
use super::error::BatchError;
use super::queue::TaskQueue;
use super::rate_limit::TokenDispenser;
use super::types::Batch;
use super::worker::WorkerPool;
use crate::models::Task;
use crate::pipeline::extraction::{LabelAnalyzer, LabelImagePreparer, VisionLabelAnalyzer};
use crate::pipeline::vision::VisionClient;
use crate::pipeline_config::{ConfigError, ProcessorConfig};

/// Runs one batch at a time over a shared analyzer.
pub struct BatchProcessor {
    analyzer: Arc<dyn LabelAnalyzer>,
    sink: Arc<dyn ProgressSink>,
    num_workers: usize,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    dispenser: Option<Arc<TokenDispenser>>,
}

impl BatchProcessor {
    pub fn new(
        analyzer: Arc<dyn LabelAnalyzer>,
        sink: Arc<dyn ProgressSink>,
        num_workers: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            analyzer,
            sink,
            num_workers: num_workers.max(1),
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            dispenser: None,
        }
    }

    /// Start a processing session: validate config, start the token dispenser,
    /// build the production analyzer.
    ///
    /// The dispenser lives as long as the processor; permits bank between batches.
    pub fn start(
        config: &ProcessorConfig,
        client: Arc<dyn VisionClient>,
        model: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let dispenser = TokenDispenser::start(config.rpm_limit, config.max_banked_permits)
            .map_err(ConfigError::Dispenser)?;
        let analyzer = VisionLabelAnalyzer::new(
            dispenser.clone(),
            Arc::new(LabelImagePreparer::new(config.max_image_dimension)),
            client,
            model,
            config.retry_policy(),
        );

        tracing::info!(
            rpm_limit = config.rpm_limit,
            workers = config.num_workers,
            max_retries = config.max_retries,
            model,
            "Batch processor started"
        );

        let mut processor = Self::new(
            Arc::new(analyzer),
            sink,
            config.num_workers,
            config.poll_interval,
        );
        processor.dispenser = Some(dispenser);
        Ok(processor)
    }

    /// Queue every path as a task and start processing.
    ///
    /// Rejects an empty submission and a submission while a batch is in flight.
    /// Spawns `num_workers` threads, capped at the task count: a worker with
    /// nothing to claim would exit immediately.
    ///
    /// Workers start before the collector. If a spawn fails, the running flag
    /// is cleared before returning and the result receiver is dropped, so any
    /// worker already started stops after its current task.
    pub fn submit<I, P>(&self, paths: I) -> Result<BatchHandle, BatchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let tasks: Vec<Task> = paths.into_iter().map(Task::new).collect();
        if tasks.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BatchError::AlreadyRunning)?;
        let guard = RunningGuard(Arc::clone(&self.running));

        let batch = Batch::new(tasks.clone());
        let batch_id = batch.id().to_string();
        let total = batch.total();
        let (tx, rx) = crossbeam_channel::unbounded();

        let workers = WorkerPool::spawn(
            self.num_workers.min(total),
            TaskQueue::new(tasks),
            Arc::clone(&self.analyzer),
            tx,
        )?;

        let collector = ResultCollector::new(rx, batch, Arc::clone(&self.sink), self.poll_interval);
        let collector = std::thread::Builder::new()
            .name("result-collector".into())
            .spawn(move || {
                let _guard = guard;
                collector.run()
            })
            .map_err(|source| BatchError::Spawn {
                role: "collector",
                source,
            })?;

        tracing::info!(
            batch_id = %batch_id,
            total,
            workers = workers.len(),
            "Batch submitted"
        );

        Ok(BatchHandle {
            batch_id,
            total,
            collector,
            workers,
        })
    }

    /// Whether a submitted batch has not yet completed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn dispenser(&self) -> Option<&Arc<TokenDispenser>> {
        self.dispenser.as_ref()
    }
}

/// Clears the running flag when the collector thread ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A batch in flight.
pub struct BatchHandle {
    batch_id: String,
    total: usize,
    collector: JoinHandle<Result<Batch, BatchError>>,
    workers: WorkerPool,
}

impl BatchHandle {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// True once the collector has stopped (completed or failed).
    pub fn is_finished(&self) -> bool {
        self.collector.is_finished()
    }

    /// Block until the batch completes and return it with every result.
    pub fn wait(self) -> Result<Batch, BatchError> {
        let outcome = self.collector.join();
        let processed = self.workers.join();
        tracing::debug!(batch_id = %self.batch_id, processed, "Workers joined");

        outcome.map_err(|_| BatchError::CollectorPanicked)?
    }
}

//! Worker pool: N threads draining the task queue through the analyzer.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use super::error::BatchError;
use super::queue::TaskQueue;
use crate::models::LabelResult;
use crate::pipeline::extraction::LabelAnalyzer;

/// Handles for the spawned worker threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawn `num_workers` named threads (at least one).
    ///
    /// Each worker owns a clone of `results`; the collector sees the channel
    /// disconnect only after every worker has exited.
    pub fn spawn(
        num_workers: usize,
        queue: TaskQueue,
        analyzer: Arc<dyn LabelAnalyzer>,
        results: Sender<LabelResult>,
    ) -> Result<Self, BatchError> {
        let mut handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers.max(1) {
            let queue = queue.clone();
            let analyzer = Arc::clone(&analyzer);
            let results = results.clone();

            let handle = std::thread::Builder::new()
                .name(format!("label-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &queue, analyzer.as_ref(), &results))
                .map_err(|source| BatchError::Spawn {
                    role: "worker",
                    source,
                })?;
            handles.push(handle);
        }

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker; returns how many tasks they processed in total.
    pub fn join(self) -> usize {
        self.handles
            .into_iter()
            .enumerate()
            .map(|(worker_id, handle)| {
                handle.join().unwrap_or_else(|_| {
                    tracing::error!(worker_id, "Worker thread panicked");
                    0
                })
            })
            .sum()
    }
}

fn worker_loop(
    worker_id: usize,
    queue: &TaskQueue,
    analyzer: &dyn LabelAnalyzer,
    results: &Sender<LabelResult>,
) -> usize {
    let mut processed = 0;

    while let Some(task) = queue.try_pop() {
        let result = analyzer.analyze(&task);
        processed += 1;
        if results.send(result).is_err() {
            tracing::warn!(worker_id, "Result channel closed; worker stopping");
            break;
        }
    }

    tracing::debug!(worker_id, processed, "Worker exiting: queue drained");
    processed
}

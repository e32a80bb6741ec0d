//! Result collector, the single consumer of the result channel.
//!
//! Counts results until every submitted task has one, forwarding each to the
//! progress sink as it arrives. Completion is a count barrier: identities are
//! not checked.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::error::BatchError;
use super::types::{Batch, BatchSummary};
use crate::models::LabelResult;

/// Receives live progress. Called from the collector thread, never the submitter's.
pub trait ProgressSink: Send + Sync {
    /// One call per result, in arrival order. `completed` includes this result.
    fn report(&self, result: &LabelResult, completed: usize, total: usize);

    /// Called exactly once, after the last result.
    fn batch_finished(&self, _summary: &BatchSummary) {}
}

/// Sink that logs each outcome through `tracing`.
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn report(&self, result: &LabelResult, completed: usize, total: usize) {
        match &result.error {
            Some(error) => tracing::warn!(
                file = %result.identifier,
                completed,
                total,
                error = %error,
                "Label failed"
            ),
            None => tracing::info!(
                file = %result.identifier,
                completed,
                total,
                tracking = %result.fields.tracking_number,
                phone = %result.fields.phone_number,
                "Label read"
            ),
        }
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        tracing::info!(
            batch_id = %summary.batch_id,
            total = summary.total,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Batch finished"
        );
    }
}

/// Drains the result channel into a batch.
pub struct ResultCollector {
    rx: Receiver<LabelResult>,
    batch: Batch,
    sink: Arc<dyn ProgressSink>,
    poll_interval: Duration,
}

impl ResultCollector {
    pub fn new(
        rx: Receiver<LabelResult>,
        batch: Batch,
        sink: Arc<dyn ProgressSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rx,
            batch,
            sink,
            poll_interval,
        }
    }

    /// Block until the batch is complete, then hand it back.
    ///
    /// Stops with `Incomplete` if every sender is gone before the count is
    /// reached (a worker died without reporting).
    pub fn run(mut self) -> Result<Batch, BatchError> {
        let total = self.batch.total();

        while self.batch.received() < total {
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(result) => {
                    if self.batch.record(result) {
                        let completed = self.batch.received();
                        if let Some(latest) = self.batch.results().last() {
                            self.sink.report(latest, completed, total);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::trace!(
                        received = self.batch.received(),
                        total,
                        "Waiting for results"
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::error!(
                        batch_id = %self.batch.id(),
                        received = self.batch.received(),
                        total,
                        "All workers exited before the batch completed"
                    );
                    return Err(BatchError::Incomplete {
                        received: self.batch.received(),
                        expected: total,
                    });
                }
            }
        }

        self.batch.mark_complete();
        self.sink.batch_finished(&self.batch.summary());
        Ok(self.batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelFields, Task};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(String, usize, usize)>>,
        finished: AtomicUsize,
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, result: &LabelResult, completed: usize, total: usize) {
            self.lines
                .lock()
                .unwrap()
                .push((result.identifier.clone(), completed, total));
        }

        fn batch_finished(&self, _summary: &BatchSummary) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn batch_of(names: &[&str]) -> Batch {
        Batch::new(names.iter().map(|n| Task::new(*n)).collect())
    }

    #[test]
    fn collects_until_count_reached() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = Arc::new(RecordingSink::default());
        let collector = ResultCollector::new(
            rx,
            batch_of(&["a.jpg", "b.jpg"]),
            sink.clone(),
            Duration::from_millis(10),
        );

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            tx.send(LabelResult::success("b.jpg", LabelFields::default())).unwrap();
            tx.send(LabelResult::failed("a.jpg", "Error: x")).unwrap();
            // Keep the sender alive past completion.
            std::thread::sleep(Duration::from_millis(30));
        });

        let batch = collector.run().unwrap();
        producer.join().unwrap();

        assert!(batch.is_complete());
        assert_eq!(batch.results()[0].identifier, "b.jpg", "arrival order kept");
        let lines = sink.lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![("b.jpg".to_string(), 1, 2), ("a.jpg".to_string(), 2, 2)]
        );
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn extra_results_are_not_collected() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(LabelResult::success("a.jpg", LabelFields::default())).unwrap();
        tx.send(LabelResult::success("a.jpg", LabelFields::default())).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let batch = ResultCollector::new(rx, batch_of(&["a.jpg"]), sink.clone(), Duration::from_millis(10))
            .run()
            .unwrap();

        assert_eq!(batch.received(), 1);
        assert_eq!(sink.lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn disconnected_producers_end_with_incomplete() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(LabelResult::success("a.jpg", LabelFields::default())).unwrap();
        drop(tx);

        let sink = Arc::new(RecordingSink::default());
        let err = ResultCollector::new(rx, batch_of(&["a.jpg", "b.jpg"]), sink.clone(), Duration::from_millis(10))
            .run()
            .unwrap_err();

        assert!(matches!(err, BatchError::Incomplete { received: 1, expected: 2 }));
        assert_eq!(sink.finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tracing_sink_accepts_both_outcomes() {
        let sink = TracingProgressSink;
        sink.report(&LabelResult::success("a.jpg", LabelFields::default()), 1, 2);
        sink.report(&LabelResult::failed("b.jpg", "Error: x"), 2, 2);
    }
}

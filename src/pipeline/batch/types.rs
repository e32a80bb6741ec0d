use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LabelResult, Task};

pub fn new_batch_id() -> String {
    Uuid::new_v4().to_string()
}

/// Submitted tasks plus the results collected for them.
///
/// Results arrive in completion order. The batch is complete once it holds
/// one result per task; after that it only changes hands, never content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    id: String,
    tasks: Vec<Task>,
    results: Vec<LabelResult>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            id: new_batch_id(),
            tasks,
            results: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Rebuild a completed batch from stored results (one task per result).
    pub fn from_results(results: Vec<LabelResult>) -> Self {
        let now = Utc::now();
        Self {
            id: new_batch_id(),
            tasks: results.iter().map(|r| Task::new(&r.identifier)).collect(),
            results,
            started_at: now,
            finished_at: Some(now),
        }
    }

    /// Append a result. Returns `false` (and drops it) if the batch is already full.
    pub(crate) fn record(&mut self, result: LabelResult) -> bool {
        if self.received() >= self.total() {
            tracing::error!(
                batch_id = %self.id,
                file = %result.identifier,
                "Result received after batch was full; dropping"
            );
            return false;
        }
        self.results.push(result);
        true
    }

    pub(crate) fn mark_complete(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn results(&self) -> &[LabelResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn received(&self) -> usize {
        self.results.len()
    }

    pub fn is_complete(&self) -> bool {
        self.received() == self.total()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn summary(&self) -> BatchSummary {
        let failed = self.results.iter().filter(|r| r.is_failure()).count();
        let duration_ms = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0);
        BatchSummary {
            batch_id: self.id.clone(),
            total: self.total(),
            succeeded: self.received() - failed,
            failed,
            duration_ms,
        }
    }
}

/// Counts reported when a batch completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

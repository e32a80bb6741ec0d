//! Retrying label analyzer: the unit of work each worker runs per task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;

use super::preprocess::ImagePreparer;
use super::prompt::{LABEL_EXTRACTION_PROMPT, LABEL_SYSTEM_PROMPT};
use super::sanitize::{parse_label_payload, strip_code_fences};
use super::AttemptError;
use crate::models::{LabelFields, LabelResult, Task};
use crate::pipeline::batch::rate_limit::RateGate;
use crate::pipeline::vision::VisionClient;

/// Turns one task into its terminal result. Never fails: errors become data.
pub trait LabelAnalyzer: Send + Sync {
    fn analyze(&self, task: &Task) -> LabelResult;
}

/// Attempt budget and linear backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per task (≥ 1).
    pub max_attempts: u32,
    /// Backoff after failed attempt `n` (0-based) is `backoff_unit * (n + 1)`.
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Production analyzer: rate permit → prepare image → vision call → parse.
///
/// One permit is consumed per attempt, so failed attempts still count
/// against the request budget. Backoff sleeps do not take permits.
pub struct VisionLabelAnalyzer {
    gate: Arc<dyn RateGate>,
    preparer: Arc<dyn ImagePreparer>,
    client: Arc<dyn VisionClient>,
    model: String,
    retry: RetryPolicy,
}

impl VisionLabelAnalyzer {
    pub fn new(
        gate: Arc<dyn RateGate>,
        preparer: Arc<dyn ImagePreparer>,
        client: Arc<dyn VisionClient>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gate,
            preparer,
            client,
            model: model.into(),
            retry,
        }
    }

    /// One attempt; the permit is taken before any work.
    fn attempt(&self, task: &Task) -> Result<LabelFields, AttemptError> {
        self.gate.acquire();

        let prepared = self.preparer.prepare(task.path())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&prepared.png_bytes);

        let raw = self.client.chat_with_images(
            &self.model,
            LABEL_EXTRACTION_PROMPT,
            &[encoded],
            Some(LABEL_SYSTEM_PROMPT),
        )?;

        parse_label_payload(&strip_code_fences(&raw))
    }
}

impl LabelAnalyzer for VisionLabelAnalyzer {
    fn analyze(&self, task: &Task) -> LabelResult {
        let _span = tracing::info_span!(
            "analyze_label",
            file = task.identifier(),
            backend = self.client.backend_name(),
        )
        .entered();
        let start = Instant::now();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::from("Unknown error");

        for attempt in 0..max_attempts {
            match self.attempt(task) {
                Ok(fields) => {
                    tracing::info!(
                        attempt = attempt + 1,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Label extracted"
                    );
                    return LabelResult::success(task.identifier(), fields);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Label extraction attempt failed"
                    );
                    last_error = format!("Error: {e}");

                    if attempt + 1 < max_attempts {
                        let backoff = self.retry.backoff_for(attempt);
                        tracing::debug!(backoff_ms = backoff.as_millis() as u64, "Backing off");
                        std::thread::sleep(backoff);
                    }
                }
            }
        }

        LabelResult::failed(task.identifier(), last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FAIL_VALUE;
    use crate::pipeline::extraction::preprocess::MockImagePreparer;
    use crate::pipeline::vision::{MockVisionClient, VisionError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gate that never blocks and counts acquisitions.
    #[derive(Default)]
    struct CountingGate {
        acquired: AtomicUsize,
    }

    impl RateGate for CountingGate {
        fn acquire(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_unit: Duration::from_millis(1),
        }
    }

    fn analyzer(
        gate: Arc<CountingGate>,
        client: Arc<MockVisionClient>,
        retry: RetryPolicy,
    ) -> VisionLabelAnalyzer {
        VisionLabelAnalyzer::new(
            gate,
            Arc::new(MockImagePreparer::new()),
            client,
            "llava:13b",
            retry,
        )
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(5));
    }

    #[test]
    fn success_on_first_attempt_uses_one_permit() {
        let gate = Arc::new(CountingGate::default());
        let client = Arc::new(MockVisionClient::new(
            "```json\n{\"tracking_number\": \"1Z999AA10123456784\", \"phone_number\": \"NONE\"}\n```",
        ));
        let result = analyzer(gate.clone(), client.clone(), fast_retry(3)).analyze(&Task::new("/in/a.jpg"));

        assert_eq!(result.identifier, "a.jpg");
        assert_eq!(result.fields.tracking_number, "1Z999AA10123456784");
        assert_eq!(result.fields.phone_number, "NONE");
        assert!(result.error.is_none());
        assert_eq!(client.calls(), 1);
        assert_eq!(gate.acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let client = Arc::new(MockVisionClient::from_fn(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok("not json".into())
            } else {
                Ok(r#"{"tracking_number": "NONE", "phone_number": "5551234567"}"#.into())
            }
        }));
        let gate = Arc::new(CountingGate::default());

        let result = analyzer(gate.clone(), client.clone(), fast_retry(3)).analyze(&Task::new("c.jpg"));

        assert!(result.error.is_none());
        assert_eq!(result.fields.phone_number, "5551234567");
        assert_eq!(client.calls(), 2);
        assert_eq!(gate.acquired.load(Ordering::SeqCst), 2, "one permit per attempt");
    }

    #[test]
    fn exhausted_retries_produce_fail_sentinels() {
        let gate = Arc::new(CountingGate::default());
        let client = Arc::new(MockVisionClient::failing("503 upstream"));

        let result = analyzer(gate.clone(), client.clone(), fast_retry(3)).analyze(&Task::new("b.jpg"));

        assert_eq!(result.identifier, "b.jpg");
        assert_eq!(result.fields.tracking_number, FAIL_VALUE);
        assert_eq!(result.fields.phone_number, FAIL_VALUE);
        let error = result.error.expect("failure carries the last error");
        assert!(error.starts_with("Error: "), "{error}");
        assert!(error.contains("503 upstream"), "{error}");
        assert_eq!(client.calls(), 3, "never more than max_attempts calls");
        assert_eq!(gate.acquired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn last_error_message_wins() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let client = Arc::new(MockVisionClient::from_fn(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Err(VisionError::ApiError {
                status: 500 + n as u16,
                message: format!("attempt {n}"),
            })
        }));
        let result = analyzer(Arc::new(CountingGate::default()), client, fast_retry(2))
            .analyze(&Task::new("x.png"));
        assert!(result.error.unwrap().contains("attempt 1"));
    }

    #[test]
    fn image_failure_still_consumes_a_permit() {
        let gate = Arc::new(CountingGate::default());
        let client = Arc::new(MockVisionClient::new("{}"));
        let analyzer = VisionLabelAnalyzer::new(
            gate.clone(),
            Arc::new(MockImagePreparer::failing()),
            client.clone(),
            "llava",
            fast_retry(2),
        );

        let result = analyzer.analyze(&Task::new("broken.jpg"));

        assert!(result.is_failure());
        assert!(result.error.unwrap().contains("Mock preparation failure"));
        assert_eq!(client.calls(), 0);
        assert_eq!(gate.acquired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sends_encoded_image_to_client() {
        let client = Arc::new(MockVisionClient::from_fn(|images| {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(&images[0])
                .map_err(|e| VisionError::ResponseParsing(e.to_string()))?;
            assert_eq!(decoded, b"label-1.jpg");
            Ok("{}".into())
        }));
        let result = analyzer(Arc::new(CountingGate::default()), client, fast_retry(1))
            .analyze(&Task::new("/tmp/label-1.jpg"));
        assert!(result.error.is_none());
        assert_eq!(result.fields, LabelFields::default());
    }

    #[test]
    fn failed_attempts_back_off_linearly_but_not_after_the_last() {
        let unit = Duration::from_millis(80);
        let client = Arc::new(MockVisionClient::failing("503 upstream"));
        let analyzer = analyzer(
            Arc::new(CountingGate::default()),
            client.clone(),
            RetryPolicy {
                max_attempts: 3,
                backoff_unit: unit,
            },
        );

        let start = Instant::now();
        let result = analyzer.analyze(&Task::new("slow.jpg"));
        let elapsed = start.elapsed();

        assert!(result.is_failure());
        assert_eq!(client.calls(), 3);
        // unit×1 after attempt 1, unit×2 after attempt 2, nothing after attempt 3.
        assert!(elapsed >= unit * 3, "elapsed {elapsed:?}");
        assert!(elapsed < unit * 6, "slept after the final attempt: {elapsed:?}");

        let times = client.call_times();
        assert!(times[1] - times[0] >= unit);
        assert!(times[2] - times[1] >= unit * 2);
    }

    #[test]
    fn zero_attempt_budget_still_tries_once() {
        let client = Arc::new(MockVisionClient::new("{}"));
        let result = analyzer(Arc::new(CountingGate::default()), client.clone(), fast_retry(0))
            .analyze(&Task::new("a.jpg"));
        assert!(result.error.is_none());
        assert_eq!(client.calls(), 1);
    }
}

//! Token dispenser, the global request-rate gate.
//!
//! A background thread releases one permit every `60 / rpm` seconds into a
//! counting semaphore. Every extraction attempt takes one permit first, so the
//! permit cadence caps vision calls no matter how many workers run.
//!
//! The thread holds only a `Weak` reference: it stops on its next tick after
//! the last `Arc<TokenDispenser>` is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::time::Duration;

/// Admission gate for rate-limited calls (allows instrumented test gates).
pub trait RateGate: Send + Sync {
    /// Block until one permit is available, then consume it.
    fn acquire(&self);
}

/// Counting-semaphore permit pool fed by a periodic dispenser thread.
pub struct TokenDispenser {
    permits: Mutex<u64>,
    available: Condvar,
    /// Upper bound on banked permits. `None` = unbounded.
    max_banked: Option<u64>,
    issued: AtomicU64,
    acquired: AtomicU64,
}

impl TokenDispenser {
    /// Start a dispenser admitting `rpm_limit` requests per minute.
    ///
    /// The first permit is released immediately.
    pub fn start(rpm_limit: u32, max_banked: Option<u32>) -> std::io::Result<Arc<Self>> {
        Self::start_with_interval(interval_for_rpm(rpm_limit), max_banked)
    }

    /// Start a dispenser releasing one permit per `interval`.
    pub fn start_with_interval(
        interval: Duration,
        max_banked: Option<u32>,
    ) -> std::io::Result<Arc<Self>> {
        let dispenser = Arc::new(Self {
            permits: Mutex::new(0),
            available: Condvar::new(),
            max_banked: max_banked.map(u64::from),
            issued: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&dispenser);
        std::thread::Builder::new()
            .name("token-dispenser".into())
            .spawn(move || dispense_loop(weak, interval))?;

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            max_banked = ?max_banked,
            "Token dispenser started"
        );
        Ok(dispenser)
    }

    /// Add one permit and wake one waiter.
    fn release(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        if self.max_banked.is_some_and(|cap| *permits >= cap) {
            return;
        }
        *permits += 1;
        self.issued.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
    }

    /// Permits released since start.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Permits consumed since start.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Permits currently banked.
    pub fn available(&self) -> u64 {
        *self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RateGate for TokenDispenser {
    fn acquire(&self) {
        let guard = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        let mut permits = self
            .available
            .wait_while(guard, |permits| *permits == 0)
            .unwrap_or_else(PoisonError::into_inner);
        *permits -= 1;
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }
}

fn dispense_loop(dispenser: Weak<TokenDispenser>, interval: Duration) {
    loop {
        match dispenser.upgrade() {
            Some(d) => d.release(),
            None => break,
        }
        std::thread::sleep(interval);
    }
    tracing::debug!("Token dispenser stopped");
}

/// `60 / rpm` seconds between permits.
pub fn interval_for_rpm(rpm_limit: u32) -> Duration {
    Duration::from_secs_f64(60.0 / f64::from(rpm_limit.max(1)))
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use souq_types::ChatError;

/// Stands in for the network hop a real backend would add. Every store
/// operation makes exactly one round trip before touching state, so
/// latency and injected failures surface the same way a real transport's
/// would.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self) -> Result<(), ChatError>;
}

/// Uniform random delay per call, defaulting to the 200-500 ms band the
/// mock services simulate.
#[derive(Debug, Clone)]
pub struct SimulatedLatency {
    pub min: Duration,
    pub max: Duration,
}

impl Default for SimulatedLatency {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(200),
            max: Duration::from_millis(500),
        }
    }
}

impl SimulatedLatency {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }
}

#[async_trait]
impl Transport for SimulatedLatency {
    async fn round_trip(&self) -> Result<(), ChatError> {
        let min = self.min.min(self.max);
        let delay = if min == self.max {
            min
        } else {
            let ms = rand::rng().random_range(min.as_millis() as u64..=self.max.as_millis() as u64);
            Duration::from_millis(ms)
        };
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

/// Zero-delay transport for deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Transport for NoDelay {
    async fn round_trip(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Wraps another transport and fails the next N calls with
/// `Unavailable`, then delegates. Drives the retry paths in tests.
pub struct Flaky {
    inner: Arc<dyn Transport>,
    remaining_failures: AtomicUsize,
}

impl Flaky {
    pub fn new(inner: Arc<dyn Transport>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
        }
    }

    /// Arm another burst of failures.
    pub fn fail_next(&self, failures: usize) {
        self.remaining_failures.store(failures, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for Flaky {
    async fn round_trip(&self) -> Result<(), ChatError> {
        let took_failure = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took_failure {
            return Err(ChatError::Unavailable("simulated transport failure".into()));
        }
        self.inner.round_trip().await
    }
}

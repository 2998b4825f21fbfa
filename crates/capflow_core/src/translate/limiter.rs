//! Shared in-flight limiter for the translation service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps concurrent translation calls across every batch of every run.
///
/// Cloning shares the same quota.
#[derive(Debug, Clone)]
pub struct InFlightLimiter {
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    quota: usize,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightLimiter {
    /// Create a limiter. A quota of 0 is raised to 1.
    pub fn new(quota: usize) -> Self {
        let quota = quota.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(quota)),
            counters: Arc::new(Counters::default()),
            quota,
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Calls currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest in-flight count observed.
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Wait for a free slot.
    ///
    /// Returns `None` only if the limiter was closed.
    pub async fn acquire(&self) -> Option<InFlightPermit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        Some(InFlightPermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Stop handing out permits; waiters get `None`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Slot held for the duration of one translation call.
#[derive(Debug)]
pub struct InFlightPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

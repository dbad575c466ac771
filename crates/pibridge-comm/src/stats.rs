use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-bridge transaction counters.
#[derive(Debug, Default)]
pub struct BridgeStats {
    requests: AtomicU64,
    sends: AtomicU64,
    completed: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
    noise_frames: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Request/response transactions started.
    pub requests: u64,
    /// Fire-and-forget sends started.
    pub sends: u64,
    /// Transactions that ended in `Complete`.
    pub completed: u64,
    /// Requests that got no matching reply in time.
    pub timeouts: u64,
    /// Transactions that failed for any other reason.
    pub failures: u64,
    /// Well-formed frames skipped because they answered somebody else.
    pub noise_frames: u64,
}

impl BridgeStats {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send(&self) {
        self.sends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome<T>(&self, result: &crate::Result<T>) {
        let counter = match result {
            Ok(_) => &self.completed,
            Err(err) if err.is_timeout() => &self.timeouts,
            Err(_) => &self.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_noise(&self, frames: u64) {
        if frames > 0 {
            self.noise_frames.fetch_add(frames, Ordering::Relaxed);
        }
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            noise_frames: self.noise_frames.load(Ordering::Relaxed),
        }
    }
}

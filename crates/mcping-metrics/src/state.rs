//! Health state sink — the latest probe verdict shared with the scrape endpoint.
//!
//! The attempt counter is a plain atomic. The healthy/unhealthy gauge pair is
//! stored as a single tri-state byte so a reader can never observe one gauge
//! updated without the other.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Write side of the health state, called by the probe scheduler.
///
/// `record_healthy` and `record_unhealthy` each fully replace the previous
/// verdict.
pub trait HealthSink: Send + Sync {
    /// Count one probe attempt.
    fn record_attempt(&self);
    /// Mark the target healthy (healthy = 1, unhealthy = 0).
    fn record_healthy(&self);
    /// Mark the target unhealthy (healthy = 0, unhealthy = 1).
    fn record_unhealthy(&self);
}

/// Latest verdict for the probed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Verdict {
    /// No probe has completed yet.
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl Verdict {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Verdict::Healthy,
            2 => Verdict::Unhealthy,
            _ => Verdict::Unknown,
        }
    }
}

/// A consistent read of the health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Total probe attempts since start.
    pub attempts: u64,
    /// 1 if the last completed probe was healthy.
    pub healthy: u8,
    /// 1 if the last completed probe was unhealthy.
    pub unhealthy: u8,
}

/// Lock-free health state: one writer (the scheduler), many readers.
#[derive(Debug, Default)]
pub struct HealthState {
    attempts: AtomicU64,
    verdict: AtomicU8,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current verdict.
    pub fn verdict(&self) -> Verdict {
        Verdict::from_u8(self.verdict.load(Ordering::Acquire))
    }

    /// Total probe attempts recorded so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Read the counter and the gauge pair.
    pub fn snapshot(&self) -> HealthSnapshot {
        let (healthy, unhealthy) = match self.verdict() {
            Verdict::Unknown => (0, 0),
            Verdict::Healthy => (1, 0),
            Verdict::Unhealthy => (0, 1),
        };
        HealthSnapshot {
            attempts: self.attempts(),
            healthy,
            unhealthy,
        }
    }
}

impl HealthSink for HealthState {
    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_healthy(&self) {
        self.verdict.store(Verdict::Healthy as u8, Ordering::Release);
    }

    fn record_unhealthy(&self) {
        self.verdict.store(Verdict::Unhealthy as u8, Ordering::Release);
    }
}

//! Probe scheduler — background task that probes the target on a fixed period.
//!
//! The loop wakes every `poll_interval`, subtracts the elapsed monotonic time
//! from a countdown, and runs one probe whenever the countdown hits zero.
//! Probe cadence and shutdown latency are independent: a stop request is
//! noticed within one poll interval even when the period is several seconds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use mcping_metrics::HealthSink;

use crate::outcome::ProbeOutcome;
use crate::prober::Probe;

/// Timing for the probe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Time between probe starts.
    pub period: Duration,
    /// How often the loop wakes to check the countdown and shutdown flag.
    pub poll_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Drives a [`Probe`] and feeds each outcome into a [`HealthSink`].
pub struct Scheduler<P, S> {
    prober: P,
    sink: Arc<S>,
    config: ScheduleConfig,
}

impl<P, S> Scheduler<P, S>
where
    P: Probe + 'static,
    S: HealthSink + 'static,
{
    pub fn new(prober: P, sink: Arc<S>, config: ScheduleConfig) -> Self {
        Self {
            prober,
            sink,
            config,
        }
    }

    /// Run the loop on its own task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run the probe loop until `shutdown` becomes true.
    ///
    /// A probe already in flight when shutdown is requested runs to
    /// completion; no further probe is started.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target_addr = %self.prober.target(),
            period_ms = millis(self.config.period),
            poll_ms = millis(self.config.poll_interval),
            timeout_ms = millis(self.prober.deadline()),
            "probe scheduler started"
        );

        let mut countdown = Duration::ZERO;
        let mut last_wakeup = Instant::now();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let now = Instant::now();
            countdown = countdown.saturating_sub(now.duration_since(last_wakeup));
            last_wakeup = now;

            if countdown.is_zero() {
                countdown = self.config.period;
                self.probe_once().await;

                if *shutdown.borrow_and_update() {
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    // Sender gone: nobody can stop us any more, so stop now.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("probe scheduler stopped");
    }

    async fn probe_once(&self) {
        let target = self.prober.target();
        let timeout_ms = millis(self.prober.deadline());

        debug!(target_addr = %target, "attempting healthcheck");
        self.sink.record_attempt();

        let outcome = self.prober.probe().await;
        match &outcome {
            ProbeOutcome::Healthy => {
                info!(target_addr = %target, "healthcheck succeeded");
            }
            ProbeOutcome::Unhealthy(reason) => {
                warn!(target_addr = %target, timeout_ms, %reason, "healthcheck failed");
            }
            ProbeOutcome::Error(e) => {
                error!(
                    target_addr = %target,
                    timeout_ms,
                    error = %e,
                    "healthcheck could not be performed"
                );
            }
        }

        if outcome.is_healthy() {
            self.sink.record_healthy();
        } else {
            self.sink.record_unhealthy();
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

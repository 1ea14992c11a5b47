//! mcping-health — liveness probing for a Bedrock game server.
//!
//! Provides the RakNet unconnected-ping codec, two probe strategies (UDP
//! ping and plain TCP connect), and the scheduler that runs a probe on a
//! fixed period and records the verdict.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (background task)
//!   ├── countdown on the monotonic clock, polled every poll_interval
//!   ├── Prober::probe() → ProbeOutcome
//!   │   ├── RakNetProber: PingCodec::build_probe() → UDP → classify_reply()
//!   │   └── TcpProber: connect + close
//!   └── HealthSink: record_attempt() + record_healthy()/record_unhealthy()
//! ```
//!
//! A probe never retries. The next tick is the retry.

pub mod codec;
pub mod error;
pub mod outcome;
pub mod prober;
pub mod scheduler;

pub use codec::{PingCodec, is_live_response};
pub use error::ProbeError;
pub use outcome::{ProbeOutcome, UnhealthyReason};
pub use prober::{Probe, ProbeKind, ProbeTarget, Prober, RakNetProber, TcpProber};
pub use scheduler::{ScheduleConfig, Scheduler};

//! mcping-metrics — health state and Prometheus exposition for mcping.
//!
//! Holds the latest probe verdict in a lock-free [`HealthState`] and
//! serves it in the Prometheus text exposition format.
//!
//! # Architecture
//!
//! ```text
//! HealthState (Arc, shared)
//!   ├── record_attempt() / record_healthy() / record_unhealthy() ← scheduler
//!   └── snapshot() → HealthSnapshot
//!
//! Prometheus exposition
//!   ├── render_prometheus() → text/plain body
//!   └── build_router() + serve() → GET /metrics
//! ```

pub mod prometheus;
pub mod server;
pub mod state;

pub use prometheus::render_prometheus;
pub use server::{build_router, serve};
pub use state::{HealthSink, HealthSnapshot, HealthState, Verdict};

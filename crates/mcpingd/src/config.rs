//! Daemon configuration.
//!
//! Every option can be given as a flag or through its environment variable;
//! flags win. The record is read once at startup and never changes.

use std::net::IpAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use mcping_health::{ProbeKind, ProbeTarget, ScheduleConfig};
use mcping_metrics::prometheus::{DEFAULT_PREFIX, is_valid_prefix};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mcpingd",
    version,
    about = "Probe a Bedrock server and expose its liveness to Prometheus"
)]
pub struct Config {
    /// Host of the game server to probe.
    #[arg(long = "host", env = "MINECRAFT_HOST", default_value = "127.0.0.1")]
    pub target_host: String,

    /// Port of the game server to probe.
    #[arg(
        long = "port",
        env = "MINECRAFT_PORT",
        default_value_t = 19132,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub target_port: u16,

    /// Address the metrics endpoint binds to.
    #[arg(long, env = "PROMETHEUS_HOST", default_value = "127.0.0.1")]
    pub metrics_host: String,

    /// Port the metrics endpoint binds to.
    #[arg(
        long,
        env = "PROMETHEUS_PORT",
        default_value_t = 9001,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub metrics_port: u16,

    /// Probe strategy.
    #[arg(long = "probe", env = "PROBE_KIND", value_enum, default_value_t = ProbeKindArg::Raknet)]
    pub probe_kind: ProbeKindArg,

    /// Deadline for a single probe, in milliseconds.
    #[arg(long, env = "PROBE_TIMEOUT_MS", default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Time between probes, in milliseconds.
    #[arg(long, env = "PROBE_PERIOD_MS", default_value_t = 1000)]
    pub period_ms: u64,

    /// How often the scheduler wakes up, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Prefix for the exported metric names.
    #[arg(long, env = "METRIC_PREFIX", default_value = DEFAULT_PREFIX)]
    pub metric_prefix: String,

    /// What a second SIGINT/SIGTERM does while shutting down.
    #[arg(long, env = "SECOND_SIGNAL", value_enum, default_value_t = SecondSignal::ForceExit)]
    pub second_signal: SecondSignal,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbeKindArg {
    /// RakNet unconnected ping over UDP.
    Raknet,
    /// Plain TCP connect.
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecondSignal {
    /// Exit immediately with a non-zero status.
    ForceExit,
    /// Log it and keep shutting down gracefully.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Startup configuration errors. All are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target host must not be empty")]
    EmptyTargetHost,

    #[error("target host is neither an IP address nor a DNS name: {0:?}")]
    InvalidTargetHost(String),

    #[error("metrics host must not be empty")]
    EmptyMetricsHost,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("poll interval ({poll_ms}ms) must not exceed the probe period ({period_ms}ms)")]
    PollExceedsPeriod { poll_ms: u64, period_ms: u64 },

    #[error("invalid metric prefix: {0:?}")]
    InvalidPrefix(String),
}

impl Config {
    /// Check cross-field constraints clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_host.trim().is_empty() {
            return Err(ConfigError::EmptyTargetHost);
        }
        if !is_valid_host(self.target_host.trim()) {
            return Err(ConfigError::InvalidTargetHost(self.target_host.clone()));
        }
        if self.metrics_host.trim().is_empty() {
            return Err(ConfigError::EmptyMetricsHost);
        }
        for (name, value) in [
            ("probe timeout", self.timeout_ms),
            ("probe period", self.period_ms),
            ("poll interval", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if self.poll_interval_ms > self.period_ms {
            return Err(ConfigError::PollExceedsPeriod {
                poll_ms: self.poll_interval_ms,
                period_ms: self.period_ms,
            });
        }
        if !is_valid_prefix(&self.metric_prefix) {
            return Err(ConfigError::InvalidPrefix(self.metric_prefix.clone()));
        }
        Ok(())
    }

    pub fn target(&self) -> ProbeTarget {
        ProbeTarget::new(self.target_host.trim(), self.target_port)
    }

    pub fn probe_kind(&self) -> ProbeKind {
        match self.probe_kind {
            ProbeKindArg::Raknet => ProbeKind::RakNet,
            ProbeKindArg::Tcp => ProbeKind::Tcp,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            period: Duration::from_millis(self.period_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// An IP literal, or a DNS name of dot-separated `[A-Za-z0-9-]` labels.
fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    let name = host.strip_suffix('.').unwrap_or(host);
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

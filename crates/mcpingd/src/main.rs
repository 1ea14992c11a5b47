//! mcpingd — liveness sidecar for a Bedrock game server.
//!
//! Single binary that assembles:
//! - Probe scheduler (RakNet unconnected ping, or plain TCP connect)
//! - Health state shared with the metrics endpoint
//! - Prometheus scrape endpoint
//! - Signal-driven graceful shutdown
//!
//! # Usage
//!
//! ```text
//! MINECRAFT_HOST=10.0.0.5 PROMETHEUS_PORT=9001 mcpingd
//! mcpingd --host 10.0.0.5 --probe tcp --period-ms 5000
//! ```

mod config;
mod lifecycle;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use mcping_health::{Probe, Prober, Scheduler};
use mcping_metrics::HealthState;

use crate::config::{Config, LogFormat};
use crate::lifecycle::{Lifecycle, Signals};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return Err(e).context("invalid configuration");
    }

    run(config).await
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let prober = Prober::new(config.probe_kind(), config.target(), config.timeout());
    info!(
        target_addr = %prober.target(),
        probe = %prober.kind(),
        timeout_ms = config.timeout_ms,
        period_ms = config.period_ms,
        "mcpingd starting"
    );

    // ── Shared state ───────────────────────────────────────────

    let health = Arc::new(HealthState::new());
    let lifecycle = Arc::new(Lifecycle::new(config.second_signal));

    let signals = Signals::install().context("failed to install signal handlers")?;
    let signal_handle = tokio::spawn(signals.run(lifecycle.clone()));

    // ── Metrics server ─────────────────────────────────────────

    let listener = TcpListener::bind((config.metrics_host.as_str(), config.metrics_port))
        .await
        .with_context(|| {
            format!(
                "failed to bind metrics server on {}:{}",
                config.metrics_host, config.metrics_port
            )
        })?;
    let router = mcping_metrics::build_router(health.clone(), &config.metric_prefix);
    let mut server_handle =
        tokio::spawn(mcping_metrics::serve(listener, router, lifecycle.subscribe()));

    // ── Probe scheduler ────────────────────────────────────────

    let scheduler_handle =
        Scheduler::new(prober, health, config.schedule()).spawn(lifecycle.subscribe());

    // ── Wait for shutdown ──────────────────────────────────────

    let server_result = tokio::select! {
        _ = lifecycle.stopped() => {
            info!("stopping metrics server");
            server_handle.await
        }
        early = &mut server_handle => {
            if !lifecycle.is_shutting_down() {
                error!("metrics server exited unexpectedly");
                lifecycle.request_shutdown();
            }
            early
        }
    };

    info!("stopping probe scheduler");
    let scheduler_result = scheduler_handle.await;

    // Keep handling signals until both tasks are joined so a second one
    // can still force an exit.
    signal_handle.abort();

    server_result
        .context("metrics server task panicked")?
        .context("metrics server failed")?;
    scheduler_result.context("probe scheduler task panicked")?;

    info!("mcpingd stopped");
    Ok(())
}

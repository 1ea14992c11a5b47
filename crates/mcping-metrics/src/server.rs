//! Scrape endpoint — axum router serving `/metrics`.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::prometheus::{CONTENT_TYPE, render_prometheus};
use crate::state::HealthState;

/// Shared state for the scrape handler.
#[derive(Clone)]
pub struct MetricsState {
    pub health: Arc<HealthState>,
    pub prefix: Arc<str>,
}

/// Build the scrape router.
pub fn build_router(health: Arc<HealthState>, prefix: &str) -> Router {
    let state = MetricsState {
        health,
        prefix: Arc::from(prefix),
    };

    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    let body = render_prometheus(&state.prefix, &state.health.snapshot());
    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body)
}

/// Serve `router` on an already-bound listener until `shutdown` flips to true.
///
/// In-flight scrapes are allowed to finish before this returns.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "metrics server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // A dropped sender also means shutdown.
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    info!(%addr, "metrics server stopped");
    Ok(())
}

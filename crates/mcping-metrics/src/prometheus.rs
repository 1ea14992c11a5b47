//! Prometheus text exposition format.
//!
//! Renders the health state into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use std::fmt::Write;

use crate::state::HealthSnapshot;

/// Content type for the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Metric prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "minecraft:healthcheck";

/// Render a health snapshot into Prometheus text format.
///
/// Produces one COUNTER (`<prefix>:attempt`) and two GAUGE metrics
/// (`<prefix>:healthy`, `<prefix>:unhealthy`).
pub fn render_prometheus(prefix: &str, snapshot: &HealthSnapshot) -> String {
    let mut out = String::new();

    write_metric(
        &mut out,
        &format!("{prefix}:attempt"),
        "Number of attempted healthchecks.",
        "counter",
        snapshot.attempts,
    );
    write_metric(
        &mut out,
        &format!("{prefix}:healthy"),
        "1 if the server is healthy. 0 if the server is unhealthy or not checked.",
        "gauge",
        u64::from(snapshot.healthy),
    );
    write_metric(
        &mut out,
        &format!("{prefix}:unhealthy"),
        "1 if the server is unhealthy. 0 if the server is healthy or not checked.",
        "gauge",
        u64::from(snapshot.unhealthy),
    );

    out
}

fn write_metric(out: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

/// Whether `prefix` yields valid metric names (`[a-zA-Z_:][a-zA-Z0-9_:]*`).
pub fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

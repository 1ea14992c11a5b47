//! Probe outcomes.

use std::fmt;

use crate::error::ProbeError;

/// Result of a single liveness probe.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The target answered the way a live server does.
    Healthy,
    /// The target is down or not answering. Expected, not a fault.
    Unhealthy(UnhealthyReason),
    /// The probe itself could not be carried out.
    Error(ProbeError),
}

impl ProbeOutcome {
    /// Whether the target should be reported healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

/// Why a target was classified unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhealthyReason {
    /// The target actively refused the connection (or ICMP port unreachable).
    ConnectionRefused,
    /// No reply or handshake within the probe deadline.
    Timeout,
    /// A reply arrived but was not an unconnected pong.
    UnexpectedReply(u8),
    /// A zero-length reply arrived.
    EmptyReply,
}

impl fmt::Display for UnhealthyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnhealthyReason::ConnectionRefused => f.write_str("connection refused"),
            UnhealthyReason::Timeout => f.write_str("no reply within deadline"),
            UnhealthyReason::UnexpectedReply(id) => {
                write!(f, "unexpected reply (message id {id:#04x})")
            }
            UnhealthyReason::EmptyReply => f.write_str("empty reply"),
        }
    }
}

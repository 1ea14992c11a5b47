//! Probe error types.

use thiserror::Error;

/// Transport faults that prevent a probe from being carried out.
///
/// These are distinct from an unhealthy target: the monitor could not tell
/// whether the server is up.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no usable address for {0}")]
    NoAddress(String),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

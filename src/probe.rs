//! Probe transport layer.
//!
//! A probe transport sends one echo request to a host with a bounded timeout
//! and reports the round-trip latency or a failure reason. The latency
//! monitor treats every failure the same way (one failed cycle), except for
//! [`ProbeError::Unavailable`], which means the facility cannot be invoked at
//! all and aborts the run.

use std::time::Duration;

use thiserror::Error;

mod icmp;

pub use icmp::IcmpProbe;

/// Errors produced by a probe transport.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The transport cannot be invoked at all (e.g. raw socket permission
    /// denied). Fatal: aborts the run instead of counting failed cycles.
    #[error("probe transport unavailable: {0}")]
    Unavailable(String),

    /// No reply within the probe timeout.
    #[error("probe timed out")]
    Timeout,

    /// The target could not be reached.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// Hostname resolution failed.
    #[error("failed to resolve host: {0}")]
    Resolve(String),

    /// A reply arrived but did not yield a usable latency value.
    #[error("malformed probe response: {0}")]
    Malformed(String),
}

impl ProbeError {
    /// Whether this error should abort the run entirely.
    ///
    /// Everything except [`ProbeError::Unavailable`] counts as one failed
    /// cycle and keeps the sampling loop alive.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// One-shot echo probe against a host.
///
/// Implementations must not exceed `timeout` by more than a small bounded
/// margin; the monitor's stop path relies on that bound for forward progress.
#[async_trait::async_trait]
pub trait ProbeTransport: Send + Sync + 'static {
    /// Verify the transport can be invoked at all.
    ///
    /// Called once before a run starts. The default implementation assumes
    /// availability.
    async fn preflight(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    /// Send one echo request to `host` and return the round-trip latency in
    /// milliseconds.
    async fn probe(&self, host: &str, timeout: Duration) -> Result<f64, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_fatal() {
        assert!(ProbeError::Unavailable("permission denied".into()).is_fatal());
        assert!(!ProbeError::Timeout.is_fatal());
        assert!(!ProbeError::Unreachable("no route".into()).is_fatal());
        assert!(!ProbeError::Resolve("no addresses".into()).is_fatal());
        assert!(!ProbeError::Malformed("negative rtt".into()).is_fatal());
    }
}

//! Run statistics: mutable state owned by the sampling loop and the
//! immutable views handed to consumers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One successful probe measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Seconds since the run started.
    pub elapsed_secs: f64,
    /// Measured round-trip time in milliseconds.
    pub latency_ms: f64,
}

/// Mutable per-run statistics.
///
/// Owned exclusively by the sampling loop; consumers only ever see the
/// [`Snapshot`] values published from it, so no field here needs its own
/// synchronization.
#[derive(Debug)]
pub(crate) struct RunState {
    target: Arc<str>,
    started_at: DateTime<Utc>,
    sent: u64,
    received: u64,
    failed: u64,
    samples: Vec<Sample>,
}

impl RunState {
    pub(crate) fn new(target: Arc<str>, started_at: DateTime<Utc>) -> Self {
        Self {
            target,
            started_at,
            sent: 0,
            received: 0,
            failed: 0,
            samples: Vec::new(),
        }
    }

    /// Record one cycle that produced a latency measurement.
    pub(crate) fn record_success(&mut self, elapsed_secs: f64, latency_ms: f64) {
        self.sent += 1;
        self.received += 1;
        self.samples.push(Sample {
            elapsed_secs,
            latency_ms,
        });
    }

    /// Record one cycle that failed (timeout, unreachable, malformed reply).
    pub(crate) fn record_failure(&mut self) {
        self.sent += 1;
        self.failed += 1;
    }

    /// Build an immutable view of the current statistics.
    pub(crate) fn snapshot(&self, elapsed: Duration, running: bool) -> Snapshot {
        Snapshot {
            target: Arc::clone(&self.target),
            started_at: self.started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            sent: self.sent,
            received: self.received,
            failed: self.failed,
            running,
            samples: self.samples.clone().into(),
        }
    }

    /// Derive the end-of-run summary.
    pub(crate) fn summary(&self, elapsed: Duration) -> Summary {
        Summary {
            target: self.target.to_string(),
            started_at: self.started_at,
            duration_secs: elapsed.as_secs_f64(),
            sent: self.sent,
            received: self.received,
            failed: self.failed,
            success_rate_percent: success_rate_percent(self.sent, self.received),
            average_latency_ms: average_latency_ms(&self.samples),
        }
    }
}

/// Immutable view of run statistics at a point in time.
///
/// Snapshots never alias the loop's mutable storage; two snapshots taken at
/// different times never change retroactively.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Probe target host.
    pub target: Arc<str>,
    /// Wall-clock time the run started.
    pub started_at: DateTime<Utc>,
    /// Seconds elapsed since the run started, as of the publishing cycle.
    pub elapsed_secs: f64,
    /// Probes sent. Always equals `received + failed`.
    pub sent: u64,
    /// Probes that produced a latency measurement.
    pub received: u64,
    /// Probes that failed.
    pub failed: u64,
    /// Whether the sampling loop is still running.
    pub running: bool,
    /// Measurements so far, ordered by elapsed time. One per received probe.
    pub samples: Arc<[Sample]>,
}

impl Snapshot {
    /// Delivery success rate in percent. Zero when nothing has been sent.
    pub fn success_rate_percent(&self) -> f64 {
        success_rate_percent(self.sent, self.received)
    }

    /// Mean latency over all samples, `None` when nothing was received.
    pub fn average_latency_ms(&self) -> Option<f64> {
        average_latency_ms(&self.samples)
    }
}

/// End-of-run summary, derived purely from run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Probe target host.
    pub target: String,
    /// Wall-clock time the run started.
    pub started_at: DateTime<Utc>,
    /// Total run duration in seconds.
    pub duration_secs: f64,
    /// Probes sent.
    pub sent: u64,
    /// Probes that produced a latency measurement.
    pub received: u64,
    /// Probes that failed.
    pub failed: u64,
    /// Delivery success rate in percent. Zero when nothing was sent.
    pub success_rate_percent: f64,
    /// Mean latency in milliseconds. Absent when nothing was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_latency_ms: Option<f64>,
}

fn success_rate_percent(sent: u64, received: u64) -> f64 {
    if sent == 0 {
        0.0
    } else {
        received as f64 / sent as f64 * 100.0
    }
}

fn average_latency_ms(samples: &[Sample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: f64 = samples.iter().map(|s| s.latency_ms).sum();
    Some(total / samples.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RunState {
        RunState::new(Arc::from("8.8.8.8"), Utc::now())
    }

    #[test]
    fn test_counters_stay_consistent() {
        let mut state = state();
        state.record_success(0.5, 10.0);
        state.record_failure();
        state.record_success(1.5, 12.0);

        let snap = state.snapshot(Duration::from_secs(2), true);
        assert_eq!(snap.sent, 3);
        assert_eq!(snap.received, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.sent, snap.received + snap.failed);
        assert_eq!(snap.samples.len() as u64, snap.received);
    }

    #[test]
    fn test_success_rate_zero_sent() {
        let snap = state().snapshot(Duration::ZERO, true);
        assert_eq!(snap.success_rate_percent(), 0.0);
        assert_eq!(snap.average_latency_ms(), None);
    }

    #[test]
    fn test_summary_average() {
        let mut state = state();
        state.record_success(0.5, 10.0);
        state.record_success(1.0, 12.0);
        state.record_success(1.5, 11.0);
        state.record_failure();

        let summary = state.summary(Duration::from_secs(2));
        assert_eq!(summary.sent, 4);
        assert_eq!(summary.received, 3);
        assert_eq!(summary.success_rate_percent, 75.0);
        let avg = summary.average_latency_ms.unwrap();
        assert!((avg - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary_has_no_average() {
        let summary = state().summary(Duration::ZERO);
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.success_rate_percent, 0.0);
        assert!(summary.average_latency_ms.is_none());
    }

    #[test]
    fn test_snapshot_does_not_alias_state() {
        let mut state = state();
        state.record_success(0.5, 10.0);
        let before = state.snapshot(Duration::from_secs(1), true);

        state.record_success(1.0, 20.0);
        assert_eq!(before.samples.len(), 1);
        assert_eq!(before.received, 1);
    }
}

//! Continuous latency monitoring.
//!
//! [`LatencyMonitor`] owns the lifecycle of one latency run at a time: it
//! drives a [`ProbeTransport`](crate::probe::ProbeTransport) at a fixed
//! cadence on a dedicated tokio task and publishes an immutable [`Snapshot`]
//! after every cycle. Consumers read snapshots at any rate without blocking
//! the sampling loop, and the loop never waits on a reader.
//!
//! # Architecture
//!
//! - The sampling loop is the single writer of [`RunState`]; everything a
//!   consumer sees goes through one `watch::Sender::send_replace` per cycle,
//!   so a reader observes either the pre-cycle or the fully updated
//!   post-cycle statistics, never an intermediate.
//! - Stopping is cooperative: the stop signal is checked between cycles and
//!   immediately after a probe returns. An in-flight probe is never
//!   interrupted; its own timeout bounds how long a stop can take.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{LatencyConfig, MIN_CADENCE};
use crate::probe::{ProbeError, ProbeTransport};

mod state;

pub use state::{Sample, Snapshot, Summary};

use state::RunState;

/// Errors surfaced by the latency monitor.
///
/// Per-cycle probe failures are absorbed into the run's counters and never
/// show up here; only start-time validation and a transport that cannot be
/// invoked at all propagate as errors.
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    /// A run is already in progress on this monitor.
    #[error("a latency run is already in progress")]
    AlreadyRunning,

    /// The target was still empty after normalization.
    #[error("invalid probe target: {0:?}")]
    InvalidTarget(String),

    /// The probe transport cannot be invoked at all. Fatal to the run.
    #[error("probe transport unavailable")]
    ProbeUnavailable(#[source] ProbeError),

    /// `stop` was called before any run was started.
    #[error("no latency run has been started")]
    NeverStarted,

    /// The sampling task aborted abnormally.
    #[error("sampling task failed: {0}")]
    TaskFailed(String),
}

/// What the sampling loop hands back when it exits.
struct RunOutcome {
    summary: Summary,
    fatal: Option<ProbeError>,
}

/// One spawned sampling loop.
struct ActiveRun {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<RunOutcome>,
}

/// Start/stop bookkeeping, serialized behind one async mutex.
#[derive(Default)]
struct Control {
    active: Option<ActiveRun>,
    last: Option<Result<Summary, MonitorError>>,
}

/// Handle for one latency run at a time.
///
/// At most one sampling loop is active per monitor. A stopped run is never
/// resumed; starting again creates fresh statistics.
pub struct LatencyMonitor {
    transport: Arc<dyn ProbeTransport>,
    control: Mutex<Control>,
    // Kept outside `control` so snapshot readers never contend with a stop
    // that is waiting for the loop to exit.
    live: RwLock<Option<watch::Receiver<Snapshot>>>,
}

impl LatencyMonitor {
    /// Create a monitor over the given probe transport.
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            transport,
            control: Mutex::new(Control::default()),
            live: RwLock::new(None),
        }
    }

    /// Start a latency run.
    ///
    /// Fails with [`MonitorError::AlreadyRunning`] if a run is in progress,
    /// and with [`MonitorError::ProbeUnavailable`] if the transport preflight
    /// fails, in which case nothing is started. A blank target falls back to
    /// the documented default host.
    pub async fn start(&self, config: LatencyConfig) -> Result<(), MonitorError> {
        let mut control = self.control.lock().await;

        if control.active.as_ref().is_some_and(|a| !a.task.is_finished()) {
            return Err(MonitorError::AlreadyRunning);
        }
        // A run that ended on its own (fatal transport error) is reaped here
        // so its outcome is not silently lost.
        if let Some(finished) = control.active.take() {
            control.last = Some(finish_run(finished).await);
        }

        let target: Arc<str> = config.resolved_target().into();
        if target.is_empty() {
            return Err(MonitorError::InvalidTarget(config.target.clone()));
        }

        let cadence = if config.cadence < MIN_CADENCE {
            tracing::warn!(
                requested = ?config.cadence,
                min = ?MIN_CADENCE,
                "Cadence below minimum, clamping"
            );
            MIN_CADENCE
        } else {
            config.cadence
        };

        self.transport
            .preflight()
            .await
            .map_err(MonitorError::ProbeUnavailable)?;

        let origin = Instant::now();
        let state = RunState::new(Arc::clone(&target), Utc::now());
        let (tx, rx) = watch::channel(state.snapshot(Duration::ZERO, true));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(sampling_loop(
            Arc::clone(&self.transport),
            state,
            Arc::clone(&target),
            cadence,
            config.probe_timeout,
            origin,
            tx,
            stop_rx,
        ));

        *write_live(&self.live) = Some(rx);
        control.active = Some(ActiveRun { stop_tx, task });
        control.last = None;
        Ok(())
    }

    /// Stop the current run and return its summary.
    ///
    /// Signals the loop to exit after any in-flight cycle completes and waits
    /// for it; no statistics change after this returns. Idempotent: stopping
    /// an already-stopped run returns the same result again.
    pub async fn stop(&self) -> Result<Summary, MonitorError> {
        let mut control = self.control.lock().await;

        if let Some(active) = control.active.take() {
            let result = finish_run(active).await;
            control.last = Some(result.clone());
            return result;
        }

        control.last.clone().ok_or(MonitorError::NeverStarted)?
    }

    /// Read the most recently published statistics.
    ///
    /// Callable from any number of readers at any rate; never blocks the
    /// sampling loop. `None` only before the first start.
    pub fn snapshot(&self) -> Option<Snapshot> {
        read_live(&self.live)
            .as_ref()
            .map(|rx| rx.borrow().clone())
    }

    /// Subscribe to per-cycle snapshot publishes.
    ///
    /// Push-based alternative to polling [`snapshot`](Self::snapshot). The
    /// channel always holds the latest value; a slow subscriber only misses
    /// intermediate publishes, never stalls the loop.
    pub fn subscribe(&self) -> Option<watch::Receiver<Snapshot>> {
        read_live(&self.live).clone()
    }

    /// Whether a sampling loop is currently publishing.
    pub fn is_running(&self) -> bool {
        self.snapshot().is_some_and(|s| s.running)
    }
}

impl std::fmt::Debug for LatencyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyMonitor")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn read_live(
    live: &RwLock<Option<watch::Receiver<Snapshot>>>,
) -> std::sync::RwLockReadGuard<'_, Option<watch::Receiver<Snapshot>>> {
    live.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_live(
    live: &RwLock<Option<watch::Receiver<Snapshot>>>,
) -> std::sync::RwLockWriteGuard<'_, Option<watch::Receiver<Snapshot>>> {
    live.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Signal a run to stop and collect its outcome.
async fn finish_run(active: ActiveRun) -> Result<Summary, MonitorError> {
    // The receiver is gone if the loop already exited; that is fine.
    let _ = active.stop_tx.send(true);
    match active.task.await {
        Ok(outcome) => match outcome.fatal {
            Some(e) => Err(MonitorError::ProbeUnavailable(e)),
            None => Ok(outcome.summary),
        },
        Err(e) => Err(MonitorError::TaskFailed(e.to_string())),
    }
}

/// The sampling loop: one probe per cycle, one publish per cycle.
#[allow(clippy::too_many_arguments)]
async fn sampling_loop(
    transport: Arc<dyn ProbeTransport>,
    mut state: RunState,
    target: Arc<str>,
    cadence: Duration,
    probe_timeout: Duration,
    origin: Instant,
    tx: watch::Sender<Snapshot>,
    mut stop_rx: watch::Receiver<bool>,
) -> RunOutcome {
    tracing::info!(
        target = %target,
        cadence_ms = cadence.as_millis(),
        probe_timeout_ms = probe_timeout.as_millis(),
        "Latency run started"
    );

    let mut fatal = None;
    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }
        let cycle_start = Instant::now();

        match transport.probe(&target, probe_timeout).await {
            Ok(latency_ms) => {
                state.record_success(origin.elapsed().as_secs_f64(), latency_ms);
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(target = %target, error = %e, "Probe transport unavailable, aborting run");
                fatal = Some(e);
                break;
            }
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Probe cycle failed");
                state.record_failure();
            }
        }

        // The one publish per cycle. Readers see either this state or the
        // previous one, never a half-applied update.
        tx.send_replace(state.snapshot(origin.elapsed(), true));

        let idle = cadence.saturating_sub(cycle_start.elapsed());
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(idle) => {}
        }
    }

    let elapsed = origin.elapsed();
    tx.send_replace(state.snapshot(elapsed, false));
    let summary = state.summary(elapsed);
    tracing::info!(
        target = %target,
        sent = summary.sent,
        received = summary.received,
        failed = summary.failed,
        "Latency run stopped"
    );
    RunOutcome { summary, fatal }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport that always succeeds with a fixed latency.
    struct FixedProbe(f64);

    #[async_trait::async_trait]
    impl ProbeTransport for FixedProbe {
        async fn probe(&self, _host: &str, _timeout: Duration) -> Result<f64, ProbeError> {
            Ok(self.0)
        }
    }

    fn monitor() -> LatencyMonitor {
        LatencyMonitor::new(Arc::new(FixedProbe(5.0)))
    }

    #[tokio::test]
    async fn test_snapshot_none_before_start() {
        let monitor = monitor();
        assert!(monitor.snapshot().is_none());
        assert!(monitor.subscribe().is_none());
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_stop_before_start_errors() {
        let monitor = monitor();
        assert!(matches!(
            monitor.stop().await,
            Err(MonitorError::NeverStarted)
        ));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_blank_target_defaults() {
        let monitor = monitor();
        monitor
            .start(LatencyConfig::new("   "))
            .await
            .unwrap();
        let snap = monitor.snapshot().unwrap();
        assert_eq!(&*snap.target, "8.8.8.8");
        monitor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_restart_after_stop_resets_state() {
        let monitor = monitor();
        let mut rx = {
            monitor.start(LatencyConfig::new("127.0.0.1")).await.unwrap();
            monitor.subscribe().unwrap()
        };
        while rx.borrow_and_update().sent < 2 {
            rx.changed().await.unwrap();
        }
        let first = monitor.stop().await.unwrap();
        assert!(first.sent >= 2);

        monitor.start(LatencyConfig::new("127.0.0.1")).await.unwrap();
        let snap = monitor.snapshot().unwrap();
        assert_eq!(snap.sent, 0);
        assert!(snap.running);
        monitor.stop().await.unwrap();
    }
}

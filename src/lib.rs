//! Netpulse - Network Diagnostics Library
//!
//! This crate provides two network checks:
//!
//! - **Latency monitoring**: a background sampler that repeatedly probes a
//!   target host, tracks cumulative delivery statistics, and publishes
//!   thread-safe live snapshots to any number of consumers.
//! - **Throughput testing**: a one-shot download/upload/round-trip
//!   measurement against an HTTP endpoint.
//!
//! # Architecture
//!
//! - [`monitor`]: Run lifecycle, sampling loop, snapshot publishing
//! - [`probe`]: Probe transport contract and the ICMP implementation
//! - [`throughput`]: One-shot throughput test
//! - [`config`]: Serde-based configuration with YAML loading
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netpulse::{IcmpProbe, LatencyConfig, LatencyMonitor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = LatencyMonitor::new(Arc::new(IcmpProbe::new()));
//! monitor.start(LatencyConfig::new("8.8.8.8")).await?;
//!
//! // ... read monitor.snapshot() from anywhere, at any rate ...
//!
//! let summary = monitor.stop().await?;
//! println!("average latency: {:?} ms", summary.average_latency_ms);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod monitor;
pub mod probe;
pub mod throughput;

pub use config::{AppConfig, ConfigError, LatencyConfig, ThroughputConfig};
pub use monitor::{LatencyMonitor, MonitorError, Sample, Snapshot, Summary};
pub use probe::{IcmpProbe, ProbeError, ProbeTransport};
pub use throughput::{HttpThroughputTest, ThroughputError, ThroughputReport, ThroughputTest};

//! One-shot throughput test.
//!
//! Measures download speed, upload speed, and round-trip time against an
//! HTTP endpoint. Unlike the latency monitor this is a plain blocking-style
//! call with no shared state; callers run it once and get a report or an
//! error.

use std::time::Duration;

use rand::RngCore;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::time::{Instant, timeout};

use crate::config::ThroughputConfig;

/// Number of timed requests used for the ping phase; the best one wins.
const PING_ROUNDS: usize = 3;

/// Errors produced by a throughput test.
#[derive(Debug, Error)]
pub enum ThroughputError {
    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A measurement phase exceeded the configured timeout.
    #[error("throughput test timed out")]
    Timeout,

    /// The download endpoint returned no body to measure.
    #[error("empty response body")]
    EmptyBody,
}

/// Result of one throughput test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputReport {
    /// Download speed in megabits per second.
    pub download_mbps: f64,
    /// Upload speed in megabits per second.
    pub upload_mbps: f64,
    /// Best observed round-trip time in milliseconds.
    pub ping_ms: f64,
}

/// A routine that produces one throughput report.
#[async_trait::async_trait]
pub trait ThroughputTest: Send + Sync {
    /// Run the full test: ping, download, upload.
    async fn run(&self) -> Result<ThroughputReport, ThroughputError>;
}

/// HTTP-based throughput test.
pub struct HttpThroughputTest {
    config: ThroughputConfig,
    client: Client,
}

impl HttpThroughputTest {
    /// Create a test against the endpoints in `config`.
    pub fn new(config: ThroughputConfig) -> Result<Self, ThroughputError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Best round-trip time over a few HEAD requests, in milliseconds.
    async fn measure_ping(&self) -> Result<f64, ThroughputError> {
        let mut best = f64::INFINITY;
        for _ in 0..PING_ROUNDS {
            let start = Instant::now();
            let resp = timeout(
                self.config.timeout,
                self.client.head(&self.config.download_url).send(),
            )
            .await
            .map_err(|_| ThroughputError::Timeout)??;
            resp.error_for_status()?;
            best = best.min(start.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(best)
    }

    /// Streamed download, measured as bytes over elapsed time.
    async fn measure_download(&self) -> Result<f64, ThroughputError> {
        let start = Instant::now();
        let phase = async {
            let mut resp = self
                .client
                .get(&self.config.download_url)
                .send()
                .await?
                .error_for_status()?;

            let mut total: usize = 0;
            while let Some(chunk) = resp.chunk().await? {
                total += chunk.len();
            }
            Ok::<usize, ThroughputError>(total)
        };

        let total = timeout(self.config.timeout, phase)
            .await
            .map_err(|_| ThroughputError::Timeout)??;
        if total == 0 {
            return Err(ThroughputError::EmptyBody);
        }
        Ok(megabits_per_second(total, start.elapsed()))
    }

    /// Timed POST of a random payload.
    async fn measure_upload(&self) -> Result<f64, ThroughputError> {
        let mut payload = vec![0u8; self.config.upload_bytes];
        rand::thread_rng().fill_bytes(&mut payload);
        let bytes = payload.len();

        let start = Instant::now();
        let resp = timeout(
            self.config.timeout,
            self.client.post(&self.config.upload_url).body(payload).send(),
        )
        .await
        .map_err(|_| ThroughputError::Timeout)??;
        resp.error_for_status()?;

        Ok(megabits_per_second(bytes, start.elapsed()))
    }
}

#[async_trait::async_trait]
impl ThroughputTest for HttpThroughputTest {
    async fn run(&self) -> Result<ThroughputReport, ThroughputError> {
        tracing::info!(url = %self.config.download_url, "Measuring round-trip time");
        let ping_ms = self.measure_ping().await?;

        tracing::info!(url = %self.config.download_url, "Measuring download speed");
        let download_mbps = self.measure_download().await?;

        tracing::info!(url = %self.config.upload_url, "Measuring upload speed");
        let upload_mbps = self.measure_upload().await?;

        Ok(ThroughputReport {
            download_mbps,
            upload_mbps,
            ping_ms,
        })
    }
}

/// Convert a byte count over a duration to megabits per second.
fn megabits_per_second(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 * 8.0 / 1_000_000.0 / secs
}

//! ICMP echo probe transport.
//!
//! Sends one ICMP echo request per probe call and measures the round-trip
//! time.

use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;

use crate::probe::{ProbeError, ProbeTransport};

/// ICMP echo probe backed by `surge-ping`.
///
/// A fresh ICMP client is created per probe call so that v4 and v6 targets
/// can be mixed across runs without holding both sockets open.
#[derive(Debug, Default)]
pub struct IcmpProbe;

impl IcmpProbe {
    /// Create a new ICMP probe transport.
    pub fn new() -> Self {
        Self
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, ProbeError> {
    // Try to parse as an IP address directly before hitting DNS.
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0"))
        .await
        .map_err(|e| ProbeError::Resolve(e.to_string()))?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Resolve(format!("no addresses found for '{host}'")))
}

/// Create an ICMP client for the given IP version.
///
/// Raw socket creation is where missing privileges surface, so a failure
/// here maps to the fatal [`ProbeError::Unavailable`].
fn make_client(ip_addr: IpAddr) -> Result<Client, ProbeError> {
    let result = match ip_addr {
        IpAddr::V4(_) => Client::new(&Config::default()),
        IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
    };
    result.map_err(|e| ProbeError::Unavailable(e.to_string()))
}

#[async_trait::async_trait]
impl ProbeTransport for IcmpProbe {
    async fn preflight(&self) -> Result<(), ProbeError> {
        // Opening a v4 socket is enough to detect missing privileges.
        make_client(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))?;
        Ok(())
    }

    async fn probe(&self, host: &str, probe_timeout: Duration) -> Result<f64, ProbeError> {
        let ip_addr = resolve_host(host).await?;
        let client = make_client(ip_addr)?;

        let mut pinger = client.pinger(ip_addr, PingIdentifier(rand::random())).await;
        pinger.timeout(probe_timeout);

        let result = timeout(probe_timeout, pinger.ping(PingSequence(0), &[])).await;

        match result {
            Ok(Ok((_, rtt))) => {
                let ms = rtt.as_secs_f64() * 1000.0;
                if !ms.is_finite() || ms < 0.0 {
                    return Err(ProbeError::Malformed(format!("unusable rtt: {ms}")));
                }
                tracing::debug!(host = %host, latency_ms = ms, "Ping probe successful");
                Ok(ms)
            }
            Ok(Err(surge_ping::SurgeError::Timeout { .. })) => Err(ProbeError::Timeout),
            Ok(Err(e)) => Err(ProbeError::Unreachable(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

//! Netpulse Binary Entry Point
//!
//! Command-line network diagnostics: continuous latency probing and one-shot
//! throughput tests. Core functionality is provided by the `netpulse`
//! library crate.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use netpulse::{
    AppConfig, HttpThroughputTest, IcmpProbe, LatencyMonitor, Snapshot, Summary,
    ThroughputReport, ThroughputTest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Netpulse - Network Diagnostics Tool
#[derive(Parser, Debug)]
#[command(name = "netpulse", version, about, long_about = None)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, env = "NETPULSE_CONFIG")]
    config: Option<String>,

    /// Emit results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Continuously probe a host and report latency statistics
    Latency {
        /// Target host (hostname or IP; defaults to 8.8.8.8)
        target: Option<String>,

        /// Delay between probes (e.g. 500ms)
        #[arg(long, value_parser = humantime::parse_duration)]
        cadence: Option<Duration>,

        /// Maximum wait per probe (e.g. 1s)
        #[arg(long, value_parser = humantime::parse_duration)]
        probe_timeout: Option<Duration>,

        /// Stop automatically after this long (runs until Ctrl+C otherwise)
        #[arg(long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,

        /// Interval between printed statistics lines
        #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
        report_every: Duration,
    },

    /// Run a one-shot download/upload/round-trip throughput test
    Speed {
        /// URL to download from
        #[arg(long)]
        download_url: Option<String>,

        /// URL to POST the upload payload to
        #[arg(long)]
        upload_url: Option<String>,

        /// Upload payload size in bytes
        #[arg(long)]
        upload_bytes: Option<usize>,

        /// Overall timeout per measurement phase
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,netpulse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration file if given; CLI flags override it below.
    let app_config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Latency {
            target,
            cadence,
            probe_timeout,
            duration,
            report_every,
        } => {
            let mut config = app_config.latency;
            if let Some(target) = target {
                config.target = target;
            }
            if let Some(cadence) = cadence {
                config.cadence = cadence;
            }
            if let Some(timeout) = probe_timeout {
                config.probe_timeout = timeout;
            }
            run_latency(config, duration, report_every, cli.json).await
        }
        Command::Speed {
            download_url,
            upload_url,
            upload_bytes,
            timeout,
        } => {
            let mut config = app_config.throughput;
            if let Some(url) = download_url {
                config.download_url = url;
            }
            if let Some(url) = upload_url {
                config.upload_url = url;
            }
            if let Some(bytes) = upload_bytes {
                config.upload_bytes = bytes;
            }
            if let Some(timeout) = timeout {
                config.timeout = timeout;
            }
            config.validate()?;
            run_speed(config, cli.json).await
        }
    }
}

/// Run the latency monitor until Ctrl+C or the optional deadline.
async fn run_latency(
    config: netpulse::LatencyConfig,
    duration: Option<Duration>,
    report_every: Duration,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let monitor = LatencyMonitor::new(Arc::new(IcmpProbe::new()));
    monitor.start(config).await?;

    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let mut ticker = tokio::time::interval(report_every);
    ticker.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
                break;
            }
            _ = sleep_until_opt(deadline) => {
                break;
            }
            _ = ticker.tick() => {
                if let Some(snapshot) = monitor.snapshot() {
                    print_snapshot(&snapshot);
                }
            }
        }
    }

    let summary = monitor.stop().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Run the one-shot throughput test and print the report.
async fn run_speed(
    config: netpulse::ThroughputConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let test = HttpThroughputTest::new(config)?;
    let report = test.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Sleep until the deadline, or forever when there is none.
async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    let last = snapshot
        .samples
        .last()
        .map(|s| format!("{:.1}ms", s.latency_ms))
        .unwrap_or_else(|| "-".to_string());
    let avg = snapshot
        .average_latency_ms()
        .map(|ms| format!("{ms:.1}ms"))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "[{:7.1}s] sent={} received={} failed={} success={:.1}% last={} avg={}",
        snapshot.elapsed_secs,
        snapshot.sent,
        snapshot.received,
        snapshot.failed,
        snapshot.success_rate_percent(),
        last,
        avg,
    );
}

fn print_summary(summary: &Summary) {
    println!("\nTest summary");
    println!("  Target:          {}", summary.target);
    println!("  Duration:        {:.1}s", summary.duration_secs);
    println!("  Packets sent:    {}", summary.sent);
    println!("  Received:        {}", summary.received);
    println!("  Failed:          {}", summary.failed);
    println!("  Success rate:    {:.1}%", summary.success_rate_percent);
    match summary.average_latency_ms {
        Some(ms) => println!("  Average latency: {ms:.1} ms"),
        None => println!("  Average latency: n/a"),
    }
}

fn print_report(report: &ThroughputReport) {
    println!("\nSpeed test results");
    println!("  Download: {:.2} Mbps", report.download_mbps);
    println!("  Upload:   {:.2} Mbps", report.upload_mbps);
    println!("  Ping:     {:.2} ms", report.ping_ms);
}

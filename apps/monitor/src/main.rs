//! fedprobe binary
//!
//! Loads the instance list, then probes every selected instance once per
//! interval and prints each round to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fedprobe::config::Config;
use fedprobe::transport::{Ssh2Connector, http_transport};
use fedprobe::{Aggregator, CheckSet, ConsoleReporter, ReportFormat, Scheduler, filter_instances};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fedprobe")]
#[command(about = "Probe the health of federated messenger instances")]
#[command(version)]
struct Cli {
    /// Instance keys or names to probe (all when omitted)
    identifiers: Vec<String>,

    /// Configuration file
    #[arg(long, env = "FEDPROBE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single round and exit
    #[arg(long)]
    once: bool,

    /// Report format, overrides the configured one
    #[arg(long, value_name = "table|json")]
    format: Option<ReportFormat>,

    /// Seconds between rounds, overrides the configured interval
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before clap so FEDPROBE_CONFIG can come from .env
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logger::init();

    let mut config = Config::from_config(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(format) = cli.format {
        config.probe.format = format;
    }
    if let Some(interval) = cli.interval {
        config.probe.interval_secs = interval;
    }
    info!("{}", config.probe);

    let instances = filter_instances(&config.instances, &cli.identifiers);
    if instances.is_empty() {
        warn!("No configured instance matches {:?}", cli.identifiers);
    }

    let settings = Arc::new(config.probe);
    let transport =
        http_transport(settings.request_timeout()).context("Failed to build HTTP client")?;
    let ssh = Arc::new(Ssh2Connector::new(settings.request_timeout()));
    let checks = CheckSet::from_settings(settings.clone(), transport, ssh)
        .context("Invalid check selection")?;

    let aggregator = Aggregator::new(checks).with_check_timeout(settings.check_timeout());
    let reporter = ConsoleReporter::stdout(settings.format);
    let mut scheduler = Scheduler::new(aggregator, instances, settings.interval(), reporter);

    if cli.once {
        scheduler.run_once().await;
    } else {
        scheduler.run().await;
    }

    Ok(())
}

//! Brocade telemetry daemon
//!
//! Main entry point for brocade-telemetryd.
//! Polls a switch over FOS REST and serves the result on /metrics.

use anyhow::Context;
use brocade_telemetryd::config::DEFAULT_CONFIG_PATH;
use brocade_telemetryd::{
    Collector, Gauges, Poller, RestClient, SystemdNotifier, TelemetryConfig, shutdown_on_ctrl_c,
    spawn_metrics_server,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Brocade FOS REST telemetry poller
#[derive(Parser, Debug)]
#[command(name = "brocade-telemetryd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter (trace, debug, info, warn, error or a RUST_LOG directive)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Run a single cycle, print the metrics to stdout and exit
    #[arg(long)]
    once: bool,
}

/// Initializes tracing/logging subsystem
fn init_logging(log_level: Option<&str>) -> anyhow::Result<()> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = TelemetryConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate().context("invalid configuration")?;

    let client = RestClient::new(&config.switch).context("creating REST client")?;
    let gauges = Arc::new(Gauges::new().context("creating metrics registry")?);
    let collector = Collector::new(config.polling.change_log_capacity, config.maps_thresholds());
    let mut poller = Poller::new(client, collector, gauges.clone(), config.interval());

    if args.once {
        let report = poller.run_cycle().await.context("poll cycle")?;
        info!(
            changes = report.changes,
            failed_requests = report.failed_requests,
            "single cycle done"
        );
        print!("{}", gauges.render());
        return Ok(());
    }

    let mut server = spawn_metrics_server(gauges, config.metrics.listen_addr)
        .await
        .context("starting metrics server")?;
    let mut poller = poller.with_notifier(SystemdNotifier::new());
    info!(
        switch = %config.switch.address,
        interval_secs = config.polling.interval_secs,
        "brocade-telemetryd started"
    );

    let outcome = tokio::select! {
        result = poller.run(shutdown_on_ctrl_c()) => result.context("poll loop"),
        joined = &mut server => match joined {
            Ok(Ok(())) => Err(anyhow::anyhow!("metrics server stopped")),
            Ok(Err(e)) => Err(e).context("metrics server"),
            Err(e) => Err(e).context("metrics server task"),
        },
    };
    server.abort();
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_level.as_deref()) {
        eprintln!("brocade-telemetryd: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("brocade-telemetryd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

//! Meter agent entry point.
//!
//! Loads the device configuration, drives every device through a simulated
//! P4Runtime transport, applies the configured meter operations and then
//! keeps reconciling until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use meteragent::config::AgentConfig;
use meteragent::daemon::{MeterDaemon, MeterDaemonConfig};
use meteragent::meter::{MeterOrch, SimulatedDevice, StaticPipelines};
use meteragent::{try_init_logging, LogFormat};
use pi_meter_common::{InMemoryMeterMirror, MeterTranslator};
use tracing::{error, info, warn};

/// P4Runtime Meter Synchronization Agent
#[derive(Parser, Debug)]
#[command(name = "meteragent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Apply operations, reconcile once, print the result and exit
    #[arg(long)]
    once: bool,

    /// Override the reconciliation interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
}

fn build_daemon(config: &AgentConfig, interval_ms: u64) -> MeterDaemon {
    let sim = Arc::new(SimulatedDevice::new());
    let mut pipelines = StaticPipelines::new();
    for device in &config.devices {
        info!(
            device_id = %device.id,
            meters = device.pipeline.meters().len(),
            "Registering device"
        );
        sim.add_device(device.id.clone(), &device.pipeline);
        pipelines.insert(device.id.clone(), device.pipeline.clone());
    }

    let orch = Arc::new(MeterOrch::new(
        config.orch_config(),
        sim,
        Arc::new(MeterTranslator::new()),
        Arc::new(InMemoryMeterMirror::new()),
        Arc::new(pipelines),
    ));

    MeterDaemon::new(
        MeterDaemonConfig {
            reconcile_interval_ms: interval_ms,
        },
        orch,
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = try_init_logging(LogFormat::from_json_flag(args.json_logs), &args.log_level) {
        eprintln!("meteragent: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(config = %args.config.display(), "Starting meteragent");

    let config = match AgentConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))
    {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let interval_ms = args.interval_ms.unwrap_or(config.reconcile_interval_ms);
    if interval_ms == 0 {
        error!("Reconciliation interval must be > 0");
        return ExitCode::FAILURE;
    }

    let daemon = Arc::new(build_daemon(&config, interval_ms));

    let operations: Vec<_> = config
        .devices
        .iter()
        .flat_map(|device| {
            device
                .operations
                .iter()
                .map(move |op| op.to_operation(&device.id))
        })
        .collect();
    daemon.apply_operations(operations).await;

    if args.once {
        let reports = daemon.reconcile_once().await;
        let snapshot = daemon.snapshot(reports).await;
        return match serde_json::to_string_pretty(&snapshot).context("serializing meter state") {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = ?e, "Failed to print meter state");
                ExitCode::FAILURE
            }
        };
    }

    let shutdown_handle = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Received SIGINT, shutting down gracefully...");
                    daemon.stop();
                }
                Err(err) => {
                    error!(error = %err, "Failed to listen for ctrl-c");
                }
            }
        })
    };

    daemon.run().await;
    shutdown_handle.abort();

    info!(stats = ?daemon.orch().stats(), "meteragent shutdown complete");
    ExitCode::SUCCESS
}

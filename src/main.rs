//! Guaíba Level Monitoring Service - Main Daemon
//!
//! A server-side daemon that continuously:
//! 1. Authenticates against ANA HidroWebService
//! 2. Fetches the newest reading for one telemetric station
//! 3. Converts it to a calibrated water level
//! 4. Overwrites the local snapshot cache (nivel.json)
//! 5. Publishes level + static labels to the remote store when it changes
//!
//! Usage:
//!   cargo run --release                          # Run forever with ./monitor.toml
//!   cargo run --release -- --config guaiba.toml  # Use another configuration
//!   cargo run --release -- --once                # Run a single cycle and exit
//!
//! Environment:
//!   GUAIBA_CONFIG      - configuration file (default: monitor.toml)
//!   GUAIBA_CREDENTIALS - ANA credential file, overrides [credentials].path
//!   RUST_LOG           - log filter (default: info)

use guaiba_service::config::MonitorConfig;
use guaiba_service::daemon::{CycleOutcome, Daemon};
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_tracing();

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut once = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --config requires a path");
                    std::process::exit(1);
                }
            }
            "--once" => {
                once = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--config PATH] [--once]", args[0]);
                std::process::exit(1);
            }
        }
    }

    let config = match MonitorConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration failed:\n{}", e);
            std::process::exit(1);
        }
    };
    info!(
        interval_minutes = config.poll.interval_minutes,
        search_interval = config.poll.search_interval.as_param(),
        offset_m = config.calibration.offset_m,
        snapshot = %config.snapshot.path.display(),
        "Configuration loaded"
    );

    let mut daemon = match Daemon::initialize(config) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Initialization failed:\n{}", e);
            std::process::exit(1);
        }
    };
    info!(station = daemon.station_code(), "Daemon initialized");

    if once {
        match daemon.run_cycle() {
            CycleOutcome::Published(level) => info!(level = %level.meters, "Published"),
            CycleOutcome::PublishFailed(level) => info!(level = %level.meters, "Publish failed"),
            CycleOutcome::Unchanged(level) => info!(level = %level.meters, "Unchanged"),
            CycleOutcome::Skipped(e) => info!(stage = e.stage(), "Cycle skipped"),
        }
        return;
    }

    daemon.run();
}

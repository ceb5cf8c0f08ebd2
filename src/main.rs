use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use diff_drive_runtime::config::{DriveConfig, TELEMETRY_EVERY};
use diff_drive_runtime::messages::Gear;
use diff_drive_runtime::runtime::{self, RunOptions};

/// Differential drive control loop over a simulated platform.
/// Reads JSON-lines operator commands on stdin, writes telemetry JSON lines to stdout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON drive config; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gear reported by the simulated shifter
    #[arg(short, long, value_enum, default_value_t = Gear::Low)]
    gear: Gear,

    /// Stop after this many control cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Print telemetry every N cycles (0 disables)
    #[arg(long, default_value_t = TELEMETRY_EVERY)]
    telemetry_every: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug); stdout is reserved for telemetry
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match DriveConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(2);
            }
        },
        None => DriveConfig::default(),
    };

    let options = RunOptions {
        config,
        gear: args.gear,
        cycles: args.cycles,
        telemetry_every: args.telemetry_every,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

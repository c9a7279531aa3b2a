use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wall_zenoh_runtime::config::{HardwareVariant, RuntimeConfig};

/// Wall robot runtime
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// JSON config file; defaults are used for anything it leaves out
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hardware revision (overrides the config file)
    #[arg(long, value_enum)]
    variant: Option<HardwareVariant>,

    /// Watchdog timeout in milliseconds
    #[arg(long)]
    watchdog_ms: Option<u64>,

    /// Status notification period in milliseconds
    #[arg(long)]
    status_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = wall_zenoh_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<RuntimeConfig, wall_zenoh_runtime::config::ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            RuntimeConfig::load(path)?
        }
        None => RuntimeConfig::default(),
    };

    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(ms) = args.watchdog_ms {
        config.watchdog_ms = ms;
    }
    if let Some(ms) = args.status_ms {
        config.status_period_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tivod_discovery::{DiscoveryConfig, DiscoverySession};
use tracing::info;

/// tivod - TiVo device discovery daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the DNS-SD service type to browse for
    #[arg(short, long)]
    service_type: Option<String>,

    /// Observation window before dumping results (seconds)
    #[arg(short, long, default_value_t = 5)]
    wait: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    discovery: DiscoveryConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Load configuration file if given
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            serde_yaml::from_str::<Config>(&content).context("Failed to parse config file")?
        }
        None => Config::default(),
    };

    if let Some(service_type) = args.service_type {
        config.discovery.service_type = service_type;
    }

    info!("started");

    let session = DiscoverySession::new(config.discovery)?;
    session.start().await.context("Failed to start discovery")?;

    // Let initial discovery results accumulate before reporting.
    tokio::time::sleep(Duration::from_secs(args.wait)).await;

    let devices = session.registry().snapshot();
    if devices.is_empty() {
        eprintln!("No devices found");
    } else {
        for device in &devices {
            eprintln!("Found {}", device);
        }
    }

    session.stop().await.context("Failed to stop discovery")?;

    info!("stopped");
    Ok(())
}

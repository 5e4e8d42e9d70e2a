use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use alert_relay::{server, Relay, RelayConfig};

#[derive(Parser)]
#[command(name = "alert-relay")]
#[command(about = "Relay alert webhooks to email and Azure DevOps work items")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Address to listen on, overrides server.bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // .env is optional
    dotenv::dotenv().ok();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("🚀 Starting Alert Relay");

    let mut config = match RelayConfig::load(&args.config)? {
        Some(config) => {
            info!("✅ Loaded configuration from {:?}", args.config);
            config
        }
        None => {
            warn!(
                "Config file {:?} not found. Using default configuration.",
                args.config
            );
            RelayConfig::default()
        }
    };
    config.apply_env();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    config.validate().context("invalid configuration")?;

    let relay = Relay::from_config(&config)?;
    let sinks = relay.sink_names();
    if sinks.is_empty() {
        warn!("No sinks configured; alerts will only be logged");
    } else {
        info!("📤 Sinks: {}", sinks.join(" -> "));
    }

    server::serve(Arc::new(relay), &config.server.bind).await
}

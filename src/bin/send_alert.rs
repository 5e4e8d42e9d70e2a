use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use alert_relay::AlertPayload;

#[derive(Parser)]
#[command(name = "send-alert")]
#[command(about = "Post a test alert to a running alert relay")]
struct Args {
    /// Webhook URL of the relay
    #[arg(short, long, default_value = "http://localhost:3000/webhook")]
    url: String,

    /// JSON file with the payload to send; overrides the other payload flags
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[arg(short, long, default_value = "[FIRING:1] HighCPU (prod-web-01)")]
    title: String,

    #[arg(short, long, default_value = "CPU usage above threshold: value=93.2 (usage at 93%)")]
    message: String,

    #[arg(short, long, default_value = "firing")]
    status: String,

    #[arg(long)]
    summary: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let body = match &args.data {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {:?}", path))?;
            serde_json::from_str::<serde_json::Value>(&contents)
                .with_context(|| format!("{:?} is not valid JSON", path))?
        }
        None => {
            let mut payload = AlertPayload::new(args.title, args.message);
            payload.status = Some(args.status);
            payload.common_annotations.summary = args.summary;
            serde_json::to_value(payload)?
        }
    };

    info!("📤 Posting alert to {}", args.url);
    let response = reqwest::Client::new()
        .post(&args.url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", args.url))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("relay answered {}: {}", status, text);
    }

    info!("✅ {}: {}", status, text);
    Ok(())
}

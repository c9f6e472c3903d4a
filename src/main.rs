use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use yt_audio_relay_lib::config::{AppConfig, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?.apply(&cli);

    yt_audio_relay_lib::run(config).await
}

pub mod config;
pub mod downloader;
pub mod server;

use anyhow::Context;
use std::sync::Arc;

use config::AppConfig;
use downloader::extractors::{
    CliInfoExtractor, ExtractionStrategy, InfoExtractorOrchestrator, LibraryStrategy,
    ScrapeExtractor,
};
use downloader::headers::{HeaderProvider, RandomHeaderProvider};
use downloader::janitor;
use downloader::relay::StreamRelay;
use downloader::tools::ToolManager;
use server::AppState;

/// Probe tools, wire the strategies and serve until Ctrl-C
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    janitor::ensure_scratch_dir(&config.scratch_dir)
        .await
        .with_context(|| format!("creating scratch dir {}", config.scratch_dir.display()))?;

    let tool = ToolManager::probe(ToolManager::find_ytdlp(config.ytdlp_path.as_deref())).await;

    let headers: Arc<dyn HeaderProvider> = Arc::new(RandomHeaderProvider::new());
    let client = config.http_client()?;

    let extractor_config = config.extractor_config();
    let library = Arc::new(LibraryStrategy::new(headers.clone(), extractor_config.clone()));
    let subprocess = if tool.is_available {
        Some(Arc::new(CliInfoExtractor::new(&tool, headers.clone(), extractor_config.clone()))
            as Arc<dyn ExtractionStrategy>)
    } else {
        None
    };
    let scrape = Arc::new(ScrapeExtractor::new(client.clone(), headers.clone(), extractor_config));

    let extractor = InfoExtractorOrchestrator::with_capability(library.clone(), subprocess, scrape);
    tracing::info!(strategies = ?extractor.order(), "extraction chain ready");

    let relay = StreamRelay::new(config.relay_config(tool.path.clone()), library, client, headers);

    janitor::spawn(
        config.scratch_dir.clone(),
        config.sweep_interval,
        config.temp_max_age,
    );

    let state = AppState::new(extractor, relay, tool, config.environment.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    tracing::info!(
        addr = %config.bind_address,
        environment = %config.environment,
        scratch_dir = %config.scratch_dir.display(),
        "server listening"
    );

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

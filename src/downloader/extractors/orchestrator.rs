// Extraction orchestrator - fixed-order fallback across strategies
//
// Strategy:
// 1. Library (rusty_ytdl)
// 2. yt-dlp subprocess, only when the startup probe found the tool
// 3. Raw watch-page scrape
//
// Sequential only: the next strategy starts after the previous one failed,
// so YouTube never sees duplicate load for one request.

use std::sync::Arc;

use super::traits::ExtractionStrategy;
use crate::downloader::errors::{DownloadError, ErrorKind};
use crate::downloader::models::{Extraction, StrategyKind, VideoId};

/// Orchestrator that walks the strategy list in priority order
pub struct InfoExtractorOrchestrator {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
}

impl InfoExtractorOrchestrator {
    pub fn new(strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Standard chain; the subprocess strategy is left out when the tool is unavailable
    pub fn with_capability(
        library: Arc<dyn ExtractionStrategy>,
        subprocess: Option<Arc<dyn ExtractionStrategy>>,
        scrape: Arc<dyn ExtractionStrategy>,
    ) -> Self {
        let mut strategies = vec![library];
        strategies.extend(subprocess);
        strategies.push(scrape);
        Self::new(strategies)
    }

    /// Strategy order, for the health endpoint and logs
    pub fn order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Try every strategy until one succeeds
    pub async fn extract(&self, video_id: &VideoId) -> Result<Extraction, DownloadError> {
        let mut last: Option<DownloadError> = None;
        let mut attempts = 0;

        for strategy in &self.strategies {
            attempts += 1;
            let kind = strategy.kind();
            tracing::info!(strategy = %kind, %video_id, "trying extraction strategy");

            match strategy.fetch(video_id).await {
                Ok(mut extraction) => {
                    tracing::info!(
                        strategy = %kind,
                        %video_id,
                        candidates = extraction.candidates.len(),
                        "extraction succeeded"
                    );
                    extraction.metadata.source_strategy = kind;
                    return Ok(extraction);
                }
                Err(e) => {
                    tracing::warn!(strategy = %kind, %video_id, kind = ?e.kind(), error = %e, "extraction strategy failed");
                    last = Some(e);
                }
            }
        }

        match last {
            Some(e) => Err(DownloadError::AllStrategiesFailed {
                last_kind: e.kind(),
                last_reason: e.reason(),
                attempts,
            }),
            None => Err(DownloadError::extraction(
                StrategyKind::Library,
                ErrorKind::ToolUnavailable,
                "no extraction strategy configured",
            )),
        }
    }
}

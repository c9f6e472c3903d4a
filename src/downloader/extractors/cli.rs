// CLI InfoExtractor - uses the native `yt-dlp` binary
//
// Metadata comes from `--dump-json`. Audio candidates point at yt-dlp format
// ids; the relay later runs the tool again to write the chosen format into a
// temp file.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::diagnostics::classify;
use super::traits::{ExtractionStrategy, ExtractorConfig};
use crate::downloader::errors::{DownloadError, ErrorKind};
use crate::downloader::headers::HeaderProvider;
use crate::downloader::models::{
    AudioCandidate, Container, Extraction, SourceLocator, StrategyKind, VideoId, VideoMetadata,
};
use crate::downloader::tools::ToolCapability;
use crate::downloader::utils::run_output_with_timeout;

/// CLI-based strategy using the yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: PathBuf,
    headers: Arc<dyn HeaderProvider>,
    config: ExtractorConfig,
}

impl CliInfoExtractor {
    pub fn new(tool: &ToolCapability, headers: Arc<dyn HeaderProvider>, config: ExtractorConfig) -> Self {
        Self {
            ytdlp_path: tool.path.clone(),
            headers,
            config,
        }
    }

    fn fail(kind: ErrorKind, reason: impl Into<String>) -> DownloadError {
        DownloadError::extraction(StrategyKind::Subprocess, kind, reason)
    }

    /// Build command arguments
    fn build_args(&self, video_id: &VideoId) -> Vec<String> {
        let user_agent = self.headers.headers().user_agent;
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.tool_timeout.as_secs().max(1).to_string(),
            "--user-agent".to_string(),
            user_agent,
            video_id.watch_url(),
        ]
    }

    /// Parse JSON output into metadata plus audio candidates
    pub(crate) fn parse_json(stdout: &[u8]) -> Result<Extraction, DownloadError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| Self::fail(ErrorKind::InternalError, format!("Invalid JSON: {}", e)))?;

        let metadata = VideoMetadata {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            author: json["uploader"]
                .as_str()
                .or_else(|| json["channel"].as_str())
                .unwrap_or("Unknown")
                .to_string(),
            duration_seconds: json["duration"].as_f64().unwrap_or(0.0).max(0.0) as u64,
            thumbnail_url: json["thumbnail"].as_str().unwrap_or("").to_string(),
            source_strategy: StrategyKind::Subprocess,
        };

        let mut candidates = Self::parse_formats(&json);
        if candidates.is_empty() {
            // Let yt-dlp pick when the JSON has no explicit audio-only entries
            candidates.push(AudioCandidate {
                container: Container::Unknown,
                codec: None,
                bitrate_kbps: None,
                source_locator: SourceLocator::LocalFile {
                    format_id: "bestaudio".to_string(),
                },
            });
        }

        Ok(Extraction {
            metadata,
            candidates,
        })
    }

    fn parse_formats(json: &serde_json::Value) -> Vec<AudioCandidate> {
        let formats_array = match json["formats"].as_array() {
            Some(f) => f,
            None => return Vec::new(),
        };

        formats_array
            .iter()
            .filter(|f| {
                let vcodec = f["vcodec"].as_str();
                let acodec = f["acodec"].as_str();
                acodec.map_or(false, |a| a != "none") && vcodec.map_or(true, |v| v == "none")
            })
            .filter_map(|f| {
                let format_id = f["format_id"].as_str()?.to_string();
                Some(AudioCandidate {
                    container: Container::from_name(f["ext"].as_str().unwrap_or("")),
                    codec: f["acodec"]
                        .as_str()
                        .map(|a| a.split('.').next().unwrap_or(a).to_string()),
                    bitrate_kbps: f["abr"].as_f64().map(|abr| abr.round() as u32),
                    source_locator: SourceLocator::LocalFile { format_id },
                })
            })
            .collect()
    }
}

#[async_trait]
impl ExtractionStrategy for CliInfoExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Subprocess
    }

    async fn fetch(&self, video_id: &VideoId) -> Result<Extraction, DownloadError> {
        let args = self.build_args(video_id);
        tracing::debug!(tool = %self.ytdlp_path.display(), args = %args.join(" "), "running yt-dlp");

        let output = run_output_with_timeout(&self.ytdlp_path, args, self.config.tool_timeout)
            .await
            .map_err(|e| Self::fail(classify(&e), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Self::fail(classify(&stderr), stderr.trim().to_string()));
        }

        Self::parse_json(&output.stdout)
    }
}

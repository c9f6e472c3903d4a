// ExtractionStrategy trait and common types

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{Extraction, LibraryHandle, StrategyKind, VideoId};

/// Byte stream handed to the HTTP body
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Configuration shared by the strategies
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Bound on a single library metadata call
    pub metadata_timeout: Duration,
    /// Bound on a single yt-dlp metadata run
    pub tool_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(5),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

impl ExtractorConfig {
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }
}

/// One way of obtaining metadata and audio candidates for a video
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Which strategy this is (for logging and result tagging)
    fn kind(&self) -> StrategyKind;

    /// Fetch metadata plus the audio-only candidates.
    ///
    /// Fails with `DownloadError::ExtractionFailed` whose kind was classified
    /// at this boundary.
    async fn fetch(&self, video_id: &VideoId) -> Result<Extraction, DownloadError>;
}

/// Opens the byte stream behind a library handle
#[async_trait]
pub trait LibraryStreamOpener: Send + Sync {
    async fn open_stream(&self, handle: &LibraryHandle) -> Result<ByteStream, DownloadError>;
}

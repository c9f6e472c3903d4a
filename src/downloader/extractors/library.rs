// Library InfoExtractor - uses the rusty_ytdl crate
//
// First strategy in the chain: no subprocess, fast, but the most exposed to
// YouTube's bot checks. Each call gets fresh browser headers and cookies.

use async_trait::async_trait;
use futures::stream;
use rusty_ytdl::{
    RequestOptions, Video, VideoError, VideoFormat, VideoOptions, VideoQuality, VideoSearchOptions,
};
use std::sync::Arc;
use tokio::time::timeout;

use super::diagnostics::classify;
use super::traits::{ByteStream, ExtractionStrategy, ExtractorConfig, LibraryStreamOpener};
use crate::downloader::errors::{DownloadError, ErrorKind};
use crate::downloader::headers::HeaderProvider;
use crate::downloader::models::{
    AudioCandidate, Container, Extraction, LibraryHandle, SourceLocator, StrategyKind, VideoId,
    VideoMetadata,
};

pub struct LibraryStrategy {
    headers: Arc<dyn HeaderProvider>,
    config: ExtractorConfig,
}

impl LibraryStrategy {
    pub fn new(headers: Arc<dyn HeaderProvider>, config: ExtractorConfig) -> Self {
        Self { headers, config }
    }

    fn fail(kind: ErrorKind, reason: impl Into<String>) -> DownloadError {
        DownloadError::extraction(StrategyKind::Library, kind, reason)
    }

    fn from_video_error(err: VideoError) -> DownloadError {
        let text = err.to_string();
        Self::fail(classify(&text), text)
    }

    /// Build library options carrying a fresh set of browser headers.
    /// rusty_ytdl ignores its own cookie option once a client is supplied, so
    /// cookies travel in the client's default headers.
    fn options(&self, filter: VideoSearchOptions) -> Result<VideoOptions, DownloadError> {
        let headers = self.headers.headers();
        let client = reqwest::Client::builder()
            .default_headers(headers.to_header_map())
            .build()
            .map_err(|e| Self::fail(ErrorKind::InternalError, format!("client build: {}", e)))?;

        Ok(VideoOptions {
            quality: VideoQuality::HighestAudio,
            filter,
            request_options: RequestOptions {
                client: Some(client),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

#[async_trait]
impl ExtractionStrategy for LibraryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Library
    }

    async fn fetch(&self, video_id: &VideoId) -> Result<Extraction, DownloadError> {
        let options = self.options(VideoSearchOptions::Audio)?;
        let video = Video::new_with_options(video_id.watch_url(), options)
            .map_err(Self::from_video_error)?;

        let info = timeout(self.config.metadata_timeout, video.get_info())
            .await
            .map_err(|_| {
                Self::fail(
                    ErrorKind::InternalError,
                    format!("metadata timed out after {:?}", self.config.metadata_timeout),
                )
            })?
            .map_err(Self::from_video_error)?;

        let details = &info.video_details;
        if details.age_restricted {
            return Err(Self::fail(
                ErrorKind::AgeOrRegionRestricted,
                "video is age-restricted",
            ));
        }

        let candidates: Vec<AudioCandidate> = info
            .formats
            .iter()
            .filter(|f| f.has_audio && !f.has_video)
            .map(|f| AudioCandidate {
                container: Container::from_name(&f.mime_type.container),
                codec: f.mime_type.audio_codec.clone(),
                bitrate_kbps: f.audio_bitrate.map(|b| b as u32),
                source_locator: SourceLocator::LibraryHandle(LibraryHandle {
                    video_id: video_id.clone(),
                    itag: f.itag,
                }),
            })
            .collect();

        if candidates.is_empty() {
            return Err(Self::fail(
                ErrorKind::NoAudioFormat,
                "library listed no audio-only formats",
            ));
        }

        let metadata = VideoMetadata {
            title: details.title.clone(),
            author: details
                .author
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            duration_seconds: details.length_seconds.parse().unwrap_or(0),
            thumbnail_url: details
                .thumbnails
                .last()
                .map(|t| t.url.clone())
                .unwrap_or_default(),
            source_strategy: StrategyKind::Library,
        };

        Ok(Extraction {
            metadata,
            candidates,
        })
    }
}

#[async_trait]
impl LibraryStreamOpener for LibraryStrategy {
    async fn open_stream(&self, handle: &LibraryHandle) -> Result<ByteStream, DownloadError> {
        let itag = handle.itag;
        let filter = VideoSearchOptions::Custom(Arc::new(move |f: &VideoFormat| f.itag == itag));
        let video = Video::new_with_options(handle.video_id.watch_url(), self.options(filter)?)
            .map_err(Self::from_video_error)?;

        let source = video.stream().await.map_err(Self::from_video_error)?;

        let byte_stream = stream::unfold(Some(source), |state| async move {
            let source = state?;
            match source.chunk().await {
                Ok(Some(bytes)) => Some((Ok(bytes), Some(source))),
                Ok(None) => None,
                Err(e) => Some((
                    Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
                    None,
                )),
            }
        });

        Ok(Box::pin(byte_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::headers::RandomHeaderProvider;

    #[test]
    fn test_options_send_cookies_once() {
        let headers: Arc<dyn HeaderProvider> = Arc::new(RandomHeaderProvider::new());
        assert!(headers.headers().cookies.is_some());

        let strategy = LibraryStrategy::new(headers, ExtractorConfig::default());
        let options = strategy.options(VideoSearchOptions::Audio).unwrap();
        assert!(options.request_options.client.is_some());
        assert!(options.request_options.cookies.is_none());
    }
}

// Raw scrape extractor - reads the player response embedded in the watch page
//
// Last resort. Only formats that carry a plain `url` are usable; entries that
// expose nothing but a signature cipher are declined, since deciphering is
// left to the real extraction tools.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use super::diagnostics::{classify, classify_playability};
use super::traits::{ExtractionStrategy, ExtractorConfig};
use crate::downloader::errors::{DownloadError, ErrorKind};
use crate::downloader::headers::HeaderProvider;
use crate::downloader::models::{
    AudioCandidate, Container, Extraction, SourceLocator, StrategyKind, VideoId, VideoMetadata,
};

lazy_static::lazy_static! {
    static ref PLAYER_RESPONSE_RE: Regex =
        Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\})\s*;\s*(?:var\s|</script>)").unwrap();
    static ref CODECS_RE: Regex = Regex::new(r#"codecs="([^"]+)""#).unwrap();
}

pub struct ScrapeExtractor {
    client: reqwest::Client,
    headers: Arc<dyn HeaderProvider>,
    config: ExtractorConfig,
}

impl ScrapeExtractor {
    pub fn new(client: reqwest::Client, headers: Arc<dyn HeaderProvider>, config: ExtractorConfig) -> Self {
        Self {
            client,
            headers,
            config,
        }
    }

    fn fail(kind: ErrorKind, reason: impl Into<String>) -> DownloadError {
        DownloadError::extraction(StrategyKind::Scrape, kind, reason)
    }

    /// Capture the `ytInitialPlayerResponse` JSON blob from the page HTML
    pub(crate) fn extract_player_response(html: &str) -> Result<serde_json::Value, DownloadError> {
        let raw = PLAYER_RESPONSE_RE
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                let kind = if html.contains("g-recaptcha") || html.contains("unusual traffic") {
                    ErrorKind::BotDetected
                } else {
                    ErrorKind::InternalError
                };
                Self::fail(kind, "ytInitialPlayerResponse not found in page")
            })?;

        serde_json::from_str(raw).map_err(|e| {
            Self::fail(ErrorKind::InternalError, format!("Invalid player response JSON: {}", e))
        })
    }

    /// Turn a player response into metadata plus directly fetchable audio candidates
    pub(crate) fn parse_player_response(json: &serde_json::Value) -> Result<Extraction, DownloadError> {
        let playability = &json["playabilityStatus"];
        let status = playability["status"].as_str().unwrap_or("OK");
        if status != "OK" {
            let reason = playability["reason"].as_str().unwrap_or(status);
            return Err(Self::fail(
                classify_playability(status, reason),
                format!("{}: {}", status, reason),
            ));
        }

        let streaming = &json["streamingData"];
        let entries: Vec<&serde_json::Value> = ["adaptiveFormats", "formats"]
            .iter()
            .filter_map(|key| streaming[*key].as_array())
            .flatten()
            .filter(|f| {
                f["mimeType"]
                    .as_str()
                    .map_or(false, |m| m.starts_with("audio/"))
            })
            .collect();

        if entries.is_empty() {
            return Err(Self::fail(
                ErrorKind::NoAudioFormat,
                "player response lists no audio formats",
            ));
        }

        let candidates: Vec<AudioCandidate> = entries
            .iter()
            .filter_map(|f| {
                let url = f["url"].as_str()?;
                let mime = f["mimeType"].as_str().unwrap_or("");
                let subtype = mime
                    .split(';')
                    .next()
                    .and_then(|m| m.split('/').nth(1))
                    .unwrap_or("");
                let codec = CODECS_RE
                    .captures(mime)
                    .and_then(|c| c.get(1))
                    .map(|c| c.as_str().split(',').next().unwrap_or("").trim().to_string());
                let bits = f["averageBitrate"]
                    .as_u64()
                    .or_else(|| f["bitrate"].as_u64());
                Some(AudioCandidate {
                    container: Container::from_name(subtype),
                    codec: codec.map(|c| c.split('.').next().unwrap_or(&c).to_string()),
                    bitrate_kbps: bits.map(|b| (b / 1000) as u32),
                    source_locator: SourceLocator::DirectUrl(url.to_string()),
                })
            })
            .collect();

        if candidates.is_empty() {
            // Every audio entry is signatureCipher / cipher only
            return Err(Self::fail(
                ErrorKind::CipherUnsupported,
                "only signature-protected audio locators available",
            ));
        }

        let details = &json["videoDetails"];
        let metadata = VideoMetadata {
            title: details["title"].as_str().unwrap_or("Unknown").to_string(),
            author: details["author"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: details["lengthSeconds"]
                .as_str()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            thumbnail_url: details["thumbnail"]["thumbnails"]
                .as_array()
                .and_then(|t| t.last())
                .and_then(|t| t["url"].as_str())
                .unwrap_or("")
                .to_string(),
            source_strategy: StrategyKind::Scrape,
        };

        Ok(Extraction {
            metadata,
            candidates,
        })
    }
}

#[async_trait]
impl ExtractionStrategy for ScrapeExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Scrape
    }

    async fn fetch(&self, video_id: &VideoId) -> Result<Extraction, DownloadError> {
        let response = self
            .client
            .get(video_id.watch_url())
            .headers(self.headers.headers().to_header_map())
            .timeout(self.config.tool_timeout)
            .send()
            .await
            .map_err(|e| {
                let text = e.to_string();
                Self::fail(classify(&text), text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = format!("watch page returned {}", status);
            return Err(Self::fail(classify(&text), text));
        }

        let html = response.text().await.map_err(|e| {
            Self::fail(ErrorKind::InternalError, format!("reading watch page: {}", e))
        })?;

        let json = Self::extract_player_response(&html)?;
        Self::parse_player_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(player: &str) -> String {
        format!(
            "<html><script>var ytInitialPlayerResponse = {};var meta = 1;</script></html>",
            player
        )
    }

    const PLAYER_OK: &str = r#"{
        "playabilityStatus": {"status": "OK"},
        "videoDetails": {
            "title": "Test Song",
            "author": "Tester",
            "lengthSeconds": "212",
            "thumbnail": {"thumbnails": [{"url": "https://i.ytimg.com/small.jpg"}, {"url": "https://i.ytimg.com/big.jpg"}]}
        },
        "streamingData": {
            "formats": [{"itag": 18, "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"", "url": "https://v/18"}],
            "adaptiveFormats": [
                {"itag": 140, "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"", "bitrate": 130000, "url": "https://a/140"},
                {"itag": 251, "mimeType": "audio/webm; codecs=\"opus\"", "averageBitrate": 128000, "url": "https://a/251"},
                {"itag": 250, "mimeType": "audio/webm; codecs=\"opus\"", "bitrate": 70000, "signatureCipher": "s=abc&url=https%3A%2F%2Fa%2F250"}
            ]
        }
    }"#;

    #[test]
    fn test_extract_and_parse_direct_urls() {
        let json = ScrapeExtractor::extract_player_response(&page(PLAYER_OK)).unwrap();
        let extraction = ScrapeExtractor::parse_player_response(&json).unwrap();

        assert_eq!(extraction.metadata.title, "Test Song");
        assert_eq!(extraction.metadata.duration_seconds, 212);
        assert_eq!(extraction.metadata.thumbnail_url, "https://i.ytimg.com/big.jpg");

        // The cipher-only entry and the muxed video entry are skipped
        assert_eq!(extraction.candidates.len(), 2);
        assert_eq!(extraction.candidates[0].container, Container::Mp4);
        assert_eq!(extraction.candidates[0].codec.as_deref(), Some("mp4a"));
        assert_eq!(extraction.candidates[0].bitrate_kbps, Some(130));
        assert!(extraction.candidates[1].is_webm_opus());
        assert_eq!(
            extraction.candidates[1].source_locator,
            SourceLocator::DirectUrl("https://a/251".to_string())
        );
    }

    #[test]
    fn test_cipher_only_is_declined() {
        let player = r#"{
            "playabilityStatus": {"status": "OK"},
            "videoDetails": {"title": "x"},
            "streamingData": {"adaptiveFormats": [
                {"mimeType": "audio/webm; codecs=\"opus\"", "signatureCipher": "s=1&url=x"},
                {"mimeType": "audio/mp4; codecs=\"mp4a.40.2\"", "cipher": "s=2&url=y"}
            ]}
        }"#;
        let json = ScrapeExtractor::extract_player_response(&page(player)).unwrap();
        let err = ScrapeExtractor::parse_player_response(&json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CipherUnsupported);
    }

    #[test]
    fn test_unplayable_video() {
        let player = r#"{"playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}}"#;
        let json = ScrapeExtractor::extract_player_response(&page(player)).unwrap();
        let err = ScrapeExtractor::parse_player_response(&json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VideoUnavailable);
    }

    #[test]
    fn test_missing_blob() {
        let err = ScrapeExtractor::extract_player_response("<html>nothing here</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);

        let err = ScrapeExtractor::extract_player_response("<form class=\"g-recaptcha\"></form>")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BotDetected);
    }
}

// Common data models for extraction and delivery

use serde::Serialize;
use std::fmt;

/// Canonical 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Wraps an already validated token. Use `video_id::parse` for user input.
    pub(crate) fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrategyKind {
    #[serde(rename = "ytdl")]
    Library,
    #[serde(rename = "yt-dlp")]
    Subprocess,
    #[serde(rename = "scrape")]
    Scrape,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Library => "ytdl",
            Self::Subprocess => "yt-dlp",
            Self::Scrape => "scrape",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video information shown to the user and used for the download filename
#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    pub thumbnail_url: String,
    pub source_strategy: StrategyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Webm,
    Mp4,
    Unknown,
}

impl Container {
    /// Maps a container/extension name (`webm`, `mp4`, `m4a`, ...) to a container
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "webm" | "weba" => Self::Webm,
            "mp4" | "m4a" => Self::Mp4,
            _ => Self::Unknown,
        }
    }

    /// File extension used in Content-Disposition
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "m4a",
            Self::Unknown => "audio",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::Mp4 => "audio/mp4",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Handle understood by the extraction library: the video plus the chosen itag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryHandle {
    pub video_id: VideoId,
    pub itag: u64,
}

/// Where the bytes of a candidate come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Opened through the extraction library and piped directly
    LibraryHandle(LibraryHandle),
    /// Plain media URL, fetched and proxied by the server
    DirectUrl(String),
    /// Written to a local temp file by the extraction tool (`-f <format_id>`)
    LocalFile { format_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCandidate {
    pub container: Container,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub source_locator: SourceLocator,
}

impl AudioCandidate {
    pub fn is_webm_opus(&self) -> bool {
        self.container == Container::Webm
            && self
                .codec
                .as_deref()
                .map_or(false, |c| c.eq_ignore_ascii_case("opus"))
    }
}

/// Successful strategy result
#[derive(Debug, Clone)]
pub struct Extraction {
    pub metadata: VideoMetadata,
    pub candidates: Vec<AudioCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    DirectPipe,
    TempFile,
    Proxy,
}

impl Destination {
    pub fn for_locator(locator: &SourceLocator) -> Self {
        match locator {
            SourceLocator::LibraryHandle(_) => Self::DirectPipe,
            SourceLocator::DirectUrl(_) => Self::Proxy,
            SourceLocator::LocalFile { .. } => Self::TempFile,
        }
    }
}

/// One download from format selection until the response body is gone
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub video_id: VideoId,
    pub title: String,
    pub selected: AudioCandidate,
    pub destination: Destination,
}

impl DownloadSession {
    pub fn new(video_id: VideoId, title: String, selected: AudioCandidate) -> Self {
        let destination = Destination::for_locator(&selected.source_locator);
        Self {
            video_id,
            title,
            selected,
            destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_mapping() {
        assert_eq!(Container::from_name("webm"), Container::Webm);
        assert_eq!(Container::from_name("M4A"), Container::Mp4);
        assert_eq!(Container::from_name("opus"), Container::Unknown);
        assert_eq!(Container::Mp4.extension(), "m4a");
        assert_eq!(Container::Webm.content_type(), "audio/webm");
    }

    #[test]
    fn test_destination_follows_locator() {
        let id = VideoId::new_unchecked("abc12345678");
        let handle = SourceLocator::LibraryHandle(LibraryHandle { video_id: id, itag: 251 });
        assert_eq!(Destination::for_locator(&handle), Destination::DirectPipe);
        assert_eq!(
            Destination::for_locator(&SourceLocator::DirectUrl("https://x".into())),
            Destination::Proxy
        );
        assert_eq!(
            Destination::for_locator(&SourceLocator::LocalFile { format_id: "251".into() }),
            Destination::TempFile
        );
    }
}

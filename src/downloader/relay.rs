// StreamRelay - delivers the selected candidate to the HTTP caller
//
// Delivery follows the locator:
// - LibraryHandle -> direct pipe from the library stream
// - LocalFile     -> yt-dlp writes into a scratch file, the file is streamed back
// - DirectUrl     -> upstream GET proxied through, Range included
//
// Nothing is committed to the client until the first byte (or the complete
// temp file) is in hand, so early failures still become JSON errors. Once the
// headers are out, a failure can only abort the body.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use futures::stream::{self, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::io::ReaderStream;

use super::errors::{DownloadError, ErrorKind};
use super::extractors::diagnostics::classify;
use super::extractors::traits::{ByteStream, LibraryStreamOpener};
use super::headers::{HeaderProvider, YOUTUBE_ORIGIN, YOUTUBE_REFERER};
use super::janitor::remove_temp_file_sync;
use super::models::{Destination, DownloadSession, LibraryHandle, SourceLocator, StrategyKind};
use super::utils::{content_disposition, random_file_name, sanitize_title};

const COPY_BUFFER: usize = 64 * 1024;

/// Upstream headers passed through on proxied downloads
const PROXIED_HEADERS: [HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
];

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub ytdlp_path: PathBuf,
    pub scratch_dir: PathBuf,
    /// Longest gap between two chunks before a download counts as stalled
    pub stall_timeout: Duration,
    /// Smallest tool output accepted as a real audio file
    pub min_output_bytes: u64,
}

impl RelayConfig {
    pub fn new(ytdlp_path: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            scratch_dir: scratch_dir.into(),
            stall_timeout: Duration::from_secs(15),
            min_output_bytes: 1,
        }
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn with_min_output_bytes(mut self, min_output_bytes: u64) -> Self {
        self.min_output_bytes = min_output_bytes;
        self
    }
}

/// Deletes the temp file when dropped, whatever happened to the download
struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match remove_temp_file_sync(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "temp file removed"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "temp file removal failed"),
        }
    }
}

pub struct StreamRelay {
    config: RelayConfig,
    library: Arc<dyn LibraryStreamOpener>,
    client: reqwest::Client,
    headers: Arc<dyn HeaderProvider>,
}

impl StreamRelay {
    pub fn new(
        config: RelayConfig,
        library: Arc<dyn LibraryStreamOpener>,
        client: reqwest::Client,
        headers: Arc<dyn HeaderProvider>,
    ) -> Self {
        Self {
            config,
            library,
            client,
            headers,
        }
    }

    /// Deliver the session's candidate. `range` is the client's Range header, if any.
    pub async fn deliver(
        &self,
        session: DownloadSession,
        range: Option<String>,
    ) -> Result<Response, DownloadError> {
        tracing::info!(
            video_id = %session.video_id,
            destination = ?session.destination,
            container = ?session.selected.container,
            bitrate_kbps = ?session.selected.bitrate_kbps,
            "delivering audio"
        );

        let destination = session.destination;
        match (destination, session.selected.source_locator.clone()) {
            (Destination::DirectPipe, SourceLocator::LibraryHandle(handle)) => {
                self.pipe_library(&session, &handle).await
            }
            (Destination::TempFile, SourceLocator::LocalFile { format_id }) => {
                self.buffer_to_temp_file(session, &format_id).await
            }
            (Destination::Proxy, SourceLocator::DirectUrl(url)) => {
                self.proxy_upstream(&session, &url, range).await
            }
            (destination, _) => Err(DownloadError::relay(
                ErrorKind::InternalError,
                format!("destination {:?} does not match the source locator", destination),
            )),
        }
    }

    async fn pipe_library(
        &self,
        session: &DownloadSession,
        handle: &LibraryHandle,
    ) -> Result<Response, DownloadError> {
        let limit = self.config.stall_timeout;
        let source = timeout(limit, self.library.open_stream(handle))
            .await
            .map_err(|_| DownloadError::StreamStalled(limit.as_secs()))??;
        let mut guarded = stall_guarded(source, self.config.stall_timeout);

        // Hold the headers back until the library proves it can produce data
        let first = match guarded.next().await {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return Err(stream_error(e, self.config.stall_timeout)),
            None => {
                return Err(DownloadError::relay(
                    ErrorKind::InternalError,
                    "library stream ended before any data",
                ))
            }
        };

        let body = stream::once(async move { Ok::<_, io::Error>(first) }).chain(guarded);
        audio_response(StatusCode::OK, session, Vec::new(), Body::from_stream(body))
    }

    async fn buffer_to_temp_file(
        &self,
        session: DownloadSession,
        format_id: &str,
    ) -> Result<Response, DownloadError> {
        let extension = session.selected.container.extension();
        let path = self.config.scratch_dir.join(random_file_name(extension));
        // The guard owns the path from here until the body is dropped
        let guard = TempFileGuard::new(path.clone());

        let size = self.run_tool_into(&session, format_id, &path).await?;
        tracing::info!(video_id = %session.video_id, path = %path.display(), size, "temp file ready");

        let file = tokio::fs::File::open(&path).await?;
        // The guard moves into the body stream and goes away with it
        let body = ReaderStream::new(file).map(move |chunk| {
            let _ = &guard;
            chunk
        });

        let length = vec![(header::CONTENT_LENGTH, HeaderValue::from(size))];
        audio_response(StatusCode::OK, &session, length, Body::from_stream(body))
    }

    /// Run `yt-dlp -f <format> -o -` and copy its stdout into `path`. Returns the byte count.
    async fn run_tool_into(
        &self,
        session: &DownloadSession,
        format_id: &str,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        let tool_error = |kind: ErrorKind, reason: String| {
            DownloadError::extraction(StrategyKind::Subprocess, kind, reason)
        };

        let user_agent = self.headers.headers().user_agent;
        let watch_url = session.video_id.watch_url();
        let mut child = Command::new(&self.config.ytdlp_path)
            .args([
                "-f",
                format_id,
                "-o",
                "-",
                "--no-playlist",
                "--no-warnings",
                "--no-part",
                "--user-agent",
                user_agent.as_str(),
                watch_url.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tool_error(
                    ErrorKind::ToolUnavailable,
                    format!("Failed to start {}: {}", self.config.ytdlp_path.display(), e),
                )
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| tool_error(ErrorKind::InternalError, "Failed to capture stdout".into()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| tool_error(ErrorKind::InternalError, "Failed to capture stderr".into()))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        });

        let mut file = tokio::fs::File::create(path).await?;
        // A stall returns early; dropping `child` kills the process
        let written = copy_with_stall(&mut stdout, &mut file, self.config.stall_timeout).await?;
        drop(file);

        let status = timeout(self.config.stall_timeout, child.wait())
            .await
            .map_err(|_| DownloadError::StreamStalled(self.config.stall_timeout.as_secs()))??;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            tracing::warn!(video_id = %session.video_id, %status, stderr = %stderr.trim(), "yt-dlp download failed");
            return Err(tool_error(classify(&stderr), stderr.trim().to_string()));
        }

        if written < self.config.min_output_bytes {
            return Err(tool_error(
                ErrorKind::InternalError,
                format!("undersized output: {} bytes", written),
            ));
        }

        Ok(written)
    }

    async fn proxy_upstream(
        &self,
        session: &DownloadSession,
        url: &str,
        range: Option<String>,
    ) -> Result<Response, DownloadError> {
        let browser = self.headers.headers();
        let mut request = self
            .client
            .get(url)
            .header(header::USER_AGENT, browser.user_agent)
            .header(header::REFERER, YOUTUBE_REFERER)
            .header(header::ORIGIN, YOUTUBE_ORIGIN);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let limit = self.config.stall_timeout;
        let upstream = timeout(limit, request.send())
            .await
            .map_err(|_| DownloadError::StreamStalled(limit.as_secs()))?
            .map_err(|e| {
                let text = e.to_string();
                DownloadError::relay(classify(&text), text)
            })?;

        let status = upstream.status();
        if !status.is_success() {
            let kind = match status.as_u16() {
                403 => ErrorKind::BotDetected,
                429 => ErrorKind::UpstreamRateLimited,
                _ => ErrorKind::InternalError,
            };
            return Err(DownloadError::relay(kind, format!("upstream returned {}", status)));
        }

        let forwarded: Vec<(HeaderName, HeaderValue)> = PROXIED_HEADERS
            .iter()
            .filter_map(|name| {
                upstream
                    .headers()
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();

        let out_status = if status.as_u16() == 206 {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };

        let source: ByteStream = Box::pin(
            upstream
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e))),
        );
        let body = stall_guarded(source, self.config.stall_timeout);
        audio_response(out_status, session, forwarded, Body::from_stream(body))
    }
}

/// Build the audio response. `extra` headers override the defaults.
fn audio_response(
    status: StatusCode,
    session: &DownloadSession,
    extra: Vec<(HeaderName, HeaderValue)>,
    body: Body,
) -> Result<Response, DownloadError> {
    let container = session.selected.container;
    let filename = format!("{}.{}", sanitize_title(&session.title), container.extension());

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, container.content_type())
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(body)
        .map_err(|e| DownloadError::relay(ErrorKind::InternalError, e.to_string()))?;

    for (name, value) in extra {
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}

/// Bound the gap between chunks; a gap longer than `limit` ends the stream with an error
fn stall_guarded(source: ByteStream, limit: Duration) -> ByteStream {
    Box::pin(stream::unfold(Some(source), move |state| async move {
        let mut source = state?;
        match timeout(limit, source.next()).await {
            Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(source))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data for {}ms", limit.as_millis()),
                )),
                None,
            )),
        }
    }))
}

fn stream_error(err: io::Error, limit: Duration) -> DownloadError {
    if err.kind() == io::ErrorKind::TimedOut {
        DownloadError::StreamStalled(limit.as_secs())
    } else {
        let text = err.to_string();
        DownloadError::relay(classify(&text), text)
    }
}

/// Copy until EOF, failing with `StreamStalled` when a single read waits longer than `limit`
pub(crate) async fn copy_with_stall<R, W>(
    reader: &mut R,
    writer: &mut W,
    limit: Duration,
) -> Result<u64, DownloadError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut total = 0u64;
    loop {
        let n = match timeout(limit, reader.read(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => return Err(DownloadError::StreamStalled(limit.as_secs())),
        };
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;
    Ok(total)
}

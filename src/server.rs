// HTTP API
//
// GET  /               landing page
// POST /api/info       metadata for a video
// GET  /api/download   audio stream
// GET  /api/health     liveness plus tool status

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::downloader::errors::DownloadError;
use crate::downloader::extractors::InfoExtractorOrchestrator;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{DownloadSession, StrategyKind};
use crate::downloader::relay::StreamRelay;
use crate::downloader::tools::ToolCapability;
use crate::downloader::video_id;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<InfoExtractorOrchestrator>,
    pub relay: Arc<StreamRelay>,
    pub tool: Arc<ToolCapability>,
    pub environment: String,
}

impl AppState {
    pub fn new(
        extractor: InfoExtractorOrchestrator,
        relay: StreamRelay,
        tool: ToolCapability,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            extractor: Arc::new(extractor),
            relay: Arc::new(relay),
            tool: Arc::new(tool),
            environment: environment.into(),
        }
    }
}

/// Error body sent to clients: `{"error": "<message>"}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Ruta no encontrada",
        }
    }

    /// `/api/info` has no 403: restricted videos are extraction failures there
    fn info_failure(err: DownloadError) -> Self {
        let mut api = Self::from(err);
        if api.status == StatusCode::FORBIDDEN {
            api.status = StatusCode::INTERNAL_SERVER_ERROR;
        }
        api
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        let kind = err.kind();
        // Upstream detail stays in the log
        tracing::warn!(kind = ?kind, error = %err, "request failed");
        Self {
            status: StatusCode::from_u16(kind.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: kind.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    title: String,
    thumbnail: String,
    /// Seconds, as a decimal string
    duration: String,
    author: String,
    video_id: String,
    method: StrategyKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    yt_dlp: bool,
    yt_dlp_version: Option<String>,
    strategies: Vec<StrategyKind>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/info", post(video_info))
        .route("/api/download", get(download_audio))
        .route("/api/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.environment.clone(),
        yt_dlp: state.tool.is_available,
        yt_dlp_version: state.tool.version.clone(),
        strategies: state.extractor.order(),
    })
}

async fn video_info(
    State(state): State<AppState>,
    body: Result<Json<InfoRequest>, JsonRejection>,
) -> ApiResult<Json<InfoResponse>> {
    let raw = body.map(|Json(req)| req.url).unwrap_or_default();
    let video_id = video_id::parse(&raw)?;

    let extraction = state
        .extractor
        .extract(&video_id)
        .await
        .map_err(ApiError::info_failure)?;
    // Same check the download path makes, so info never promises audio it can't deliver
    FormatSelector::select(&extraction.candidates)?;

    let metadata = extraction.metadata;
    tracing::info!(%video_id, title = %metadata.title, method = %metadata.source_strategy, "video info");

    Ok(Json(InfoResponse {
        title: metadata.title,
        thumbnail: metadata.thumbnail_url,
        duration: metadata.duration_seconds.to_string(),
        author: metadata.author,
        video_id: video_id.to_string(),
        method: metadata.source_strategy,
    }))
}

async fn download_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let raw = query.ok().and_then(|Query(q)| q.url).unwrap_or_default();
    let video_id = video_id::parse(&raw)?;
    tracing::info!(url = %raw, %video_id, "download requested");

    let extraction = state.extractor.extract(&video_id).await?;
    let selected = FormatSelector::select(&extraction.candidates)?.clone();
    tracing::info!(
        %video_id,
        container = ?selected.container,
        codec = ?selected.codec,
        bitrate_kbps = ?selected.bitrate_kbps,
        "format selected"
    );

    let session = DownloadSession::new(video_id, extraction.metadata.title, selected);
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(state.relay.deliver(session, range).await?)
}

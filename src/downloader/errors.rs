// Error types for extraction strategies and stream delivery

use serde::Serialize;
use thiserror::Error;

use super::models::StrategyKind;

/// Structured failure kind, computed once where the upstream error is seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Input is not a recognizable YouTube link or ID
    InvalidUrl,

    /// Private, removed or otherwise unavailable video
    VideoUnavailable,

    /// Age gate or geographic restriction
    AgeOrRegionRestricted,

    /// Premium / paid / members-only content
    PremiumOnly,

    /// YouTube challenged the request (captcha, "confirm you're not a bot", 403)
    BotDetected,

    /// Only signature-protected locators were offered and no decoder is available
    CipherUnsupported,

    /// HTTP 429 or similar throttling
    UpstreamRateLimited,

    /// No audio-only format was advertised
    NoAudioFormat,

    /// Extraction tool missing or not runnable
    ToolUnavailable,

    /// Stream stopped producing data for longer than the stall threshold
    StreamStalled,

    /// Anything unmatched
    InternalError,
}

impl ErrorKind {
    /// HTTP status used when this kind reaches the client
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidUrl | Self::NoAudioFormat => 400,
            Self::AgeOrRegionRestricted | Self::PremiumOnly => 403,
            _ => 500,
        }
    }

    /// Localized message shown to the user. Never carries upstream detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "URL de YouTube inválida",
            Self::VideoUnavailable => "El video no está disponible o es privado",
            Self::AgeOrRegionRestricted => {
                "Este video tiene restricciones de edad o de región que impiden su descarga"
            }
            Self::PremiumOnly => "Este video requiere una suscripción y no puede descargarse",
            Self::BotDetected => {
                "Este video tiene restricciones que impiden su descarga. Intente con otro video."
            }
            Self::CipherUnsupported => {
                "El video usa un formato protegido que no se puede descargar en este momento"
            }
            Self::UpstreamRateLimited => {
                "YouTube está limitando las solicitudes. Intente de nuevo en unos minutos."
            }
            Self::NoAudioFormat => "No se encontraron formatos de audio para este video",
            Self::ToolUnavailable => "No hay ningún método de extracción disponible en el servidor",
            Self::StreamStalled => "La descarga se detuvo por falta de datos. Intente de nuevo.",
            Self::InternalError => "Error al procesar el video",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    #[error("invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("{strategy} extraction failed ({kind:?}): {reason}")]
    ExtractionFailed {
        strategy: StrategyKind,
        kind: ErrorKind,
        reason: String,
    },

    #[error("all strategies failed after {attempts} attempt(s), last ({last_kind:?}): {last_reason}")]
    AllStrategiesFailed {
        last_kind: ErrorKind,
        last_reason: String,
        attempts: usize,
    },

    #[error("no audio candidates to choose from")]
    NoAudioCandidates,

    #[error("stream stalled: no data for {0}s")]
    StreamStalled(u64),

    #[error("relay failed ({kind:?}): {reason}")]
    Relay { kind: ErrorKind, reason: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl DownloadError {
    pub fn extraction(strategy: StrategyKind, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            strategy,
            kind,
            reason: reason.into(),
        }
    }

    pub fn relay(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::Relay {
            kind,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::ExtractionFailed { kind, .. } => *kind,
            Self::AllStrategiesFailed { last_kind, .. } => *last_kind,
            Self::NoAudioCandidates => ErrorKind::NoAudioFormat,
            Self::StreamStalled(_) => ErrorKind::StreamStalled,
            Self::Relay { kind, .. } => *kind,
            Self::Io(_) => ErrorKind::InternalError,
        }
    }

    /// Reason text without the wrapping, used when aggregating failures
    pub fn reason(&self) -> String {
        match self {
            Self::ExtractionFailed { reason, .. } => reason.clone(),
            Self::AllStrategiesFailed { last_reason, .. } => last_reason.clone(),
            Self::Relay { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::InvalidUrl.status_code(), 400);
        assert_eq!(ErrorKind::NoAudioFormat.status_code(), 400);
        assert_eq!(ErrorKind::AgeOrRegionRestricted.status_code(), 403);
        assert_eq!(ErrorKind::BotDetected.status_code(), 500);
        assert_eq!(ErrorKind::InternalError.status_code(), 500);
    }

    #[test]
    fn test_kind_of_aggregate_is_last_kind() {
        let err = DownloadError::AllStrategiesFailed {
            last_kind: ErrorKind::CipherUnsupported,
            last_reason: "cipher only".to_string(),
            attempts: 3,
        };
        assert_eq!(err.kind(), ErrorKind::CipherUnsupported);
        assert_eq!(err.reason(), "cipher only");
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = DownloadError::extraction(
            StrategyKind::Subprocess,
            ErrorKind::VideoUnavailable,
            "ERROR: [youtube] abc: Private video. Sign in if you've been granted access",
        );
        assert!(!err.kind().user_message().contains("Sign in"));
    }
}

// yt-dlp discovery and the startup capability probe

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::utils::run_output_with_timeout;

/// Result of probing the extraction tool once at startup
#[derive(Debug, Clone, Serialize)]
pub struct ToolCapability {
    pub path: PathBuf,
    pub version: Option<String>,
    pub is_available: bool,
}

impl ToolCapability {
    pub fn unavailable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            version: None,
            is_available: false,
        }
    }
}

pub struct ToolManager;

impl ToolManager {
    /// Resolve the yt-dlp binary: explicit path first, then common install locations
    pub fn find_ytdlp(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let common_paths = [
            "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
            "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac / pip
            "/usr/bin/yt-dlp",          // System installation
        ];

        for path in common_paths {
            if Path::new(path).exists() {
                return PathBuf::from(path);
            }
        }

        // In PATH, hopefully
        PathBuf::from("yt-dlp")
    }

    /// Run `<tool> --version` once and record whether it works
    pub async fn probe(path: PathBuf) -> ToolCapability {
        match run_output_with_timeout(&path, vec!["--version".to_string()], Duration::from_secs(10))
            .await
        {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                tracing::info!(tool = %path.display(), %version, "yt-dlp available");
                ToolCapability {
                    path,
                    version: Some(version).filter(|v| !v.is_empty()),
                    is_available: true,
                }
            }
            Ok(output) => {
                tracing::warn!(
                    tool = %path.display(),
                    status = %output.status,
                    "yt-dlp version check failed; subprocess strategy disabled"
                );
                ToolCapability::unavailable(path)
            }
            Err(e) => {
                tracing::warn!(tool = %path.display(), error = %e, "yt-dlp not found; subprocess strategy disabled");
                ToolCapability::unavailable(path)
            }
        }
    }
}

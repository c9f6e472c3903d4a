// Helper functions shared by strategies and the relay

use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

lazy_static::lazy_static! {
    static ref FORBIDDEN_RE: Regex = Regex::new(r#"[\\/:*?"<>|]"#).unwrap();
    static ref SPACES_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Run command with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &Path,
    args: Vec<String>,
    limit: Duration,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program.display(), e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program.display()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program.display()))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    match timeout(limit, child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| format!("Failed to wait for {}: {}", program.display(), e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}s", limit.as_secs()))
        }
    }
}

/// Make a video title safe to use as a download filename
pub fn sanitize_title(title: &str) -> String {
    let stripped = FORBIDDEN_RE.replace_all(title, "");
    let collapsed = SPACES_RE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        "audio".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Content-Disposition` value with an ASCII fallback and a UTF-8 variant
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    if ascii == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(filename)
        )
    }
}

/// Collision-free temp file name from 16 OS-random bytes
pub fn random_file_name(extension: &str) -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("{}.{}", hex::encode(bytes), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        let name = sanitize_title("Song: Live/2024?");
        assert_eq!(name, "Song Live2024");
        for c in ['\\', '/', ':', '*', '?', '"', '<', '>', '|'] {
            assert!(!name.contains(c));
        }
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_title("  a   b\t\nc  "), "a b c");
        assert_eq!(sanitize_title("A | B"), "A B");
        assert_eq!(sanitize_title("???"), "audio");
    }

    #[test]
    fn test_content_disposition_ascii_and_unicode() {
        assert_eq!(
            content_disposition("Song Live2024.webm"),
            "attachment; filename=\"Song Live2024.webm\""
        );
        let header = content_disposition("Canción.m4a");
        assert!(header.starts_with("attachment; filename=\"Canci_n.m4a\""));
        assert!(header.contains("filename*=UTF-8''Canci%C3%B3n.m4a"));
    }

    #[test]
    fn test_random_file_names_differ() {
        let a = random_file_name("webm");
        let b = random_file_name("webm");
        assert_ne!(a, b);
        assert_eq!(a.len(), 32 + ".webm".len());
    }

    #[tokio::test]
    async fn test_run_output_missing_program() {
        let err = run_output_with_timeout(
            Path::new("/nonexistent/definitely-not-a-tool"),
            vec!["--version".to_string()],
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert!(err.starts_with("Failed to start"));
    }
}

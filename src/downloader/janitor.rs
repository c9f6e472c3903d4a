// Temp file cleanup
//
// Per-request cleanup is the relay's drop guard, which calls
// `remove_temp_file_sync` when the response body goes away. The background
// sweep catches whatever a crashed or killed request left behind. Both treat a
// missing file as success, so they can race freely.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// Delete a temp file; an already-deleted file is fine
pub async fn remove_temp_file(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Blocking variant for `Drop` impls
pub fn remove_temp_file_sync(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Create the scratch directory if it is missing
pub async fn ensure_scratch_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

/// Delete regular files in `dir` older than `max_age`. Returns how many were removed.
pub async fn sweep(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(m) => m,
            // Removed by a request between read_dir and stat
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if !meta.is_file() {
            continue;
        }

        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        let path = entry.path();
        match remove_temp_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), age_secs = age.as_secs(), "removed stale temp file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove stale temp file");
            }
        }
    }

    Ok(removed)
}

/// Start the periodic sweep. The first tick runs immediately, so leftovers
/// from a previous process are cleaned at startup.
pub fn spawn(dir: PathBuf, interval: Duration, max_age: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep(&dir, max_age).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(dir = %dir.display(), removed = n, "temp sweep finished"),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "temp sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.webm");
        std::fs::write(&path, b"x").unwrap();

        remove_temp_file(&path).await.unwrap();
        assert!(!path.exists());
        remove_temp_file(&path).await.unwrap();
        remove_temp_file_sync(&path).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_respects_max_age() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.webm"), b"a").unwrap();
        std::fs::write(dir.path().join("b.m4a"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        // Everything is fresh
        assert_eq!(sweep(dir.path(), Duration::from_secs(3600)).await.unwrap(), 0);

        // Zero max age: every regular file is stale, directories are left alone
        assert_eq!(sweep(dir.path(), Duration::ZERO).await.unwrap(), 2);
        assert!(dir.path().join("nested").exists());
        assert!(!dir.path().join("a.webm").exists());
    }

    #[tokio::test]
    async fn test_ensure_scratch_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("x").join("y");
        ensure_scratch_dir(&scratch).await.unwrap();
        assert!(scratch.is_dir());
        ensure_scratch_dir(&scratch).await.unwrap();
    }
}

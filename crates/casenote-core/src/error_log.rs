//! Append-only error log shared by the stage runner and batch demux.
//!
//! One log per run directory. Entries are only ever appended, never
//! rewritten, so the log accumulates across re-runs and is the source of
//! truth for which items still need re-driving.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct ErrorLog {
    path: PathBuf,
    // Serializes appends so entries stay contiguous if items ever run
    // concurrently.
    write_lock: Mutex<()>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry: item key, stage or job context, failure detail.
    pub async fn append(&self, key: &str, context: &str, detail: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening error log {}", self.path.display()))?;

        let entry = format!(
            "\n\n--- ERROR {key} [{context}] {ts} ---\n{detail}\n",
            ts = Utc::now().to_rfc3339(),
        );
        file.write_all(entry.as_bytes())
            .await
            .with_context(|| format!("appending to error log {}", self.path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing error log {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_accumulates_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");

        let log = ErrorLog::new(&path);
        log.append("01", "fetch", "yt-dlp exited with 1").await.unwrap();
        drop(log);

        // A second instance (a later run) appends, never truncates.
        let log = ErrorLog::new(&path);
        log.append("02", "transcribe", "whisperx not found")
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("--- ERROR 01 [fetch]"));
        assert!(contents.contains("--- ERROR 02 [transcribe]"));
        assert!(contents.contains("yt-dlp exited with 1"));
    }
}

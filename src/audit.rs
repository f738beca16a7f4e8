//! Append-only text logs of classifications and failures.
//!
//! Writes are best effort: an I/O failure is reported through `tracing` and
//! never reaches the caller.

use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const PREVIEW_CHARS: usize = 50;

#[derive(Debug)]
pub struct AuditLog {
    classification_path: PathBuf,
    error_path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(classification_path: impl Into<PathBuf>, error_path: impl Into<PathBuf>) -> Self {
        Self {
            classification_path: classification_path.into(),
            error_path: error_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates both log files if they do not exist yet.
    pub async fn ensure_files(&self) {
        for path in [&self.classification_path, &self.error_path] {
            self.append(path, "").await;
        }
    }

    pub async fn record_classification(&self, text: &str, ddc_number: &str) {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        let line = format!(
            "[{}] Classified: '{}...' -> DDC: {}\n",
            timestamp(),
            ascii_only(&preview),
            ascii_only(ddc_number)
        );
        self.append(&self.classification_path, &line).await;
    }

    pub async fn record_error(&self, message: &str) {
        let line = format!("[{}] ERROR: {}\n", timestamp(), ascii_only(message));
        self.append(&self.error_path, &line).await;
    }

    async fn append(&self, path: &Path, line: &str) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = try_append(path, line).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write log entry");
        }
    }
}

async fn try_append(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn ascii_only(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

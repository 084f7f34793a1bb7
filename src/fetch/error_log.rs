//! Append-only per-creator error log.
//!
//! Error lines are written as they are observed, not at job end, so partial
//! diagnostics survive a crash mid-job.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::ErrorRecord;

/// Incremental writer for a creator's error log file.
#[derive(Debug)]
pub struct ErrorLog {
    file: File,
    path: PathBuf,
}

impl ErrorLog {
    /// Open (creating as needed) the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be opened for append.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self { file, path })
    }

    /// Path of the underlying log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a timestamped line and flush it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub async fn append(&mut self, record: &ErrorRecord) -> std::io::Result<()> {
        let line = format!("{} {}\n", record.at.to_rfc3339(), record.text);
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_writes_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice_errors.log");

        let mut log = ErrorLog::open(&path).await.unwrap();
        log.append(&ErrorRecord::new("ERROR: first")).await.unwrap();
        log.append(&ErrorRecord::new("ERROR: second"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("ERROR: first"));
        assert!(lines[1].ends_with("ERROR: second"));
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("bob_errors.log");

        let log = ErrorLog::open(&path).await.unwrap();
        assert_eq!(log.path(), path);
        assert!(path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_reopen_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice_errors.log");

        {
            let mut log = ErrorLog::open(&path).await.unwrap();
            log.append(&ErrorRecord::new("ERROR: run one"))
                .await
                .unwrap();
        }
        {
            let mut log = ErrorLog::open(&path).await.unwrap();
            log.append(&ErrorRecord::new("ERROR: run two"))
                .await
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("run one"));
        assert!(content.contains("run two"));
    }
}

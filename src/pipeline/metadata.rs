//! Sidecar metadata parsing and transcode-tool injection.
//!
//! Metadata is injected with a stream copy, never a re-encode. The write
//! goes to a temporary sibling first; the original is removed only after
//! the new file is confirmed non-empty, so a failed injection never leaves
//! zero copies of the media.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

/// Binary name of the external transcode tool.
pub const TRANSCODE_BIN: &str = "ffmpeg";

/// Error type for metadata operations.
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    /// Sidecar file could not be read.
    #[error("Failed to read sidecar {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Sidecar file was not valid JSON.
    #[error("Failed to parse sidecar {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The transcode tool exited unsuccessfully.
    #[error("Transcode tool failed on {path}: {detail}")]
    Transcode { path: PathBuf, detail: String },
    /// The transcode tool reported success but wrote nothing usable.
    #[error("Transcode produced an empty output for {path}")]
    EmptyOutput { path: PathBuf },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The subset of the fetch tool's `.info.json` used for injection.
///
/// Every field is optional; the tool's schema varies by site and version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidecarInfo {
    /// Item title.
    #[serde(default)]
    pub title: Option<String>,
    /// Creator/uploader name.
    #[serde(default)]
    pub uploader: Option<String>,
    /// Upload date as `YYYYMMDD`.
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Item description text.
    #[serde(default)]
    pub description: Option<String>,
}

impl SidecarInfo {
    /// Load and parse a sidecar metadata file.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::Read` or `MetadataError::Parse`.
    pub async fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MetadataError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The `-metadata key=value` pairs to inject, skipping absent fields.
    #[must_use]
    pub fn metadata_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(title) = self.title.as_deref() {
            pairs.push(("title", title));
        }
        if let Some(uploader) = self.uploader.as_deref() {
            pairs.push(("artist", uploader));
        }
        if let Some(date) = self.upload_date.as_deref() {
            pairs.push(("date", date));
        }
        if let Some(description) = self.description.as_deref() {
            pairs.push(("comment", description));
        }
        pairs
    }
}

/// Injects sidecar fields into media files via the transcode tool.
#[derive(Debug, Clone)]
pub struct MetadataInjector {
    binary: String,
}

impl MetadataInjector {
    /// Injector using the default transcode binary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: TRANSCODE_BIN.to_string(),
        }
    }

    /// Injector using a custom binary (for testing).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Inject `info` into `media`, replacing it atomically on success.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError` if the transcode step fails; in that case the
    /// original file is untouched.
    pub async fn inject(&self, media: &Path, info: &SidecarInfo) -> Result<(), MetadataError> {
        let temp = temp_path(media);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-y").arg("-i").arg(media).args(["-c", "copy"]);
        for (key, value) in info.metadata_pairs() {
            cmd.arg("-metadata").arg(format!("{key}={value}"));
        }
        cmd.arg(&temp)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let status = cmd.status().await?;
        if !status.success() {
            remove_if_present(&temp).await;
            return Err(MetadataError::Transcode {
                path: media.to_path_buf(),
                detail: status.to_string(),
            });
        }

        let written = tokio::fs::metadata(&temp).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            remove_if_present(&temp).await;
            return Err(MetadataError::EmptyOutput {
                path: media.to_path_buf(),
            });
        }

        // The replacement exists in full; only now may the original go.
        tokio::fs::remove_file(media).await?;
        tokio::fs::rename(&temp, media).await?;
        Ok(())
    }
}

impl Default for MetadataInjector {
    fn default() -> Self {
        Self::new()
    }
}

/// Temporary sibling path keeping the media extension, so the transcode
/// tool still recognizes the container format.
fn temp_path(media: &Path) -> PathBuf {
    let stem = media
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match media.extension() {
        Some(ext) => format!("{stem}.tmp.{}", ext.to_string_lossy()),
        None => format!("{stem}.tmp"),
    };
    media.with_file_name(name)
}

async fn remove_if_present(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

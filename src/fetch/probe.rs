//! Read-only diagnostic probe for failed jobs.
//!
//! When a fetch fails with critical errors, a second bounded-time invocation
//! asks the tool to enumerate formats without downloading anything. The
//! captured output distinguishes "content exists but the download failed"
//! from "no media detected for this target". A probe that times out or
//! cannot launch is inconclusive, never an error.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::FETCH_BIN;

/// Hard wall-clock bound on one probe invocation.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Markers printed by the format table when at least one format exists.
const FORMAT_MARKERS: &[&str] = &["Available formats", "format code", "FORMAT "];

/// What the probe learned about a failed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFinding {
    /// Formats were enumerable: content exists but the download failed.
    ContentAvailable,
    /// The probe ran but saw no format table: no media detected.
    NoMediaDetected,
    /// Timeout or probe failure; nothing can be concluded.
    Inconclusive,
}

impl ProbeFinding {
    /// Human-readable description for log lines.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::ContentAvailable => "content exists but download failed",
            Self::NoMediaDetected => "no media detected for this target",
            Self::Inconclusive => "probe inconclusive",
        }
    }
}

/// Bounded-time format-enumeration probe.
#[derive(Debug, Clone)]
pub struct DiagnosticProbe {
    binary: String,
    timeout: Duration,
}

impl DiagnosticProbe {
    /// Probe using the default fetch binary and timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: FETCH_BIN.to_string(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Probe using a custom binary (for testing).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the wall-clock bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the probe against `url`, capturing combined output to
    /// `capture_path`. Never fails: every problem folds into
    /// [`ProbeFinding::Inconclusive`] with a log event.
    pub async fn run(&self, url: &str, cookie_file: &Path, capture_path: &Path) -> ProbeFinding {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--list-formats")
            .arg("--cookies")
            .arg(cookie_file)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, "diagnostic probe failed to launch");
                return ProbeFinding::Inconclusive;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = tokio::spawn(read_to_end(stdout));
        let err_task = tokio::spawn(read_to_end(stderr));

        let timed_out = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "diagnostic probe wait failed");
                let _ = child.kill().await;
                true
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "diagnostic probe timed out");
                let _ = child.kill().await;
                true
            }
        };

        // A surviving grandchild can hold the pipes open after the kill;
        // bound the collection rather than waiting for it.
        let drain = Duration::from_secs(2);
        let mut captured = collect_bounded(out_task, drain).await;
        captured.push_str(&collect_bounded(err_task, drain).await);
        if timed_out {
            captured.push_str("\n[probe] terminated before completion\n");
        }

        if let Err(e) = write_capture(capture_path, &captured).await {
            tracing::warn!(path = %capture_path.display(), error = %e, "failed to write probe capture");
        }

        if timed_out {
            return ProbeFinding::Inconclusive;
        }
        inspect(&captured)
    }
}

impl Default for DiagnosticProbe {
    fn default() -> Self {
        Self::new()
    }
}

async fn collect_bounded(mut task: tokio::task::JoinHandle<String>, bound: Duration) -> String {
    match tokio::time::timeout(bound, &mut task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

async fn read_to_end<R: tokio::io::AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn write_capture(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await
}

/// Decide what a completed probe's output says about the target.
#[must_use]
pub fn inspect(captured: &str) -> ProbeFinding {
    if FORMAT_MARKERS
        .iter()
        .any(|marker| captured.contains(marker))
    {
        ProbeFinding::ContentAvailable
    } else {
        ProbeFinding::NoMediaDetected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_detects_format_table() {
        let captured = "[info] Available formats for abc123:\nID EXT RESOLUTION\n22 mp4 1280x720";
        assert_eq!(inspect(captured), ProbeFinding::ContentAvailable);
    }

    #[test]
    fn test_inspect_no_formats() {
        let captured = "ERROR: No supported media found in this post";
        assert_eq!(inspect(captured), ProbeFinding::NoMediaDetected);
    }

    #[test]
    fn test_finding_descriptions() {
        assert_eq!(
            ProbeFinding::ContentAvailable.describe(),
            "content exists but download failed"
        );
        assert_eq!(
            ProbeFinding::NoMediaDetected.describe(),
            "no media detected for this target"
        );
        assert_eq!(ProbeFinding::Inconclusive.describe(), "probe inconclusive");
    }

    #[tokio::test]
    async fn test_probe_launch_failure_is_inconclusive() {
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("probe.log");
        let probe = DiagnosticProbe::with_binary("definitely-not-a-real-binary-xyz");

        let finding = probe
            .run("https://example.com", Path::new("/nonexistent"), &capture)
            .await;
        assert_eq!(finding, ProbeFinding::Inconclusive);
    }

    #[tokio::test]
    async fn test_probe_captures_output() {
        // `echo` prints its arguments and exits 0; the capture file must
        // hold them, and no format marker means no media detected.
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("probe.log");
        let probe = DiagnosticProbe::with_binary("echo");

        let finding = probe
            .run(
                "https://example.com/alice/posts",
                Path::new("/config/cookies.txt"),
                &capture,
            )
            .await;

        assert_eq!(finding, ProbeFinding::NoMediaDetected);
        let captured = std::fs::read_to_string(&capture).unwrap();
        assert!(captured.contains("https://example.com/alice/posts"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_timeout_is_inconclusive() {
        use std::os::unix::fs::PermissionsExt;

        // A stub that ignores its arguments and hangs past the timeout.
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("hang.sh");
        std::fs::write(&stub, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let capture = dir.path().join("probe.log");
        let probe = DiagnosticProbe::with_binary(stub.to_string_lossy())
            .with_timeout(Duration::from_millis(200));

        let finding = probe
            .run("ignored", Path::new("/nonexistent"), &capture)
            .await;
        assert_eq!(finding, ProbeFinding::Inconclusive);
        let captured = std::fs::read_to_string(&capture).unwrap();
        assert!(captured.contains("terminated before completion"));
    }
}

//! Fetch tool compatibility probe.
//!
//! Checks which optional flags the installed fetch tool supports by
//! inspecting its `--help` output, and writes a JSON report. The outcome
//! classifier's string heuristics assume the tool's current wording; this
//! probe is the operational check for drift after a tool upgrade.

use std::path::Path;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;

use crate::fetch::FETCH_BIN;

/// Optional flags whose availability varies across tool versions.
pub const CHECKED_OPTIONS: &[&str] = &[
    "--force-progress",
    "--no-extract-audio",
    "--extract-audio",
    "--no-progress-template",
    "--progress-template",
    "--add-header",
];

/// Compatibility findings for one installed tool version.
#[derive(Debug, Clone, Serialize)]
pub struct CompatReport {
    /// Tool version string, or `"unknown"`.
    pub version: String,
    /// Checked options present in the help text.
    pub supported_options: Vec<String>,
    /// Checked options absent from the help text.
    pub unsupported_options: Vec<String>,
}

/// Queries the installed fetch tool for version and option support.
#[derive(Debug, Clone)]
pub struct CompatChecker {
    binary: String,
}

impl CompatChecker {
    /// Checker for the default fetch binary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: FETCH_BIN.to_string(),
        }
    }

    /// Checker for a custom binary (for testing).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Installed tool version, or `"unknown"` if it cannot be determined.
    pub async fn version(&self) -> String {
        match self.capture(&["--version"]).await {
            Some(output) if !output.trim().is_empty() => output.trim().to_string(),
            _ => {
                tracing::warn!(binary = %self.binary, "could not determine fetch tool version");
                "unknown".to_string()
            }
        }
    }

    /// Full help text, or empty if the tool cannot be run.
    pub async fn help_text(&self) -> String {
        match self.capture(&["--help"]).await {
            Some(output) => output,
            None => {
                tracing::error!(binary = %self.binary, "could not read fetch tool help output");
                String::new()
            }
        }
    }

    /// Run the full compatibility check.
    pub async fn check(&self) -> CompatReport {
        let version = self.version().await;
        tracing::info!(version = %version, "checking fetch tool compatibility");

        let help = self.help_text().await;
        let mut supported = Vec::new();
        let mut unsupported = Vec::new();
        for option in CHECKED_OPTIONS {
            if option_supported(&help, option) {
                tracing::info!(option = option, "option is supported");
                supported.push((*option).to_string());
            } else {
                tracing::warn!(option = option, "option is NOT supported");
                unsupported.push((*option).to_string());
            }
        }

        CompatReport {
            version,
            supported_options: supported,
            unsupported_options: unsupported,
        }
    }

    async fn capture(&self, args: &[&str]) -> Option<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for CompatChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the help text mentions an option.
#[must_use]
pub fn option_supported(help_text: &str, option: &str) -> bool {
    help_text.contains(option)
}

/// Recommended invocation skeleton given a compatibility report.
#[must_use]
pub fn recommended_args(report: &CompatReport, referer: &str) -> Vec<String> {
    let mut args = vec![
        "--cookies".to_string(),
        "COOKIES_FILE".to_string(),
        "--download-archive".to_string(),
        "ARCHIVE_FILE".to_string(),
    ];
    for option in &report.supported_options {
        match option.as_str() {
            "--add-header" => {
                args.push("--add-header".to_string());
                args.push(format!("Referer:{referer}"));
            }
            // Progress templates need matched values; leave them to the
            // supervisor's own command builder.
            "--progress-template" | "--no-progress-template" => {}
            other => args.push(other.to_string()),
        }
    }
    args
}

/// Write a report as pretty JSON.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized or written.
pub async fn write_report(report: &CompatReport, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    tracing::info!(path = %path.display(), "compatibility report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> CompatReport {
        CompatReport {
            version: "2026.08.01".to_string(),
            supported_options: vec![
                "--force-progress".to_string(),
                "--add-header".to_string(),
                "--progress-template".to_string(),
            ],
            unsupported_options: vec!["--no-extract-audio".to_string()],
        }
    }

    #[test]
    fn test_option_supported() {
        let help = "--add-header FIELD:VALUE  Specify a custom HTTP header\n--extract-audio";
        assert!(option_supported(help, "--add-header"));
        assert!(option_supported(help, "--extract-audio"));
        assert!(!option_supported(help, "--force-progress"));
    }

    #[test]
    fn test_recommended_args_expands_header_and_skips_templates() {
        let args = recommended_args(&sample_report(), "https://www.patreon.com");
        assert!(args.contains(&"--force-progress".to_string()));
        assert!(args.contains(&"Referer:https://www.patreon.com".to_string()));
        assert!(!args.contains(&"--progress-template".to_string()));
        assert_eq!(args[0], "--cookies");
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_string_pretty(&sample_report()).unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("--force-progress"));
    }

    #[tokio::test]
    async fn test_version_unknown_for_missing_binary() {
        let checker = CompatChecker::with_binary("definitely-not-a-real-binary-xyz");
        assert_eq!(checker.version().await, "unknown");
        assert!(checker.help_text().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("compat.json");
        write_report(&sample_report(), &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("2026.08.01"));
    }
}

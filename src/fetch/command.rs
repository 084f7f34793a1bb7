//! Fetch tool process spawning and control.
//!
//! This module provides a builder for the fetch tool's argument vector,
//! a launcher seam so tests can substitute a stub, and control methods for
//! the running process.

use std::borrow::Cow;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Binary name of the external fetch tool.
pub const FETCH_BIN: &str = "yt-dlp";

/// Best available video+audio, merged when delivered separately.
const FORMAT_SELECTION: &str = "bestvideo*+bestaudio/best";

/// Container used when merging separate streams.
const MERGE_FORMAT: &str = "mp4";

/// Progress template keeping each update on its own line.
const PROGRESS_TEMPLATE: &str =
    "[download] %(progress._percent_str)s of %(progress._total_bytes_str)s at %(progress._speed_str)s ETA %(progress._eta_str)s";

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Fetch binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder for one job's fetch tool argument vector.
///
/// Defaults come first and the job's extra arguments last, so extras can
/// override any default flag.
#[derive(Debug, Clone, Default)]
pub struct FetchCommandBuilder {
    url: String,
    cookie_file: PathBuf,
    archive_file: PathBuf,
    output_template: String,
    date_after: Option<String>,
    referer: Option<String>,
    max_downloads: Option<u32>,
    extra_args: Vec<String>,
}

impl FetchCommandBuilder {
    /// Create a new builder for the given target URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the cookie file passed for authenticated fetches.
    #[must_use]
    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = path.into();
        self
    }

    /// Set the append-only download archive ledger.
    #[must_use]
    pub fn archive_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_file = path.into();
        self
    }

    /// Set the output path template.
    #[must_use]
    pub fn output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = template.into();
        self
    }

    /// Set the `YYYYMMDD` cutoff; older posts are skipped.
    #[must_use]
    pub fn date_after(mut self, date: impl Into<String>) -> Self {
        self.date_after = Some(date.into());
        self
    }

    /// Set the referer header sent with every request.
    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Cap the number of downloads for this invocation.
    #[must_use]
    pub fn max_downloads(mut self, cap: u32) -> Self {
        self.max_downloads = Some(cap);
        self
    }

    /// Append job-specific arguments after all defaults.
    #[must_use]
    pub fn extra_args(mut self, args: &[String]) -> Self {
        self.extra_args.extend_from_slice(args);
        self
    }

    /// Get the target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--cookies".to_string(),
            self.cookie_file.to_string_lossy().into_owned(),
            "--download-archive".to_string(),
            self.archive_file.to_string_lossy().into_owned(),
            "-o".to_string(),
            self.output_template.clone(),
            "--format".to_string(),
            FORMAT_SELECTION.to_string(),
            "--merge-output-format".to_string(),
            MERGE_FORMAT.to_string(),
            "--write-info-json".to_string(),
            "--write-description".to_string(),
            "--write-thumbnail".to_string(),
            "--restrict-filenames".to_string(),
            "--progress".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--ignore-errors".to_string(),
            "--geo-bypass".to_string(),
            "--no-overwrites".to_string(),
            "--no-playlist".to_string(),
        ];

        if let Some(date) = &self.date_after {
            args.push("--dateafter".to_string());
            args.push(date.clone());
        }

        if let Some(referer) = &self.referer {
            args.push("--add-header".to_string());
            args.push(format!("Referer:{referer}"));
        }

        if let Some(cap) = self.max_downloads {
            args.push("--max-downloads".to_string());
            args.push(cap.to_string());
        }

        args.push(self.url.clone());
        args.extend(self.extra_args.iter().cloned());

        args
    }

    /// Shell-escaped command line for logging and dry runs.
    #[must_use]
    pub fn command_line(&self, binary: &str) -> String {
        std::iter::once(binary.to_string())
            .chain(self.build_args())
            .map(|arg| shell_escape::escape(Cow::from(arg)).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Seam for launching the fetch tool, stubbed out in tests.
pub trait Launcher {
    /// Spawn the fetch tool for the given command.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    fn launch(&self, builder: &FetchCommandBuilder) -> Result<FetchProcess, SpawnError>;
}

/// Launcher spawning the real fetch binary.
#[derive(Debug, Clone)]
pub struct FetchLauncher {
    binary: String,
}

impl FetchLauncher {
    /// Launcher for the default binary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: FETCH_BIN.to_string(),
        }
    }

    /// Launcher for a custom binary (for testing).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The binary this launcher spawns.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for FetchLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for FetchLauncher {
    fn launch(&self, builder: &FetchCommandBuilder) -> Result<FetchProcess, SpawnError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(builder.build_args());
        FetchProcess::spawn(cmd)
    }
}

/// A running fetch tool process.
#[derive(Debug)]
pub struct FetchProcess {
    child: Child,
}

impl FetchProcess {
    /// Spawn a command with stdout and stderr piped.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(mut cmd: Command) -> Result<Self, SpawnError> {
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());
        let child = cmd.spawn().map_err(SpawnError::from_io)?;
        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);

            let wait_result = tokio::time::timeout(timeout, self.child.wait()).await;

            match wait_result {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    // Timeout elapsed, force kill
                    self.child.kill().await
                }
            }
        } else {
            // Process already exited
            Ok(())
        }
    }
}

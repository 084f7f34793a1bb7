//! Per-job fetch supervision.
//!
//! This module provides the orchestration layer for a single creator job:
//! precondition checks, process launch, the cooperative output-polling loop
//! with classification and throttling, outcome classification, and the
//! diagnostic fallback on failure.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ArchiverConfig, CreatorJob};
use crate::fetch::{
    classify, classify_outcome, Diagnosis, DiagnosticProbe, ErrorLog, ErrorRecord,
    FetchCommandBuilder, Launcher, LineEvent, LineReader, Outcome, ProgressThrottle,
};

/// Cadence of the cooperative output-polling loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on draining leftover output after process exit.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Short wait for the low-volume stderr stream each cycle.
const STDERR_POLL: Duration = Duration::from_millis(10);

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// Process stderr was not available.
    #[error("Process stderr not available")]
    NoStderr,
    /// I/O failure while driving the process.
    #[error("I/O error while supervising fetch: {0}")]
    Io(#[from] std::io::Error),
}

/// Supervisor for one external fetch process per creator job.
pub struct FetchSupervisor<L> {
    config: ArchiverConfig,
    launcher: L,
    probe: DiagnosticProbe,
    cancel: Option<CancellationToken>,
}

impl<L: Launcher> FetchSupervisor<L> {
    /// Create a supervisor over the given launcher.
    #[must_use]
    pub fn new(config: ArchiverConfig, launcher: L) -> Self {
        Self {
            config,
            launcher,
            probe: DiagnosticProbe::new(),
            cancel: None,
        }
    }

    /// Replace the diagnostic probe (for testing).
    #[must_use]
    pub fn with_probe(mut self, probe: DiagnosticProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Set a cancellation token checked between polls.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Check if this supervisor has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Materialize the fetch command for one job.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL does not parse.
    pub fn command_for(&self, job: &CreatorJob) -> Result<FetchCommandBuilder, url::ParseError> {
        let url = self.config.creator_url(job)?;
        let cutoff = chrono::Local::now() - chrono::Duration::days(i64::from(job.days_back));

        Ok(FetchCommandBuilder::new(url.to_string())
            .cookie_file(&self.config.cookie_file)
            .archive_file(&self.config.archive_file)
            .output_template(self.config.output_template(job))
            .date_after(cutoff.format("%Y%m%d").to_string())
            .referer(self.config.base_url.clone())
            .max_downloads(self.config.max_downloads)
            .extra_args(&job.extra_args))
    }

    /// Run one job to completion and classify its outcome.
    ///
    /// Precondition failures and launch failures are outcomes, not errors;
    /// `Err` is reserved for I/O faults while driving a live process.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError` if the process pipes are unavailable or an
    /// I/O fault occurs in the polling loop.
    pub async fn run(&self, job: &CreatorJob) -> Result<Outcome, SupervisorError> {
        if let Some(diagnosis) = check_preconditions(&self.config.cookie_file, &self.config.archive_file) {
            tracing::error!(
                creator = %job.name,
                diagnosis = %diagnosis,
                hint = diagnosis.remediation(),
                "precondition failed, fetch not launched"
            );
            return Ok(Outcome::Failed { diagnosis });
        }

        let builder = match self.command_for(job) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::error!(creator = %job.name, error = %e, "invalid target URL");
                return Ok(Outcome::Failed {
                    diagnosis: Diagnosis::Launch,
                });
            }
        };

        tracing::info!(
            creator = %job.name,
            days_back = job.days_back,
            "starting fetch"
        );
        tracing::debug!(command = %builder.command_line(crate::fetch::FETCH_BIN), "fetch command");

        let mut errlog = ErrorLog::open(self.config.error_log_path(job)).await?;

        let mut process = match self.launcher.launch(&builder) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(creator = %job.name, error = %e, "failed to launch fetch tool");
                let record = ErrorRecord::new(format!("launch failed: {e}"));
                if let Err(log_err) = errlog.append(&record).await {
                    tracing::warn!(error = %log_err, "failed to append to error log");
                }
                return Ok(Outcome::Failed {
                    diagnosis: Diagnosis::Launch,
                });
            }
        };

        let stdout = process.take_stdout().ok_or(SupervisorError::NoStdout)?;
        let stderr = process.take_stderr().ok_or(SupervisorError::NoStderr)?;
        let mut out_reader = LineReader::new(stdout);
        let mut err_reader = LineReader::new(stderr);
        let mut throttle = ProgressThrottle::default();
        let mut records: Vec<ErrorRecord> = Vec::new();
        let mut cancelled = false;

        let status = loop {
            if !cancelled && self.is_cancelled() {
                cancelled = true;
                tracing::info!(creator = %job.name, "cancellation requested, terminating fetch");
                process.graceful_terminate(DEFAULT_TERMINATE_TIMEOUT).await?;
            }

            let polled = out_reader.poll(POLL_INTERVAL).await?;
            for line in polled.lines {
                handle_line(&job.name, &line, &mut throttle, &mut records, &mut errlog).await;
            }

            let polled = err_reader.poll(STDERR_POLL).await?;
            for line in polled.lines {
                handle_line(&job.name, &line, &mut throttle, &mut records, &mut errlog).await;
            }

            if let Some(status) = process.try_wait()? {
                break status;
            }
        };

        // The process is gone; flush whatever is still buffered in the pipes
        // through the same classification path.
        for line in out_reader.drain(DRAIN_DEADLINE).await? {
            handle_line(&job.name, &line, &mut throttle, &mut records, &mut errlog).await;
        }
        for line in err_reader.drain(DRAIN_DEADLINE).await? {
            handle_line(&job.name, &line, &mut throttle, &mut records, &mut errlog).await;
        }

        let outcome = classify_outcome(status.code(), &records);
        match &outcome {
            Outcome::Success => {
                tracing::info!(creator = %job.name, "fetch completed");
            }
            Outcome::DegradedBenign { benign } => {
                tracing::info!(
                    creator = %job.name,
                    benign = benign,
                    "fetch completed; some posts had no downloadable media"
                );
            }
            Outcome::Failed { diagnosis } => {
                tracing::error!(
                    creator = %job.name,
                    exit_code = ?status.code(),
                    errors = records.len(),
                    diagnosis = %diagnosis,
                    hint = diagnosis.remediation(),
                    "fetch failed"
                );
            }
        }

        if let Outcome::Failed { diagnosis } = &outcome {
            if cancelled {
                tracing::debug!(creator = %job.name, "skipping probe after cancellation");
            } else {
                let finding = self
                    .probe
                    .run(
                        builder.url(),
                        &self.config.cookie_file,
                        &self.config.probe_log_path(job),
                    )
                    .await;
                tracing::warn!(
                    creator = %job.name,
                    diagnosis = %diagnosis,
                    finding = finding.describe(),
                    capture = %self.config.probe_log_path(job).display(),
                    "diagnostic probe finished"
                );
            }
        }

        Ok(outcome)
    }
}

/// Validate what must hold before launching the fetch tool.
///
/// Returns the diagnosis for the first violated precondition, if any.
#[must_use]
pub fn check_preconditions(cookie_file: &Path, archive_file: &Path) -> Option<Diagnosis> {
    match std::fs::metadata(cookie_file) {
        Err(_) => return Some(Diagnosis::CookiesMissing),
        Ok(meta) if meta.len() == 0 => return Some(Diagnosis::CookiesEmpty),
        Ok(_) => {}
    }

    if let Some(parent) = archive_file.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return Some(Diagnosis::LedgerUnwritable);
        }
    }
    let writable = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(archive_file)
        .is_ok();
    if !writable {
        return Some(Diagnosis::LedgerUnwritable);
    }

    None
}

/// Classify one line and route it to the log, throttle, and error records.
async fn handle_line(
    creator: &str,
    line: &str,
    throttle: &mut ProgressThrottle,
    records: &mut Vec<ErrorRecord>,
    errlog: &mut ErrorLog,
) {
    match classify(line) {
        LineEvent::Progress { percent, raw } => {
            if throttle.allow() {
                tracing::info!(creator = %creator, percent = percent, "{raw}");
            }
        }
        LineEvent::Info(text) => {
            tracing::info!(creator = %creator, "{text}");
        }
        LineEvent::ErrorOrWarning(text) => {
            tracing::warn!(creator = %creator, "{text}");
            let record = ErrorRecord::new(text);
            if let Err(e) = errlog.append(&record).await {
                tracing::warn!(creator = %creator, error = %e, "failed to append to error log");
            }
            records.push(record);
        }
        LineEvent::Debug(text) => {
            if !text.is_empty() {
                tracing::debug!(creator = %creator, "{text}");
            }
        }
    }
}

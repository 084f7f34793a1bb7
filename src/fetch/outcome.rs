//! Job outcome classification from exit status and accumulated error lines.
//!
//! The benign-vs-critical partition and the diagnosis table are string
//! heuristics over fetch tool output. They track the tool's current wording
//! and can drift across tool versions; the `check` subcommand exists to
//! surface that drift. Patterns live in the two tables below so priority
//! order stays explicit and testable.

use chrono::{DateTime, Utc};

/// One error or warning line captured during a fetch run.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// The diagnostic line as emitted by the tool.
    pub text: String,
    /// When the line was observed.
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    /// Record a line observed now.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Final verdict for one creator job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The fetch tool exited cleanly.
    Success,
    /// Non-zero exit, but every error line was benign. This is the expected
    /// case for text-only posts with no attachments.
    DegradedBenign {
        /// Number of benign error lines observed.
        benign: usize,
    },
    /// Non-zero exit with at least one critical error line, or a failed
    /// precondition before launch.
    Failed {
        /// Best-effort cause, driving the remediation hint.
        diagnosis: Diagnosis,
    },
}

impl Outcome {
    /// Whether post-processing may run for this outcome.
    #[must_use]
    pub fn allows_pipeline(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Best-effort cause of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    /// Authentication rejected or session expired.
    Auth,
    /// Access forbidden (membership tier, region, takedown).
    Forbidden,
    /// Target no longer exists.
    NotFound,
    /// The extractor no longer understands the site.
    ExtractorBroken,
    /// Cookie file missing before launch.
    CookiesMissing,
    /// Cookie file present but empty before launch.
    CookiesEmpty,
    /// Archive ledger could not be opened for append before launch.
    LedgerUnwritable,
    /// The fetch tool itself could not be spawned.
    Launch,
    /// Nothing in the captured output matched a known cause.
    Unknown,
}

impl Diagnosis {
    /// Stable tag logged verbatim in error reports.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ExtractorBroken => "extractor_broken",
            Self::CookiesMissing => "cookies_missing",
            Self::CookiesEmpty => "cookies_empty",
            Self::LedgerUnwritable => "ledger_unwritable",
            Self::Launch => "launch",
            Self::Unknown => "unknown",
        }
    }

    /// Actionable hint surfaced alongside the failure.
    #[must_use]
    pub fn remediation(self) -> &'static str {
        match self {
            Self::Auth => "refresh the cookie file from a logged-in browser session",
            Self::Forbidden => "check the account still has access to this creator",
            Self::NotFound => "the content may have been removed; verify the creator name",
            Self::ExtractorBroken => "update the fetch tool; the site layout may have changed",
            Self::CookiesMissing => "no cookie file found at the configured path",
            Self::CookiesEmpty => "the cookie file is empty; export it again",
            Self::LedgerUnwritable => "check permissions on the archive ledger path",
            Self::Launch => "verify the fetch tool is installed and on PATH",
            Self::Unknown => "inspect the error log and probe capture for details",
        }
    }
}

impl std::fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Markers identifying a benign failure line.
const BENIGN_MARKERS: &[&str] = &["no supported media found in this post"];

/// (marker, diagnosis) pairs checked in order; first match wins.
const DIAGNOSIS_RULES: &[(&str, Diagnosis)] = &[
    ("login", Diagnosis::Auth),
    ("authentication", Diagnosis::Auth),
    ("cookies", Diagnosis::Auth),
    ("401", Diagnosis::Auth),
    ("403", Diagnosis::Forbidden),
    ("forbidden", Diagnosis::Forbidden),
    ("404", Diagnosis::NotFound),
    ("not found", Diagnosis::NotFound),
    ("no longer available", Diagnosis::NotFound),
    ("unable to extract", Diagnosis::ExtractorBroken),
    ("unsupported url", Diagnosis::ExtractorBroken),
];

/// Whether an error line indicates absence of media rather than a fault.
#[must_use]
pub fn is_benign(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    BENIGN_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Pick a diagnosis for a set of critical error lines.
///
/// Rules are tried in table order; the first rule matching any line wins.
#[must_use]
pub fn diagnose(critical: &[&ErrorRecord]) -> Diagnosis {
    for (marker, diagnosis) in DIAGNOSIS_RULES {
        if critical
            .iter()
            .any(|record| record.text.to_ascii_lowercase().contains(marker))
        {
            return *diagnosis;
        }
    }
    Diagnosis::Unknown
}

/// Classify a finished job from its exit code and captured error lines.
///
/// A `None` exit code (killed by signal) is treated as failure.
#[must_use]
pub fn classify_outcome(exit_code: Option<i32>, records: &[ErrorRecord]) -> Outcome {
    if exit_code == Some(0) {
        return Outcome::Success;
    }

    let (benign, critical): (Vec<&ErrorRecord>, Vec<&ErrorRecord>) =
        records.iter().partition(|record| is_benign(&record.text));

    if critical.is_empty() && !benign.is_empty() {
        return Outcome::DegradedBenign {
            benign: benign.len(),
        };
    }

    Outcome::Failed {
        diagnosis: diagnose(critical.as_slice()),
    }
}

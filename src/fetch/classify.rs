//! Line classification for fetch tool output.
//!
//! The fetch tool mixes progress updates, informational notices, and error
//! diagnostics on the same pipes. Classification is total: every line maps
//! to exactly one category, with error detection taking priority so that a
//! progress-prefixed error line is never mistaken for progress.

/// Semantic category of one output line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// A download progress update carrying a percentage.
    Progress {
        /// Percent complete, parsed from the line.
        percent: f64,
        /// The raw line, including throughput text.
        raw: String,
    },
    /// An informational notice (destinations, skips, page fetches).
    Info(String),
    /// An error or warning diagnostic.
    ErrorOrWarning(String),
    /// Anything else; logged at debug verbosity only.
    Debug(String),
}

const DOWNLOAD_MARKER: &str = "[download]";
const INFO_MARKER: &str = "[info]";
const PAGE_MARKER: &str = "Downloading page";

/// Classify one raw output line.
#[must_use]
pub fn classify(line: &str) -> LineEvent {
    let line = line.trim();

    if is_error_or_warning(line) {
        return LineEvent::ErrorOrWarning(line.to_string());
    }

    if line.starts_with(DOWNLOAD_MARKER) {
        if let Some(percent) = first_percent(line) {
            return LineEvent::Progress {
                percent,
                raw: line.to_string(),
            };
        }
        // Destination/skip/resume notices share the progress prefix but
        // carry no percentage; they are forwarded without throttling.
        return LineEvent::Info(line.to_string());
    }

    if line.contains(INFO_MARKER) || line.contains(PAGE_MARKER) {
        return LineEvent::Info(line.to_string());
    }

    LineEvent::Debug(line.to_string())
}

/// Case-insensitive check for an `error:` or `warning:` marker.
fn is_error_or_warning(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("error:") || lower.contains("warning:")
}

/// First decimal number immediately followed by `%`, if any.
fn first_percent(line: &str) -> Option<f64> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'%' {
            continue;
        }
        let mut start = i;
        while start > 0 && (bytes[start - 1].is_ascii_digit() || bytes[start - 1] == b'.') {
            start -= 1;
        }
        if start == i {
            continue;
        }
        if let Ok(value) = line[start..i].parse::<f64>() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let event = classify("[download]  42.3% of 120.00MiB at 2.50MiB/s ETA 00:30");
        match event {
            LineEvent::Progress { percent, raw } => {
                assert!((percent - 42.3).abs() < f64::EPSILON);
                assert!(raw.contains("42.3%"));
            }
            other => panic!("expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn test_progress_whole_percent() {
        match classify("[download] 100% of 5.00MiB") {
            LineEvent::Progress { percent, .. } => assert!((percent - 100.0).abs() < f64::EPSILON),
            other => panic!("expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn test_download_destination_is_info() {
        let event = classify("[download] Destination: /downloads/alice/Ep1 [abc].mp4");
        assert!(matches!(event, LineEvent::Info(_)));
    }

    #[test]
    fn test_already_downloaded_is_info() {
        let event =
            classify("[download] Ep1 [abc].mp4 has already been downloaded and merged");
        assert!(matches!(event, LineEvent::Info(_)));
    }

    #[test]
    fn test_resuming_is_info() {
        let event = classify("[download] Resuming download at byte 102400");
        assert!(matches!(event, LineEvent::Info(_)));
    }

    #[test]
    fn test_info_marker() {
        let event = classify("[info] Writing video metadata as JSON to: Ep1 [abc].info.json");
        assert!(matches!(event, LineEvent::Info(_)));
    }

    #[test]
    fn test_downloading_page_is_info() {
        let event = classify("[patreon] alice: Downloading page 2");
        assert!(matches!(event, LineEvent::Info(_)));
    }

    #[test]
    fn test_error_line() {
        let event = classify("ERROR: No supported media found in this post");
        assert!(matches!(event, LineEvent::ErrorOrWarning(_)));
    }

    #[test]
    fn test_warning_line_case_insensitive() {
        let event = classify("Warning: unable to write thumbnail");
        assert!(matches!(event, LineEvent::ErrorOrWarning(_)));
    }

    #[test]
    fn test_error_beats_progress_prefix() {
        // A line matching the error rule is never reclassified by the
        // progress rule, even with the progress prefix and a percentage.
        let event = classify("[download] ERROR: giving up at 42.3%");
        assert!(matches!(event, LineEvent::ErrorOrWarning(_)));
    }

    #[test]
    fn test_everything_else_is_debug() {
        let event = classify("[patreon] Extracting URL: https://example.com/post/1");
        assert!(matches!(event, LineEvent::Debug(_)));
        assert!(matches!(classify(""), LineEvent::Debug(_)));
    }

    #[test]
    fn test_percent_requires_digits() {
        // A bare '%' with no preceding number is not progress.
        let event = classify("[download] 100 % nothing attached to the sign");
        assert!(matches!(event, LineEvent::Info(_)));
    }

    #[test]
    fn test_first_percent_skips_unparseable() {
        assert_eq!(first_percent("at 1.2.3% then 50%"), Some(50.0));
        assert_eq!(first_percent("no percent here"), None);
        assert_eq!(first_percent("12.5% of file"), Some(12.5));
    }

    #[test]
    fn test_classification_is_total() {
        // Every line lands in exactly one category without panicking.
        let samples = [
            "",
            "   ",
            "[download]",
            "%",
            "ERROR:",
            "random noise \u{1F4E6} unicode",
            "[download] 0.0% of 1b",
        ];
        for sample in samples {
            let _ = classify(sample);
        }
    }
}

//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// One creator feed to archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatorJob {
    /// Creator name as it appears in the feed URL.
    pub name: String,
    /// Lookback window in days; posts older than this are not fetched.
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    /// Extra fetch tool arguments appended after the defaults.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl CreatorJob {
    /// Create a job with the default lookback window and no extra arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            days_back: default_days_back(),
            extra_args: Vec::new(),
        }
    }
}

fn default_days_back() -> u32 {
    30
}

/// Top-level archiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    /// Root directory for downloaded files and logs.
    pub downloads_dir: PathBuf,
    /// Append-only ledger of already-fetched item identities.
    pub archive_file: PathBuf,
    /// Netscape-format cookie file for authenticated fetches.
    pub cookie_file: PathBuf,
    /// Base URL of the content site; creator feeds live under it.
    pub base_url: String,
    /// Seconds to wait between creators.
    pub delay_secs: u64,
    /// Cap on downloads per creator per run.
    pub max_downloads: u32,
    /// Creators to process, in order.
    pub creators: Vec<CreatorJob>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("/downloads"),
            archive_file: PathBuf::from("/config/archive.txt"),
            cookie_file: PathBuf::from("/config/cookies.txt"),
            base_url: "https://www.patreon.com".to_string(),
            delay_secs: 10,
            max_downloads: 100,
            creators: Vec::new(),
        }
    }
}

impl ArchiverConfig {
    /// Feed URL for one creator's posts page.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL does not parse.
    pub fn creator_url(&self, job: &CreatorJob) -> Result<Url, url::ParseError> {
        let base = Url::parse(&self.base_url)?;
        base.join(&format!("{}/posts", job.name))
    }

    /// Output directory for one creator's files.
    #[must_use]
    pub fn creator_dir(&self, job: &CreatorJob) -> PathBuf {
        self.downloads_dir.join(&job.name)
    }

    /// Directory holding per-creator error and probe logs.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.downloads_dir.join("logs")
    }

    /// Append-only error log path for one creator.
    #[must_use]
    pub fn error_log_path(&self, job: &CreatorJob) -> PathBuf {
        self.logs_dir().join(format!("{}_errors.log", job.name))
    }

    /// Diagnostic probe capture path for one creator.
    #[must_use]
    pub fn probe_log_path(&self, job: &CreatorJob) -> PathBuf {
        self.logs_dir().join(format!("{}_probe.log", job.name))
    }

    /// Output path template handed to the fetch tool.
    #[must_use]
    pub fn output_template(&self, job: &CreatorJob) -> String {
        self.creator_dir(job)
            .join("%(title)s [%(id)s].%(ext)s")
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ArchiverConfig::default();
        assert_eq!(config.downloads_dir, PathBuf::from("/downloads"));
        assert_eq!(config.archive_file, PathBuf::from("/config/archive.txt"));
        assert_eq!(config.delay_secs, 10);
        assert!(config.creators.is_empty());
    }

    #[test]
    fn test_creator_job_defaults() {
        let job = CreatorJob::new("alice");
        assert_eq!(job.name, "alice");
        assert_eq!(job.days_back, 30);
        assert!(job.extra_args.is_empty());
    }

    #[test]
    fn test_creator_url() {
        let config = ArchiverConfig::default();
        let job = CreatorJob::new("alice");
        let url = config.creator_url(&job).unwrap();
        assert_eq!(url.as_str(), "https://www.patreon.com/alice/posts");
    }

    #[test]
    fn test_creator_url_invalid_base() {
        let config = ArchiverConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.creator_url(&CreatorJob::new("alice")).is_err());
    }

    #[test]
    fn test_per_creator_paths() {
        let config = ArchiverConfig::default();
        let job = CreatorJob::new("alice");
        assert_eq!(config.creator_dir(&job), PathBuf::from("/downloads/alice"));
        assert_eq!(
            config.error_log_path(&job),
            PathBuf::from("/downloads/logs/alice_errors.log")
        );
        assert_eq!(
            config.probe_log_path(&job),
            PathBuf::from("/downloads/logs/alice_probe.log")
        );
    }

    #[test]
    fn test_output_template_contains_id_suffix() {
        let config = ArchiverConfig::default();
        let template = config.output_template(&CreatorJob::new("alice"));
        assert!(template.starts_with("/downloads/alice/"));
        assert!(template.ends_with("%(title)s [%(id)s].%(ext)s"));
    }
}

//! Sequential job orchestration.
//!
//! Creators are processed strictly one at a time: fetch, then post-process,
//! then a politeness delay before the next. A failure in one job never
//! aborts the rest of the run.

use std::time::Duration;

use crate::config::{ArchiverConfig, CreatorJob};
use crate::fetch::{FetchLauncher, FetchSupervisor, Launcher, Outcome};
use crate::pipeline::{has_media, Pipeline, PipelineReport};

/// Skip reason when a fetch succeeded but produced no media files.
const NO_MEDIA_REASON: &str = "no media files produced";

/// Result of one creator job within a run.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Creator name.
    pub creator: String,
    /// Fetch outcome, absent if the supervisor itself faulted.
    pub outcome: Option<Outcome>,
    /// Post-processing counters, present only if the pipeline ran.
    pub pipeline: Option<PipelineReport>,
    /// Why post-processing was skipped, if it was.
    pub skip_reason: Option<String>,
    /// Infrastructure error text, if the job aborted.
    pub error: Option<String>,
}

impl JobReport {
    fn new(creator: &CreatorJob) -> Self {
        Self {
            creator: creator.name.clone(),
            outcome: None,
            pipeline: None,
            skip_reason: None,
            error: None,
        }
    }
}

/// Aggregated results of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Per-job reports in processing order.
    pub reports: Vec<JobReport>,
}

impl RunSummary {
    /// Jobs that ended in success.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Success))
    }

    /// Jobs that ended benignly degraded.
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::DegradedBenign { .. }))
    }

    /// Jobs that failed, including supervisor faults.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| {
                r.error.is_some() || matches!(r.outcome, Some(Outcome::Failed { .. }) | None)
            })
            .count()
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome.as_ref().is_some_and(&predicate))
            .count()
    }
}

/// Runs every configured creator job in order.
pub struct Orchestrator<L> {
    config: ArchiverConfig,
    supervisor: FetchSupervisor<L>,
    pipeline: Pipeline,
}

impl Orchestrator<FetchLauncher> {
    /// Orchestrator over the real fetch binary.
    #[must_use]
    pub fn new(config: ArchiverConfig) -> Self {
        let supervisor = FetchSupervisor::new(config.clone(), FetchLauncher::new());
        Self {
            config,
            supervisor,
            pipeline: Pipeline::new(),
        }
    }
}

impl<L: Launcher> Orchestrator<L> {
    /// Orchestrator with explicit collaborators (for testing).
    #[must_use]
    pub fn with_parts(
        config: ArchiverConfig,
        supervisor: FetchSupervisor<L>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            config,
            supervisor,
            pipeline,
        }
    }

    /// Process every creator sequentially and aggregate a summary.
    ///
    /// This never fails: per-job problems are captured in the summary.
    pub async fn run(&self) -> RunSummary {
        let total = self.config.creators.len();
        tracing::info!(creators = total, "starting archive run");

        let mut summary = RunSummary::default();
        for (index, job) in self.config.creators.iter().enumerate() {
            summary.reports.push(self.run_job(job).await);

            if index + 1 < total {
                tracing::info!(
                    delay_secs = self.config.delay_secs,
                    "waiting before next creator"
                );
                tokio::time::sleep(Duration::from_secs(self.config.delay_secs)).await;
            }
        }

        tracing::info!(
            succeeded = summary.succeeded(),
            degraded = summary.degraded(),
            failed = summary.failed(),
            "archive run complete"
        );
        summary
    }

    /// Run one job, capturing every failure mode in the report.
    async fn run_job(&self, job: &CreatorJob) -> JobReport {
        let mut report = JobReport::new(job);
        let creator_dir = self.config.creator_dir(job);

        if let Err(e) = tokio::fs::create_dir_all(&creator_dir).await {
            tracing::error!(
                creator = %job.name,
                dir = %creator_dir.display(),
                error = %e,
                "cannot create output directory"
            );
            report.error = Some(format!("cannot create output directory: {e}"));
            return report;
        }

        let outcome = match self.supervisor.run(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(creator = %job.name, error = %e, "supervisor fault");
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.outcome = Some(outcome);

        if !outcome.allows_pipeline() {
            report.skip_reason = Some("fetch failed".to_string());
            tracing::info!(creator = %job.name, "skipping post-processing: fetch failed");
            return report;
        }

        match has_media(&creator_dir) {
            Ok(true) => {}
            Ok(false) => {
                report.skip_reason = Some(NO_MEDIA_REASON.to_string());
                tracing::warn!(creator = %job.name, "{NO_MEDIA_REASON}, skipping post-processing");
                return report;
            }
            Err(e) => {
                report.skip_reason = Some(format!("cannot scan output directory: {e}"));
                tracing::warn!(creator = %job.name, error = %e, "cannot scan output directory");
                return report;
            }
        }

        match self.pipeline.run(&creator_dir).await {
            Ok(pipeline_report) => report.pipeline = Some(pipeline_report),
            Err(e) => {
                tracing::error!(creator = %job.name, error = %e, "post-processing failed");
                report.skip_reason = Some(format!("post-processing failed: {e}"));
            }
        }
        report
    }
}
